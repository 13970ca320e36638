//! Policy file commands
//!
//! These commands edit a conditional policy file: one encoded entry per
//! line, `#` comments allowed.

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use colored::*;
use lion_policy::{FilePolicyStorage, PolicyEntry, PolicyRegistry, PolicyStorage};

use crate::error::CliError;

fn open(path: &Path) -> Result<Arc<PolicyRegistry>> {
    Ok(PolicyRegistry::load(Arc::new(FilePolicyStorage::new(path))).map_err(CliError::from)?)
}

/// Check that every entry of a policy file decodes
pub fn validate(path: &Path) -> Result<()> {
    let encoded = FilePolicyStorage::new(path).load().map_err(CliError::from)?;

    let mut malformed = 0;
    for (index, text) in encoded.iter().enumerate() {
        if let Err(e) = PolicyEntry::decode(text) {
            malformed += 1;
            println!("{} entry {}: {}", "invalid".red().bold(), index + 1, e);
            println!("  {}", text.dimmed());
        }
    }

    if malformed > 0 {
        return Err(CliError::InvalidPolicy(malformed, encoded.len()).into());
    }

    println!(
        "{} {} policy entries are valid",
        "ok".green().bold(),
        encoded.len().to_string().yellow()
    );
    Ok(())
}

/// List the entries of a policy file
pub fn list(path: &Path) -> Result<()> {
    let registry = open(path)?;
    let entries = registry.enumerate();

    if entries.is_empty() {
        println!("{}", "No policy entries defined".yellow().bold());
        println!("\nTo add a policy entry, use:");
        println!("  {}", "lion policy add <FILE> '[name]{ [location \"file:*\"] (all) }'".italic());
        return Ok(());
    }

    println!("{:<4} | {:<20} | {}", "#".underline(), "Name".underline(), "Entry".underline());
    println!("{}", "-".repeat(80));
    for (index, entry) in entries.iter().enumerate() {
        let name = entry.name().unwrap_or("-");
        println!("{:<4} | {:<20} | {}", index + 1, name.cyan(), entry);
    }

    println!("\n{} policy entries found", entries.len().to_string().yellow());
    Ok(())
}

/// Append an encoded entry to a policy file
pub fn add(path: &Path, encoded: &str) -> Result<()> {
    let registry = open(path)?;
    let entry = registry.add_encoded(encoded).map_err(CliError::from)?;
    tracing::debug!(path = %path.display(), entries = registry.len(), "Policy file updated");

    println!("{}", "Policy entry added successfully".green().bold());
    if let Some(name) = entry.name() {
        println!("Name:  {}", name.cyan());
    }
    println!("Entry: {}", entry);
    Ok(())
}

/// Remove a named entry from a policy file
pub fn remove(path: &Path, name: &str) -> Result<()> {
    println!("Removing policy entry: {}", name.cyan());

    let registry = open(path)?;
    registry.delete_named(name).map_err(CliError::from)?;

    println!("{}", "Policy entry removed successfully".green());
    Ok(())
}
