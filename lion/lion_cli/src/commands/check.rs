//! Permission check command

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use lion_core::{Bundle, PolicyConfig};
use lion_policy::{Decision, PolicyManager};

use crate::error::CliError;

/// Decide a permission for a bundle installed at `location`.
///
/// Returns whether the permission is granted.
pub fn execute(
    config: &PolicyConfig,
    config_path: &Path,
    location: &str,
    permission_type: &str,
    name: &str,
    actions: &str,
) -> Result<bool> {
    let manager = PolicyManager::from_config(config)
        .map_err(CliError::from)
        .with_context(|| format!("loading policy from {}", config_path.display()))?;

    let bundle = Bundle::new(location);
    let decision = manager
        .check(&bundle, permission_type, name, actions)
        .map_err(CliError::from)?;

    tracing::debug!(%bundle, ?decision, "Permission decided");

    let granted = decision.is_granted();
    let source = match decision {
        Decision::Baseline => "implied permissions",
        Decision::Restricted => "restricted permissions",
        Decision::Assigned(_) => "location permissions",
        Decision::Conditional(_) => "conditional policy",
        Decision::Fallback(_) => "default permissions",
    };

    println!("{}", "Permission Check".bold().underline());
    println!("Location:   {}", location.cyan());
    println!("Permission: ({} \"{}\" \"{}\")", permission_type, name, actions.yellow());
    let verdict = if granted { "GRANTED".green().bold() } else { "DENIED".red().bold() };
    println!("\nDecision: {} by {}", verdict, source);

    Ok(granted)
}
