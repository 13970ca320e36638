//! Canonical text encoding of policy entries.
//!
//! ```text
//! [name]{ [type "arg" ...] (type "name" "actions") ... }
//! ```
//!
//! Conditions are bracketed, permissions parenthesized, and both may be
//! interleaved. Quoted strings use backslash escapes for `"` and `\`; the
//! optional entry name uses them for `]` and `\`.

use lion_core::error::FormatError;

use super::record::{ConditionRecord, PermissionRecord, PolicyItem};

/// A decoded entry before it is given an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct DecodedEntry {
    pub name: Option<String>,
    pub items: Vec<PolicyItem>,
}

/// Cursor over the encoded text. Offsets are byte offsets.
pub(crate) struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        Some(ch)
    }

    fn error(&self, message: impl Into<String>) -> FormatError {
        FormatError::new(message, self.pos)
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn expect(&mut self, expected: char) -> Result<(), FormatError> {
        match self.peek() {
            Some(ch) if ch == expected => {
                self.bump();
                Ok(())
            }
            Some(ch) => Err(self.error(format!("expected '{}', found '{}'", expected, ch))),
            None => Err(self.error(format!("expected '{}', found end of input", expected))),
        }
    }

    /// Fail unless only whitespace remains.
    pub fn finish(&mut self) -> Result<(), FormatError> {
        self.skip_whitespace();
        match self.peek() {
            None => Ok(()),
            Some(ch) => Err(self.error(format!("unexpected trailing input '{}'", ch))),
        }
    }

    fn parse_type(&mut self) -> Result<String, FormatError> {
        let start = self.pos;
        while self.peek().is_some_and(is_type_char) {
            self.bump();
        }
        if self.pos == start {
            return Err(self.error("missing type"));
        }
        Ok(self.input[start..self.pos].to_string())
    }

    fn parse_quoted(&mut self) -> Result<String, FormatError> {
        let start = self.pos;
        self.expect('"')?;
        let mut value = String::new();
        loop {
            match self.bump() {
                Some('"') => return Ok(value),
                Some('\\') => match self.bump() {
                    Some(ch) => value.push(ch),
                    None => break,
                },
                Some(ch) => value.push(ch),
                None => break,
            }
        }
        Err(FormatError::new("unterminated quote", start))
    }

    fn parse_name(&mut self) -> Result<String, FormatError> {
        let start = self.pos;
        self.expect('[')?;
        let mut name = String::new();
        loop {
            match self.bump() {
                Some(']') => return Ok(name),
                Some('\\') => match self.bump() {
                    Some(ch) => name.push(ch),
                    None => break,
                },
                Some(ch) => name.push(ch),
                None => break,
            }
        }
        Err(FormatError::new("unbalanced '[' in entry name", start))
    }

    pub fn parse_condition(&mut self) -> Result<ConditionRecord, FormatError> {
        let start = self.pos;
        self.expect('[')?;
        self.skip_whitespace();
        let condition_type = self.parse_type()?;
        let mut args = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(']') => {
                    self.bump();
                    return Ok(ConditionRecord::new(condition_type, args));
                }
                Some('"') => args.push(self.parse_quoted()?),
                Some(ch) => {
                    return Err(self.error(format!("expected quoted argument or ']', found '{}'", ch)))
                }
                None => return Err(FormatError::new("unbalanced '['", start)),
            }
        }
    }

    pub fn parse_permission(&mut self) -> Result<PermissionRecord, FormatError> {
        let start = self.pos;
        self.expect('(')?;
        self.skip_whitespace();
        let permission_type = self.parse_type()?;
        let mut fields: Vec<String> = Vec::with_capacity(2);
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some(')') => {
                    self.bump();
                    break;
                }
                Some('"') if fields.len() < 2 => fields.push(self.parse_quoted()?),
                Some('"') => return Err(self.error("too many permission arguments")),
                Some(ch) => {
                    return Err(self.error(format!("expected quoted argument or ')', found '{}'", ch)))
                }
                None => return Err(FormatError::new("unbalanced '('", start)),
            }
        }
        let mut fields = fields.into_iter();
        let name = fields.next().unwrap_or_default();
        let actions = fields.next().unwrap_or_default();
        Ok(PermissionRecord::new(permission_type, name, actions))
    }

    fn parse_item(&mut self) -> Result<PolicyItem, FormatError> {
        match self.peek() {
            Some('[') => Ok(PolicyItem::Condition(self.parse_condition()?)),
            Some('(') => Ok(PolicyItem::Permission(self.parse_permission()?)),
            Some(ch) => Err(self.error(format!("expected '[' or '(', found '{}'", ch))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    pub fn parse_entry(&mut self) -> Result<DecodedEntry, FormatError> {
        self.skip_whitespace();
        let name = match self.peek() {
            Some('[') => Some(self.parse_name()?),
            _ => None,
        };
        self.skip_whitespace();
        let open = self.pos;
        self.expect('{')?;

        let mut items = Vec::new();
        loop {
            self.skip_whitespace();
            match self.peek() {
                Some('}') => {
                    self.bump();
                    break;
                }
                None => return Err(FormatError::new("unbalanced '{'", open)),
                Some(_) => items.push(self.parse_item()?),
            }
        }
        self.finish()?;
        Ok(DecodedEntry { name, items })
    }
}

fn is_type_char(ch: char) -> bool {
    !ch.is_whitespace() && !matches!(ch, '"' | '[' | ']' | '(' | ')' | '{' | '}')
}

/// Append `value` as a quoted string.
pub(crate) fn write_quoted(out: &mut String, value: &str) {
    out.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            out.push('\\');
        }
        out.push(ch);
    }
    out.push('"');
}

/// Encode a whole entry.
pub(crate) fn encode_entry(name: Option<&str>, items: &[PolicyItem]) -> String {
    let mut out = String::new();
    encode_head(&mut out, name);
    for item in items {
        out.push(' ');
        item.encode_into(&mut out);
    }
    out.push_str(" }");
    out
}

fn encode_head(out: &mut String, name: Option<&str>) {
    if let Some(name) = name {
        out.push('[');
        for ch in name.chars() {
            if ch == ']' || ch == '\\' {
                out.push('\\');
            }
            out.push(ch);
        }
        out.push(']');
    }
    out.push('{');
}

/// Check that every item type is a bare type token, so the encoding
/// decodes back to the same items.
///
/// Error offsets point into the canonical encoding.
pub(crate) fn check_entry(name: Option<&str>, items: &[PolicyItem]) -> Result<(), FormatError> {
    let mut out = String::new();
    encode_head(&mut out, name);
    for item in items {
        out.push(' ');
        // Skip the opening '[' or '('.
        let offset = out.len() + 1;
        let item_type = match item {
            PolicyItem::Condition(record) => record.condition_type(),
            PolicyItem::Permission(record) => record.permission_type(),
        };
        check_type(item_type, offset)?;
        item.encode_into(&mut out);
    }
    Ok(())
}

fn check_type(item_type: &str, offset: usize) -> Result<(), FormatError> {
    if item_type.is_empty() {
        return Err(FormatError::new("missing type", offset));
    }
    match item_type.char_indices().find(|&(_, ch)| !is_type_char(ch)) {
        Some((at, ch)) => Err(FormatError::new(
            format!("invalid character {:?} in type", ch),
            offset + at,
        )),
        None => Ok(()),
    }
}
