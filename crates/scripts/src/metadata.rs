//! `/**!` header parsing.

use std::fmt;

/// Where a script came from. Ordering matters: built-ins sort before
/// user scripts in the canonical library order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ScriptSource {
    Builtin,
    UserProvided,
}

/// Parsed metadata plus the full source of a single Boop script.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    pub name: String,
    pub description: String,
    /// Icon identifier from the header; empty if not declared.
    pub icon: String,
    /// Empty vec if not declared. Never contains empty strings.
    pub tags: Vec<String>,
    /// Default 0.0 — lower values sort earlier.
    pub bias: f64,
    pub source: ScriptSource,
    /// `embedded:<relpath>` for built-ins; absolute path for user scripts.
    pub file_path: String,
    /// Full JavaScript source (including the header), executed verbatim.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeaderError {
    /// The file does not start with `/**!` (after an optional BOM).
    MissingHeader,
    /// The `/**!` block has no closing `*/`.
    Unclosed,
    /// `@name` missing or empty after trimming.
    MissingName,
    /// `@description` missing or empty after trimming.
    MissingDescription,
}

impl fmt::Display for HeaderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingHeader => write!(f, "missing /**! header"),
            Self::Unclosed => write!(f, "unclosed /**! header block"),
            Self::MissingName => write!(f, "/**! header missing @name"),
            Self::MissingDescription => write!(f, "/**! header missing @description"),
        }
    }
}

impl std::error::Error for HeaderError {}

/// Parse the `/**!` metadata header from a script source.
///
/// `content` is stored on the returned [`Script`] unchanged — it is the
/// exact text handed to the executor. `source` and `file_path` are left at
/// their defaults; the loader fills them in.
///
/// Unknown `@keys` are ignored for forward compatibility, and a malformed
/// `@bias` value falls back to 0.0 rather than failing the whole script.
pub fn parse_header(content: &str) -> Result<Script, HeaderError> {
    let body = content.strip_prefix('\u{feff}').unwrap_or(content);

    if !body.starts_with("/**!") {
        return Err(HeaderError::MissingHeader);
    }
    let end = body.find("*/").ok_or(HeaderError::Unclosed)?;
    let header = &body[4..end];

    let mut script = Script {
        name: String::new(),
        description: String::new(),
        icon: String::new(),
        tags: Vec::new(),
        bias: 0.0,
        source: ScriptSource::Builtin,
        file_path: String::new(),
        content: content.to_string(),
    };

    for line in header.lines() {
        let trimmed = line.trim_start_matches([' ', '\t']);
        let trimmed = trimmed.strip_prefix('*').unwrap_or(trimmed);
        let trimmed = trimmed.trim_start_matches([' ', '\t']);

        let Some(rest) = trimmed.strip_prefix('@') else {
            continue;
        };
        let Some(idx) = rest.find([' ', '\t']) else {
            continue;
        };
        let key = &rest[..idx];
        let value = rest[idx + 1..].trim();

        match key {
            "name" => script.name = value.to_string(),
            "description" => script.description = value.to_string(),
            "icon" => script.icon = value.to_string(),
            "tags" => {
                script.tags = value
                    .split(',')
                    .map(str::trim)
                    .filter(|t| !t.is_empty())
                    .map(str::to_string)
                    .collect();
            }
            "bias" => {
                if let Ok(bias) = value.parse::<f64>() {
                    script.bias = bias;
                }
            }
            _ => {}
        }
    }

    if script.name.trim().is_empty() {
        return Err(HeaderError::MissingName);
    }
    if script.description.trim().is_empty() {
        return Err(HeaderError::MissingDescription);
    }

    Ok(script)
}
