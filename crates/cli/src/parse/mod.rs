//! Structured parsers: raw controller output → [`StructuredRecord`]s.
//!
//! Each supported command has its own module. [`CommandParser`] picks one by
//! the command text. Parsers emit only catalogue field names; the entity key
//! (AP name) goes in `entity_key`, not in `fields`.

mod ap_summary;
mod cdp_neighbors;
mod meraki_monitoring;

use std::fmt;

use apfleet_recon::StructuredRecord;

pub const SHOW_AP_SUMMARY: &str = "show ap summary";
pub const SHOW_AP_CDP_NEIGHBORS: &str = "show ap cdp neighbors";
pub const SHOW_AP_MERAKI_MONITORING: &str = "show ap meraki monitoring summary";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    /// No parser exists for this command.
    UnsupportedCommand(String),
    /// Output has neither the expected table header nor any rows.
    Unrecognized { command: String, reason: String },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::UnsupportedCommand(cmd) => write!(f, "no parser for '{}'", cmd),
            ParseError::Unrecognized { command, reason } => {
                write!(f, "unrecognized '{}' output: {}", command, reason)
            }
        }
    }
}

impl std::error::Error for ParseError {}

pub trait StructuredParser {
    fn parse(
        &self,
        source_tag: &str,
        command: &str,
        output: &str,
    ) -> Result<Vec<StructuredRecord>, ParseError>;
}

/// Parses IOS-XE wireless controller output for the built-in commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandParser;

impl CommandParser {
    pub fn supports(command: &str) -> bool {
        matches!(
            normalize(command).as_str(),
            SHOW_AP_SUMMARY | SHOW_AP_CDP_NEIGHBORS | SHOW_AP_MERAKI_MONITORING
        )
    }
}

impl StructuredParser for CommandParser {
    fn parse(
        &self,
        source_tag: &str,
        command: &str,
        output: &str,
    ) -> Result<Vec<StructuredRecord>, ParseError> {
        let parsed = match normalize(command).as_str() {
            SHOW_AP_SUMMARY => ap_summary::parse(source_tag, output),
            SHOW_AP_CDP_NEIGHBORS => cdp_neighbors::parse(source_tag, output),
            SHOW_AP_MERAKI_MONITORING => meraki_monitoring::parse(source_tag, output),
            _ => return Err(ParseError::UnsupportedCommand(command.to_string())),
        };
        parsed.ok_or_else(|| ParseError::Unrecognized {
            command: command.to_string(),
            reason: describe_unrecognized(output),
        })
    }
}

/// Lowercase, single-spaced.
fn normalize(command: &str) -> String {
    command
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

fn describe_unrecognized(output: &str) -> String {
    if output.trim().is_empty() {
        return "empty output".into();
    }
    output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with('%'))
        .map(|l| format!("device reported \"{l}\""))
        .unwrap_or_else(|| "no table header found".into())
}

// ---------------------------------------------------------------------------
// Table helpers shared by the command parsers
// ---------------------------------------------------------------------------

/// Lines after the table header (and its dashed rule), or `None` when no
/// line satisfies `is_header`.
pub(crate) fn table_body<'a>(
    output: &'a str,
    is_header: impl Fn(&str) -> bool,
) -> Option<(&'a str, Vec<&'a str>)> {
    let lines: Vec<&str> = output.lines().collect();
    let header_idx = lines.iter().position(|l| is_header(l.trim()))?;
    let body = lines[header_idx + 1..]
        .iter()
        .copied()
        .skip_while(|l| is_rule(l))
        .collect();
    Some((lines[header_idx], body))
}

fn is_rule(line: &str) -> bool {
    let t = line.trim();
    !t.is_empty() && t.chars().all(|c| c == '-')
}

/// Dotted-quad MAC as printed by IOS-XE (`a4b2.3c4d.5e6f`).
pub(crate) const MAC: &str = r"[0-9a-fA-F]{4}\.[0-9a-fA-F]{4}\.[0-9a-fA-F]{4}";
