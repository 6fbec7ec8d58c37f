//! Session transcripts: rendering, archival and re-splitting.
//!
//! A transcript is the concatenation of one block per command,
//! `"{prompt}{command}\n{output}\n"`, in execution order.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::session::SessionError;

static PROMPT_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\S*[>#])\s?(.+)$").unwrap());

pub fn render_block(prompt: &str, command: &str, output: &str) -> String {
    format!("{prompt}{command}\n{output}\n")
}

/// Block for a command that did not complete. Marked like a device error line.
pub fn render_failure(prompt: &str, command: &str, error: &SessionError) -> String {
    format!("{prompt}{command}\n% apfleet: {error}\n")
}

/// Write `text` to a new file, creating parent directories.
pub fn write_transcript(path: &Path, text: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    fs::write(path, text)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptBlock {
    pub command: String,
    pub output: String,
}

/// Split an archived transcript back into per-command blocks.
///
/// A line starts a block when it is a prompt (`...#` or `...>`) followed by
/// one of `commands`. Anything before the first such line is discarded.
pub fn split_transcript(text: &str, commands: &[&str]) -> Vec<TranscriptBlock> {
    let mut blocks: Vec<TranscriptBlock> = Vec::new();
    let mut lines: Vec<&str> = Vec::new();

    let flush = |blocks: &mut Vec<TranscriptBlock>, lines: &mut Vec<&str>| {
        if let Some(block) = blocks.last_mut() {
            block.output = lines.join("\n");
        }
        lines.clear();
    };

    for line in text.lines() {
        let started = PROMPT_LINE
            .captures(line.trim_end())
            .and_then(|caps| caps.get(2))
            .map(|m| m.as_str().trim())
            .filter(|cmd| commands.contains(cmd));

        match started {
            Some(command) => {
                flush(&mut blocks, &mut lines);
                blocks.push(TranscriptBlock {
                    command: command.to_string(),
                    output: String::new(),
                });
            }
            None if !blocks.is_empty() => lines.push(line),
            None => {}
        }
    }
    flush(&mut blocks, &mut lines);

    blocks
}

/// Output of the first block for `command`.
pub fn find_output<'a>(blocks: &'a [TranscriptBlock], command: &str) -> Option<&'a str> {
    blocks
        .iter()
        .find(|b| b.command == command)
        .map(|b| b.output.as_str())
}
