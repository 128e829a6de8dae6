//! In-place `key = value` patching of INI-style files.
//!
//! Used for files this agent does not own outright (the SDN plugin config),
//! where only individual keys are managed and everything else must survive
//! byte-for-byte.

use std::fs;
use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{AgentError, Result};

/// What `patch` or `unset` did to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchOutcome {
    /// An existing line for the key was rewritten.
    Replaced,
    /// No line matched; `key = value` was appended.
    Appended,
    /// Every line assigning the key was dropped.
    Removed,
    /// The file already held exactly this content; nothing was written.
    Unchanged,
}

fn validate_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(AgentError::InvalidArgument("patch key is empty".into()));
    }
    if key.contains('=') || key.chars().any(char::is_whitespace) {
        return Err(AgentError::InvalidArgument(format!(
            "patch key '{}' contains '=' or whitespace",
            key.escape_debug()
        )));
    }
    Ok(())
}

fn validate(key: &str, value: &str) -> Result<()> {
    validate_key(key)?;
    if value.contains('\n') || value.contains('\r') {
        return Err(AgentError::InvalidArgument(format!(
            "value for '{}' contains a line break",
            key
        )));
    }
    Ok(())
}

/// Split a line from `split_inclusive('\n')` into its text and terminator.
fn split_eol(line: &str) -> (&str, &str) {
    if let Some(text) = line.strip_suffix("\r\n") {
        (text, "\r\n")
    } else if let Some(text) = line.strip_suffix('\n') {
        (text, "\n")
    } else {
        (line, "")
    }
}

/// Whether `line` assigns `key`: the first token after indentation is the key,
/// followed by whitespace, `=`, or the end of the line.
fn line_sets_key(line: &str, key: &str) -> bool {
    let body = line.trim_start();
    match body.strip_prefix(key) {
        Some(rest) => rest.is_empty() || rest.starts_with('=') || rest.starts_with(char::is_whitespace),
        None => false,
    }
}

/// The value a `key = value` line assigns, ignoring spacing around `=`.
fn assigned_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.trim_start().strip_prefix(key)?.trim_start();
    rest.strip_prefix('=').map(str::trim)
}

/// Apply the patch to in-memory content.
///
/// Lines that already assign `value` are left as written. Rewritten and
/// appended lines use the file's own line ending.
pub fn patch_content(content: &str, key: &str, value: &str) -> (String, PatchOutcome) {
    let mut out = String::with_capacity(content.len() + key.len() + value.len() + 4);
    let mut found = false;

    for line in content.split_inclusive('\n') {
        let (text, eol) = split_eol(line);
        if !line_sets_key(text, key) {
            out.push_str(line);
            continue;
        }
        found = true;
        if assigned_value(text, key) == Some(value) {
            out.push_str(line);
            continue;
        }
        let indent = &text[..text.len() - text.trim_start().len()];
        out.push_str(indent);
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push_str(eol);
    }

    if !found {
        let eol = if content.contains("\r\n") { "\r\n" } else { "\n" };
        if !out.is_empty() && !out.ends_with('\n') {
            out.push_str(eol);
        }
        out.push_str(key);
        out.push_str(" = ");
        out.push_str(value);
        out.push_str(eol);
    }

    let outcome = if out == content {
        PatchOutcome::Unchanged
    } else if found {
        PatchOutcome::Replaced
    } else {
        PatchOutcome::Appended
    };
    (out, outcome)
}

/// Drop every line assigning `key`.
pub fn unset_content(content: &str, key: &str) -> (String, PatchOutcome) {
    let out: String = content
        .split_inclusive('\n')
        .filter(|line| !line_sets_key(split_eol(line).0, key))
        .collect();
    let outcome = if out == content {
        PatchOutcome::Unchanged
    } else {
        PatchOutcome::Removed
    };
    (out, outcome)
}

/// Set `key = value` in the file at `path`.
///
/// Every line assigning `key` is rewritten, keeping its indentation. When no
/// line matches the pair is appended. The file is replaced through a temp
/// file in the same directory; nothing is written when the content would not
/// change. Arguments are validated before the file is read.
pub fn patch(path: &Path, key: &str, value: &str) -> Result<PatchOutcome> {
    validate(key, value)?;
    let content = fs::read_to_string(path).map_err(|e| AgentError::file_access(path, e))?;
    let (patched, outcome) = patch_content(&content, key, value);
    commit(path, key, &patched, outcome)
}

/// Remove `key` from the file at `path`.
pub fn unset(path: &Path, key: &str) -> Result<PatchOutcome> {
    validate_key(key)?;
    let content = fs::read_to_string(path).map_err(|e| AgentError::file_access(path, e))?;
    let (patched, outcome) = unset_content(&content, key);
    commit(path, key, &patched, outcome)
}

fn commit(path: &Path, key: &str, content: &str, outcome: PatchOutcome) -> Result<PatchOutcome> {
    if outcome == PatchOutcome::Unchanged {
        debug!(path = %path.display(), key, "patch is a no-op");
        return Ok(outcome);
    }
    write_atomic(path, content.as_bytes())?;
    debug!(path = %path.display(), key, ?outcome, "patched");
    Ok(outcome)
}

/// Replace `path` with `bytes` via a sibling temp file, keeping the original
/// permissions.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir).map_err(|e| AgentError::file_access(dir, e))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| AgentError::file_access(tmp.path(), e))?;
    if let Ok(meta) = fs::metadata(path) {
        fs::set_permissions(tmp.path(), meta.permissions())
            .map_err(|e| AgentError::file_access(tmp.path(), e))?;
    }
    tmp.persist(path)
        .map_err(|e| AgentError::file_access(path, e.error))?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
