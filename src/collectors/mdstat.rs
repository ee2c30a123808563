use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Facts derived from one read of /proc/mdstat. Never cached; the kernel may
/// start or stop checks between any two reads.
#[derive(Debug, Clone, Default, Serialize)]
pub struct StatusSnapshot {
    /// Lines containing the substring "check". Substring match on purpose:
    /// a state word like "checking" counts too.
    pub active_checks: usize,
    /// Completion of the progress bar on the first check/resync line, 0–100.
    /// None when no readable bar exists, which is distinct from 0%.
    pub progress_pct: Option<f64>,
    /// The finish= token verbatim, unit suffix included (e.g. "37.2min").
    pub time_remaining: Option<String>,
}

/// Read and parse the mdstat file at `path`.
/// Fails only on I/O; any content at all parses to a snapshot.
pub fn read_status(path: impl AsRef<Path>) -> Result<StatusSnapshot> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(parse_mdstat(&content))
}

/// Parse mdstat text into a snapshot. Missing patterns yield absent fields,
/// never errors.
pub fn parse_mdstat(content: &str) -> StatusSnapshot {
    let mut snap = StatusSnapshot::default();

    for line in content.lines() {
        if line.contains("check") {
            snap.active_checks += 1;
        }

        if snap.progress_pct.is_none() && (line.contains("check") || line.contains("resync")) {
            snap.progress_pct = progress_from_line(line);
        }

        if snap.time_remaining.is_none() && line.contains("finish") {
            snap.time_remaining = finish_token(line);
        }
    }

    snap
}

/// Extract completion from a progress bar like "[=========>...........]".
/// Only brackets whose interior is entirely '=', '>' or '.' qualify; the
/// device bitmap "[UUU_]" and member counts "[3/4]" on the same line do not.
fn progress_from_line(line: &str) -> Option<f64> {
    let mut rest = line;
    while let Some(open) = rest.find('[') {
        let after = &rest[open + 1..];
        let close = after.find(']')?;
        let interior = &after[..close];

        if interior.chars().all(|c| matches!(c, '=' | '>' | '.')) {
            let total = interior.len();
            // Degenerate "[]" never divides; keep scanning.
            if total > 0 {
                let done = interior.chars().filter(|c| matches!(c, '=' | '>')).count();
                return Some(done as f64 / total as f64 * 100.0);
            }
        }
        rest = &after[close + 1..];
    }
    None
}

/// Extract the token following "finish=" up to the next whitespace.
fn finish_token(line: &str) -> Option<String> {
    let rest = line.split_once("finish=")?.1;
    let token = rest.split_whitespace().next()?;
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}
