use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;

use anyhow::{Context, Result};

pub type MitigatedSet = BTreeSet<String>;

/// Loads the operator-maintained list of mitigated CVE ids: one id per
/// line, trimmed, blank lines ignored. A missing file is a degraded but
/// valid state (every CVE reports as unmitigated), not an error.
pub fn load(path: &Path) -> Result<MitigatedSet> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(MitigatedSet::new()),
        Err(err) => {
            return Err(err).with_context(|| {
                format!("failed to read mitigated CVE list: {}", path.display())
            });
        }
    };

    Ok(text
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}
