use std::io::{self, Write};

use anyhow::Error;

use crate::core::ReportEntry;
use crate::engine::RunOutcome;

#[derive(Debug, Clone)]
pub struct UiConfig {
    pub quiet: bool,
    pub verbose: bool,
    pub max_table_rows: usize,
}

pub fn eprintln_error(err: &Error) {
    let mut stderr = io::stderr().lock();
    let _ = writeln!(stderr, "error:");
    let _ = writeln!(stderr, "  {err}");

    let mut causes = err.chain().skip(1).peekable();
    if causes.peek().is_some() {
        let _ = writeln!(stderr, "caused by:");
        for cause in causes {
            let _ = writeln!(stderr, "  - {cause}");
        }
    }

    let _ = writeln!(stderr, "next:");
    let _ = writeln!(stderr, "  - re-run with `--verbose` for more detail");
    let _ = writeln!(
        stderr,
        "  - see `cvewatch --help` for commands and options"
    );
}

pub fn print_run_summary(outcome: &RunOutcome, cfg: &UiConfig, watch: Option<&str>) {
    if cfg.quiet {
        return;
    }

    let mut out = io::stdout().lock();
    match watch {
        Some(watch) => {
            let _ = writeln!(
                out,
                "Found {} CVEs from watch '{watch}'",
                outcome.entries.len()
            );
        }
        None => {
            let _ = writeln!(out, "Found {} CVEs", outcome.entries.len());
        }
    }

    if !outcome.entries.is_empty() {
        let _ = writeln!(out);
        print_entries_table(&mut out, &outcome.entries, cfg.max_table_rows);
    }

    if cfg.verbose {
        for entry in &outcome.entries {
            let fixed = if entry.fixed_versions.is_empty() {
                "N/A".to_string()
            } else {
                entry.fixed_versions.join(", ")
            };
            let _ = writeln!(out, "{}: fixed in {} ({})", entry.cve_id, fixed, entry.provider);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "Reports:");
    let _ = writeln!(out, "- {}", outcome.json_path.display());
    let _ = writeln!(out, "- {}", outcome.md_path.display());

    if !outcome.uploaded.is_empty() {
        let _ = writeln!(out, "Uploaded:");
        for url in &outcome.uploaded {
            let _ = writeln!(out, "- {url}");
        }
    }
}

fn print_entries_table(out: &mut impl Write, entries: &[ReportEntry], max_rows: usize) {
    let rows = max_rows.min(entries.len());

    let mut cve_width = "CVE ID".len();
    let mut severity_width = "SEVERITY".len();
    for entry in entries.iter().take(rows) {
        cve_width = cve_width.max(entry.cve_id.len());
        severity_width = severity_width.max(entry.severity.len());
    }

    let _ = writeln!(
        out,
        "{:<cve_width$}  {:<severity_width$}  MITIGATED",
        "CVE ID", "SEVERITY"
    );
    for entry in entries.iter().take(rows) {
        let mitigated = if entry.mitigated { "Yes" } else { "No" };
        let _ = writeln!(
            out,
            "{:<cve_width$}  {:<severity_width$}  {mitigated}",
            entry.cve_id, entry.severity
        );
    }
    if entries.len() > rows {
        let omitted = entries.len() - rows;
        let _ = writeln!(out, "... ({omitted} more)");
    }
}
