use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

use crate::core::ReportEntry;

#[derive(Debug, Clone, Default)]
pub struct ReportMeta {
    pub title: String,
    pub artifact: Option<String>,
    pub watch: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WrittenReports {
    pub json_path: PathBuf,
    pub md_path: PathBuf,
}

const BASENAME_STAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year][month][day]_[hour][minute][second]");

/// Shared basename for the JSON/Markdown pair. Embeds the generation
/// timestamp so repeated runs never overwrite prior reports; the audit
/// variant also embeds the watch name.
pub fn report_basename(watch: Option<&str>, now: OffsetDateTime) -> Result<String> {
    let stamp = now
        .format(BASENAME_STAMP)
        .context("failed to format report timestamp")?;
    Ok(match watch {
        Some(watch) => format!("critical_cves_{watch}_{stamp}"),
        None => format!("critical_cves_{stamp}"),
    })
}

pub fn render_json(entries: &[ReportEntry]) -> Result<String> {
    serde_json::to_string_pretty(entries).context("failed to serialize report entries")
}

pub fn render_markdown(entries: &[ReportEntry], meta: &ReportMeta) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "# {}", meta.title);
    let _ = writeln!(out);
    if let Some(artifact) = &meta.artifact {
        let _ = writeln!(out, "**Artifact:** `{artifact}`");
        let _ = writeln!(out);
    }

    let _ = writeln!(
        out,
        "| CVE ID | Summary | Severity | Fixed Versions | Provider | Platform Mitigated? |"
    );
    let _ = writeln!(
        out,
        "|--------|---------|----------|----------------|----------|----------------------|"
    );

    for entry in entries {
        let fixed = if entry.fixed_versions.is_empty() {
            "N/A".to_string()
        } else {
            entry.fixed_versions.join(", ")
        };
        let mitigated = if entry.mitigated { "Yes" } else { "No" };
        let _ = writeln!(
            out,
            "| `{}` | {} | {} | {} | {} | {} |",
            entry.cve_id,
            escape_cell(&entry.summary),
            escape_cell(&entry.severity),
            escape_cell(&fixed),
            escape_cell(&entry.provider),
            mitigated
        );
    }

    out
}

// An unescaped `|` inside free text would split the table row.
fn escape_cell(s: &str) -> String {
    s.replace('|', "\\|")
}

pub fn write_reports(
    dir: &Path,
    basename: &str,
    json: &str,
    markdown: &str,
) -> Result<WrittenReports> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory: {}", dir.display()))?;

    let json_path = dir.join(format!("{basename}.json"));
    let md_path = dir.join(format!("{basename}.md"));

    std::fs::write(&json_path, json)
        .with_context(|| format!("failed to write JSON report: {}", json_path.display()))?;
    std::fs::write(&md_path, markdown)
        .with_context(|| format!("failed to write Markdown report: {}", md_path.display()))?;

    Ok(WrittenReports { json_path, md_path })
}
