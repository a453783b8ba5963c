use std::collections::HashSet;

use crate::core::{RawIssue, RawViolation, ReportEntry};
use crate::mitigations::MitigatedSet;

/// Exact-equality target for the single-artifact audit: a violation must
/// match both fields or it is skipped entirely.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetFilter {
    pub component_id: String,
    pub watch_name: String,
}

/// The audit variant filters and deduplicates; the org-wide sweep keeps
/// every issue even when one CVE appears under several artifacts or
/// watches. The two modes are intentionally asymmetric.
#[derive(Debug, Clone, Default)]
pub struct NormalizeOptions {
    pub filter: Option<TargetFilter>,
    pub dedupe_by_cve: bool,
}

/// Flattens nested violation/issue records into report entries. Pure
/// function of its inputs; output keeps the input's order of first
/// appearance and is never re-sorted.
pub fn normalize(
    violations: &[RawViolation],
    mitigated: &MitigatedSet,
    opts: &NormalizeOptions,
) -> Vec<ReportEntry> {
    let mut entries = Vec::new();
    let mut seen_cves: HashSet<String> = HashSet::new();

    for violation in violations {
        let component = non_blank(violation.impacted_artifact.component_id.as_deref());
        let watch = non_blank(violation.watch_name.as_deref());

        if let Some(filter) = &opts.filter {
            if component != Some(filter.component_id.as_str()) {
                continue;
            }
            if watch != Some(filter.watch_name.as_str()) {
                continue;
            }
        }

        for issue in &violation.issues {
            // `cve` wins, `issue_id` is the service's fallback identifier.
            let Some(cve_id) = issue_cve_id(issue) else {
                continue;
            };
            if opts.dedupe_by_cve && !seen_cves.insert(cve_id.to_string()) {
                continue;
            }
            entries.push(ReportEntry {
                cve_id: cve_id.to_string(),
                summary: clean_summary(issue.summary.as_deref()),
                severity: field_or_unknown(issue.severity.as_deref()),
                fixed_versions: issue.fixed_versions.clone(),
                provider: field_or_unknown(issue.provider.as_deref()),
                artifact: component.map(str::to_string),
                watch: watch.map(str::to_string),
                mitigated: mitigated.contains(cve_id),
            });
        }
    }

    entries
}

fn issue_cve_id(issue: &RawIssue) -> Option<&str> {
    non_blank(issue.cve.as_deref()).or_else(|| non_blank(issue.issue_id.as_deref()))
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}

fn field_or_unknown(s: Option<&str>) -> String {
    non_blank(s).unwrap_or("Unknown").to_string()
}

fn clean_summary(raw: Option<&str>) -> String {
    raw.unwrap_or_default()
        .replace("\r\n", "\n")
        .replace(['\n', '\r'], " ")
        .trim()
        .to_string()
}
