use serde::{Deserialize, Serialize};

/// The normalized, flattened report unit: one entry per surviving issue
/// (per distinct CVE id when deduplication is on). Immutable after
/// normalization; `cve_id` is never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportEntry {
    pub cve_id: String,
    pub summary: String,
    pub severity: String,
    pub fixed_versions: Vec<String>,
    pub provider: String,
    pub artifact: Option<String>,
    pub watch: Option<String>,
    pub mitigated: bool,
}
