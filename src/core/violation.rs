use serde::Deserialize;

/// One page of the scanning service's violations response, shape
/// `{"data": [...]}`. A missing `data` key is an empty page, not an error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ViolationsPage {
    #[serde(default)]
    pub data: Vec<RawViolation>,
}

/// A violation record exactly as the scanning service emits it. Every field
/// is optional; defaulting happens in one place during normalization.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawViolation {
    #[serde(default)]
    pub impacted_artifact: ImpactedArtifact,
    #[serde(default)]
    pub watch_name: Option<String>,
    #[serde(default)]
    pub impact_path: Vec<String>,
    #[serde(default)]
    pub issues: Vec<RawIssue>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ImpactedArtifact {
    #[serde(default)]
    pub component_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawIssue {
    #[serde(default)]
    pub issue_id: Option<String>,
    #[serde(default)]
    pub cve: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub severity: Option<String>,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub fixed_versions: Vec<String>,
}
