mod entry;
mod violation;

pub use entry::ReportEntry;
pub use violation::{ImpactedArtifact, RawIssue, RawViolation, ViolationsPage};
