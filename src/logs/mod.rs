use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

#[derive(Debug, Serialize)]
struct RunLog<'a> {
    schema_version: &'static str,
    tool_version: String,
    command: &'a str,
    started_at: String,
    finished_at: String,
    status: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    artifact: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    watch: Option<&'a str>,
    entry_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reports: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    uploaded: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RunLogRecord {
    pub artifact: Option<String>,
    pub watch: Option<String>,
    pub entry_count: usize,
    pub reports: Vec<PathBuf>,
    pub uploaded: Vec<String>,
}

pub fn logs_dir(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/cvewatch/logs")
}

/// Appends one structured JSON run log per invocation. File names carry the
/// pid and a nanosecond stamp so concurrent runs never collide.
pub fn write_run_log(
    home_dir: &Path,
    command: &str,
    started_at: OffsetDateTime,
    finished_at: OffsetDateTime,
    status: &str,
    record: &RunLogRecord,
) -> Result<PathBuf> {
    let dir = logs_dir(home_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create log directory: {}", dir.display()))?;

    let pid = std::process::id();
    let ts = finished_at.unix_timestamp_nanos();
    let path = dir.join(format!("{command}-{pid}-{ts}.json"));

    let log = RunLog {
        schema_version: "1.0",
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        command,
        started_at: started_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        finished_at: finished_at
            .format(&Rfc3339)
            .unwrap_or_else(|_| "unknown".to_string()),
        status,
        artifact: record.artifact.as_deref(),
        watch: record.watch.as_deref(),
        entry_count: record.entry_count,
        reports: record
            .reports
            .iter()
            .map(|p| p.display().to_string())
            .collect(),
        uploaded: record.uploaded.clone(),
    };

    let buf = serde_json::to_vec_pretty(&log).context("failed to serialize run log (JSON)")?;
    std::fs::write(&path, buf)
        .with_context(|| format!("failed to write run log: {}", path.display()))?;
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};

    fn temp_home() -> PathBuf {
        static SEQ: AtomicU64 = AtomicU64::new(0);
        let seq = SEQ.fetch_add(1, Ordering::Relaxed);
        let home =
            std::env::temp_dir().join(format!("cvewatch-logs-test-{}-{seq}", std::process::id()));
        let _ = std::fs::remove_dir_all(&home);
        std::fs::create_dir_all(&home).expect("create home");
        home
    }

    #[test]
    fn write_run_log_records_the_run_shape() {
        let home = temp_home();
        let now = OffsetDateTime::now_utc();
        let record = RunLogRecord {
            artifact: Some("generic://app.jar".to_string()),
            watch: Some("prod-policy".to_string()),
            entry_count: 3,
            reports: vec![PathBuf::from("out/critical_cves_x.json")],
            uploaded: vec![],
        };

        let path = write_run_log(&home, "audit", now, now, "ok", &record).expect("write");
        let text = std::fs::read_to_string(&path).expect("read");
        let value: serde_json::Value = serde_json::from_str(&text).expect("parse");
        assert_eq!(value["command"], "audit");
        assert_eq!(value["status"], "ok");
        assert_eq!(value["watch"], "prod-policy");
        assert_eq!(value["entry_count"], 3);
        assert!(value.get("uploaded").is_none());

        let _ = std::fs::remove_dir_all(&home);
    }
}
