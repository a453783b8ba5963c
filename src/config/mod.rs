use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub server: ServerConfig,
    pub query: QueryConfig,
    pub audit: AuditConfig,
    pub report: ReportConfig,
    pub ui: UiConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_path: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    // not serialized: `config --show` must not print credentials
    #[serde(skip_serializing)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryConfig {
    pub severities: Vec<String>,
    pub page_limit: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub watch: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportConfig {
    pub output_dir: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<String>,
    pub mitigated_file: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct UiConfig {
    pub max_table_rows: usize,
}

/// The connection parameters a remote operation actually needs. Resolution
/// fails up front with the missing keys named, instead of half-way through
/// a run.
#[derive(Debug, Clone)]
pub struct ResolvedServer {
    pub url: String,
    pub username: String,
    pub password: String,
}

impl ServerConfig {
    pub fn resolve(&self) -> Result<ResolvedServer> {
        let mut missing = Vec::new();
        if self.url.is_none() {
            missing.push("server.url");
        }
        if self.username.is_none() {
            missing.push("server.username");
        }
        if self.password.is_none() {
            missing.push("server.password");
        }
        if !missing.is_empty() {
            anyhow::bail!(
                "server connection is not configured: missing {} (set them in config.toml or via CVEWATCH_SERVER_* variables)",
                missing.join(", ")
            );
        }
        Ok(ResolvedServer {
            url: self
                .url
                .clone()
                .unwrap_or_default()
                .trim_end_matches('/')
                .to_string(),
            username: self.username.clone().unwrap_or_default(),
            password: self.password.clone().unwrap_or_default(),
        })
    }
}

impl Default for EffectiveConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                url: None,
                username: None,
                password: None,
            },
            query: QueryConfig {
                severities: vec!["Critical".to_string()],
                page_limit: 100,
            },
            audit: AuditConfig {
                artifact: None,
                watch: None,
            },
            report: ReportConfig {
                output_dir: ".".to_string(),
                repository: None,
                mitigated_file: "mitigated_cves.txt".to_string(),
            },
            ui: UiConfig { max_table_rows: 20 },
            config_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    server: Option<RawServerConfig>,
    query: Option<RawQueryConfig>,
    audit: Option<RawAuditConfig>,
    report: Option<RawReportConfig>,
    ui: Option<RawUiConfig>,
}

#[derive(Debug, Deserialize)]
struct RawServerConfig {
    url: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawQueryConfig {
    severities: Option<Vec<String>>,
    page_limit: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawAuditConfig {
    artifact: Option<String>,
    watch: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawReportConfig {
    output_dir: Option<String>,
    repository: Option<String>,
    mitigated_file: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawUiConfig {
    max_table_rows: Option<usize>,
}

pub fn default_config_path(home_dir: &Path) -> PathBuf {
    home_dir.join(".config/cvewatch/config.toml")
}

pub fn effective_home_dir() -> Result<PathBuf> {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .filter(|p| !p.as_os_str().is_empty())
        .ok_or_else(|| anyhow::anyhow!("HOME is not set"))
}

pub fn load(config_path: Option<&Path>, home_dir: &Path) -> Result<EffectiveConfig> {
    let mut cfg = EffectiveConfig::default();

    let path = config_path
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| default_config_path(home_dir));

    if path.exists() {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let raw: RawConfig = toml::from_str(&s).context("failed to parse config file (TOML)")?;
        apply_raw_config(&mut cfg, raw);
        cfg.config_path = Some(path.display().to_string());
    }

    apply_env_overrides(&mut cfg)?;

    Ok(cfg)
}

fn apply_raw_config(cfg: &mut EffectiveConfig, raw: RawConfig) {
    if let Some(server) = raw.server {
        if let Some(url) = server.url {
            cfg.server.url = Some(url);
        }
        if let Some(username) = server.username {
            cfg.server.username = Some(username);
        }
        if let Some(password) = server.password {
            cfg.server.password = Some(password);
        }
    }

    if let Some(query) = raw.query {
        if let Some(severities) = query.severities {
            cfg.query.severities = severities;
        }
        if let Some(page_limit) = query.page_limit {
            cfg.query.page_limit = page_limit;
        }
    }

    if let Some(audit) = raw.audit {
        if let Some(artifact) = audit.artifact {
            cfg.audit.artifact = Some(artifact);
        }
        if let Some(watch) = audit.watch {
            cfg.audit.watch = Some(watch);
        }
    }

    if let Some(report) = raw.report {
        if let Some(output_dir) = report.output_dir {
            cfg.report.output_dir = output_dir;
        }
        if let Some(repository) = report.repository {
            cfg.report.repository = Some(repository);
        }
        if let Some(mitigated_file) = report.mitigated_file {
            cfg.report.mitigated_file = mitigated_file;
        }
    }

    if let Some(ui) = raw.ui {
        if let Some(max_table_rows) = ui.max_table_rows {
            cfg.ui.max_table_rows = max_table_rows;
        }
    }
}

fn apply_env_overrides(cfg: &mut EffectiveConfig) -> Result<()> {
    if let Ok(v) = std::env::var("CVEWATCH_SERVER_URL") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.server.url = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("CVEWATCH_SERVER_USERNAME") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.server.username = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("CVEWATCH_SERVER_PASSWORD") {
        if !v.is_empty() {
            cfg.server.password = Some(v);
        }
    }
    if let Ok(v) = std::env::var("CVEWATCH_QUERY_SEVERITIES") {
        let parts: Vec<String> = v
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        if !parts.is_empty() {
            cfg.query.severities = parts;
        }
    }
    if let Ok(v) = std::env::var("CVEWATCH_QUERY_PAGE_LIMIT") {
        cfg.query.page_limit = v
            .trim()
            .parse::<u32>()
            .with_context(|| "CVEWATCH_QUERY_PAGE_LIMIT")?;
    }
    if let Ok(v) = std::env::var("CVEWATCH_AUDIT_ARTIFACT") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.audit.artifact = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("CVEWATCH_AUDIT_WATCH") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.audit.watch = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("CVEWATCH_REPORT_OUTPUT_DIR") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.report.output_dir = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("CVEWATCH_REPORT_REPOSITORY") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.report.repository = Some(v.to_string());
        }
    }
    if let Ok(v) = std::env::var("CVEWATCH_REPORT_MITIGATED_FILE") {
        let v = v.trim();
        if !v.is_empty() {
            cfg.report.mitigated_file = v.to_string();
        }
    }
    if let Ok(v) = std::env::var("CVEWATCH_UI_MAX_TABLE_ROWS") {
        cfg.ui.max_table_rows = v
            .trim()
            .parse::<usize>()
            .with_context(|| "CVEWATCH_UI_MAX_TABLE_ROWS")?;
    }

    Ok(())
}
