use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use time::OffsetDateTime;

use crate::config::EffectiveConfig;
use crate::core::ReportEntry;
use crate::mitigations;
use crate::pipeline::{self, NormalizeOptions, TargetFilter};
use crate::publish;
use crate::render::{self, ReportMeta};
use crate::source::{self, FetchRequest};

#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub timeout: Duration,
    pub show_progress: bool,
}

pub struct Engine {
    opts: EngineOptions,
}

#[derive(Debug, Clone)]
pub enum ViolationInput {
    File(PathBuf),
    Remote,
}

#[derive(Debug, Clone)]
pub struct ReportRequest {
    pub input: ViolationInput,
    pub filter: Option<TargetFilter>,
    pub dedupe_by_cve: bool,
    pub title: String,
    pub mitigated_path: PathBuf,
    pub output_dir: PathBuf,
    pub upload: bool,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub entries: Vec<ReportEntry>,
    pub mitigated_missing: bool,
    pub json_path: PathBuf,
    pub md_path: PathBuf,
    pub uploaded: Vec<String>,
}

impl Engine {
    pub fn new(opts: EngineOptions) -> Self {
        Self { opts }
    }

    /// One strictly sequential run: load mitigations, fetch or read
    /// violations, normalize, render, write, optionally publish.
    pub fn run(&self, cfg: &EffectiveConfig, req: &ReportRequest) -> Result<RunOutcome> {
        let mitigated_missing = !req.mitigated_path.exists();
        let mitigated = mitigations::load(&req.mitigated_path).map_err(crate::exit::input_err)?;

        let violations = match &req.input {
            ViolationInput::File(path) => {
                source::from_file(path).map_err(crate::exit::input_err)?
            }
            ViolationInput::Remote => {
                let server = cfg.server.resolve().map_err(crate::exit::invalid_args_err)?;
                let client = self.http_client()?;
                let fetch_req = FetchRequest {
                    severities: cfg.query.severities.clone(),
                    page_limit: cfg.query.page_limit,
                };

                use std::io::IsTerminal;
                let progress_enabled = self.opts.show_progress && std::io::stderr().is_terminal();
                let pb = if progress_enabled {
                    let pb = indicatif::ProgressBar::new_spinner();
                    pb.set_draw_target(indicatif::ProgressDrawTarget::stderr());
                    pb.set_message("Fetching security violations...");
                    pb.enable_steady_tick(Duration::from_millis(120));
                    Some(pb)
                } else {
                    None
                };

                let result = source::fetch(&client, &server, &fetch_req);
                if let Some(pb) = pb {
                    pb.finish_and_clear();
                }
                result.map_err(crate::exit::network_err)?
            }
        };

        let entries = pipeline::normalize(
            &violations,
            &mitigated,
            &NormalizeOptions {
                filter: req.filter.clone(),
                dedupe_by_cve: req.dedupe_by_cve,
            },
        );

        let meta = ReportMeta {
            title: req.title.clone(),
            artifact: req.filter.as_ref().map(|f| f.component_id.clone()),
            watch: req.filter.as_ref().map(|f| f.watch_name.clone()),
        };
        let json = render::render_json(&entries)?;
        let markdown = render::render_markdown(&entries, &meta);
        let basename = render::report_basename(meta.watch.as_deref(), OffsetDateTime::now_utc())?;
        let written = render::write_reports(&req.output_dir, &basename, &json, &markdown)
            .map_err(crate::exit::input_err)?;

        let mut uploaded = Vec::new();
        if req.upload {
            let server = cfg.server.resolve().map_err(crate::exit::invalid_args_err)?;
            let repository = cfg.report.repository.as_deref().ok_or_else(|| {
                crate::exit::invalid_args(
                    "upload requires report.repository (or CVEWATCH_REPORT_REPOSITORY)",
                )
            })?;
            let client = self.http_client()?;
            for path in [&written.json_path, &written.md_path] {
                let url = publish::upload(&client, &server, repository, path)
                    .map_err(crate::exit::network_err)?;
                uploaded.push(url);
            }
        }

        Ok(RunOutcome {
            entries,
            mitigated_missing,
            json_path: written.json_path,
            md_path: written.md_path,
            uploaded,
        })
    }

    fn http_client(&self) -> Result<reqwest::blocking::Client> {
        reqwest::blocking::Client::builder()
            .timeout(self.opts.timeout)
            .build()
            .context("failed to build HTTP client")
    }
}
