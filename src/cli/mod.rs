use std::io::{self, IsTerminal};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, CommandFactory, Parser, Subcommand};
use time::OffsetDateTime;

use crate::config::EffectiveConfig;
use crate::engine::{Engine, EngineOptions, ReportRequest, ViolationInput};
use crate::logs::RunLogRecord;
use crate::pipeline::TargetFilter;
use crate::ui::UiConfig;

#[derive(Debug, Parser)]
#[command(
    name = "cvewatch",
    version,
    about = "Generate CVE compliance reports from security-scanning violation data"
)]
pub struct Cli {
    #[arg(long, global = true)]
    pub json: bool,
    #[arg(long, global = true)]
    pub verbose: bool,
    #[arg(long, global = true)]
    pub quiet: bool,
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    #[arg(long, default_value_t = 30, global = true)]
    pub timeout: u64,
    #[arg(long, global = true)]
    pub output_dir: Option<PathBuf>,
    #[arg(long, global = true)]
    pub mitigated: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    Audit(AuditArgs),
    Sweep(SweepArgs),
    Config(ConfigArgs),
    Completion(CompletionArgs),
}

#[derive(Debug, Args)]
pub struct AuditArgs {
    #[arg(long)]
    pub artifact: Option<String>,
    #[arg(long)]
    pub watch: Option<String>,
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub upload: bool,
}

#[derive(Debug, Args)]
pub struct SweepArgs {
    #[arg(long)]
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub upload: bool,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[arg(long)]
    pub show: bool,
}

#[derive(Debug, Args)]
pub struct CompletionArgs {
    pub shell: String,
}

pub fn run() -> Result<()> {
    let cli = Cli::parse();

    let home_dir = crate::config::effective_home_dir()?;

    let env_config_path = std::env::var_os("CVEWATCH_CONFIG").map(PathBuf::from);
    let cfg = crate::config::load(
        cli.config.as_deref().or(env_config_path.as_deref()),
        &home_dir,
    )
    .map_err(crate::exit::invalid_args_err)?;

    let ui_cfg = UiConfig {
        quiet: cli.quiet,
        verbose: cli.verbose,
        max_table_rows: cfg.ui.max_table_rows,
    };

    let engine = Engine::new(EngineOptions {
        timeout: Duration::from_secs(cli.timeout),
        show_progress: io::stderr().is_terminal() && !cli.quiet && !cli.json,
    });

    match cli.command {
        Commands::Audit(args) => {
            let artifact = args
                .artifact
                .or_else(|| cfg.audit.artifact.clone())
                .ok_or_else(|| {
                    crate::exit::invalid_args(
                        "audit: a target artifact is required (--artifact, [audit] artifact, or CVEWATCH_AUDIT_ARTIFACT)",
                    )
                })?;
            let watch = args
                .watch
                .or_else(|| cfg.audit.watch.clone())
                .ok_or_else(|| {
                    crate::exit::invalid_args(
                        "audit: a target watch is required (--watch, [audit] watch, or CVEWATCH_AUDIT_WATCH)",
                    )
                })?;

            let req = ReportRequest {
                input: violation_input(args.input),
                filter: Some(TargetFilter {
                    component_id: artifact,
                    watch_name: watch.clone(),
                }),
                dedupe_by_cve: true,
                title: format!("Critical CVEs from Watch: `{watch}`"),
                mitigated_path: mitigated_path(&cli.mitigated, &cfg),
                output_dir: output_dir(&cli.output_dir, &cfg),
                upload: args.upload,
            };
            run_report(&engine, &cfg, &home_dir, "audit", req, &ui_cfg, cli.json)?;
        }
        Commands::Sweep(args) => {
            let req = ReportRequest {
                input: violation_input(args.input),
                filter: None,
                dedupe_by_cve: false,
                title: "Critical CVEs Report".to_string(),
                mitigated_path: mitigated_path(&cli.mitigated, &cfg),
                output_dir: output_dir(&cli.output_dir, &cfg),
                upload: args.upload,
            };
            run_report(&engine, &cfg, &home_dir, "sweep", req, &ui_cfg, cli.json)?;
        }
        Commands::Config(args) => {
            if args.show {
                if cli.json {
                    let stdout = io::stdout();
                    serde_json::to_writer_pretty(stdout.lock(), &cfg)?;
                    println!();
                } else {
                    println!("{}", toml::to_string_pretty(&cfg)?);
                }
            } else if !ui_cfg.quiet {
                eprintln!("config: use `cvewatch config --show`");
            }
        }
        Commands::Completion(args) => {
            let shell = parse_shell(&args.shell)?;
            let mut cmd = Cli::command();
            let mut out = io::stdout().lock();
            clap_complete::generate(shell, &mut cmd, "cvewatch", &mut out);
        }
    }

    Ok(())
}

fn violation_input(input: Option<PathBuf>) -> ViolationInput {
    match input {
        Some(path) => ViolationInput::File(path),
        None => ViolationInput::Remote,
    }
}

fn mitigated_path(flag: &Option<PathBuf>, cfg: &EffectiveConfig) -> PathBuf {
    flag.clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.report.mitigated_file))
}

fn output_dir(flag: &Option<PathBuf>, cfg: &EffectiveConfig) -> PathBuf {
    flag.clone()
        .unwrap_or_else(|| PathBuf::from(&cfg.report.output_dir))
}

fn run_report(
    engine: &Engine,
    cfg: &EffectiveConfig,
    home_dir: &Path,
    command: &'static str,
    req: ReportRequest,
    ui_cfg: &UiConfig,
    json_out: bool,
) -> Result<()> {
    let started_at = OffsetDateTime::now_utc();
    let result = engine.run(cfg, &req);
    let finished_at = OffsetDateTime::now_utc();

    let (artifact, watch) = match &req.filter {
        Some(filter) => (
            Some(filter.component_id.clone()),
            Some(filter.watch_name.clone()),
        ),
        None => (None, None),
    };

    match result {
        Ok(outcome) => {
            let record = RunLogRecord {
                artifact,
                watch: watch.clone(),
                entry_count: outcome.entries.len(),
                reports: vec![outcome.json_path.clone(), outcome.md_path.clone()],
                uploaded: outcome.uploaded.clone(),
            };
            crate::logs::write_run_log(home_dir, command, started_at, finished_at, "ok", &record)
                .context("run completed but writing the run log failed")?;

            if outcome.mitigated_missing && !ui_cfg.quiet {
                eprintln!(
                    "warning: mitigated CVE list not found at {}; every CVE will be reported as unmitigated",
                    req.mitigated_path.display()
                );
            }

            if json_out {
                write_json(&outcome.entries)?;
            } else {
                crate::ui::print_run_summary(&outcome, ui_cfg, watch.as_deref());
            }
            Ok(())
        }
        Err(err) => {
            let record = RunLogRecord {
                artifact,
                watch,
                entry_count: 0,
                reports: vec![],
                uploaded: vec![],
            };
            let status = format!("error: {err}");
            let _ = crate::logs::write_run_log(
                home_dir,
                command,
                started_at,
                finished_at,
                &status,
                &record,
            );
            Err(err)
        }
    }
}

fn write_json(entries: &[crate::core::ReportEntry]) -> Result<()> {
    use std::io::Write;

    let buf = serde_json::to_vec_pretty(entries)?;

    let mut stdout = io::stdout().lock();
    match stdout.write_all(&buf) {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => return Ok(()),
        Err(err) => return Err(err.into()),
    }
    match stdout.write_all(b"\n") {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::BrokenPipe => Ok(()),
        Err(err) => Err(err.into()),
    }
}

fn parse_shell(s: &str) -> Result<clap_complete::Shell> {
    let s = s.trim().to_ascii_lowercase();
    match s.as_str() {
        "bash" => Ok(clap_complete::Shell::Bash),
        "zsh" => Ok(clap_complete::Shell::Zsh),
        "fish" => Ok(clap_complete::Shell::Fish),
        other => Err(crate::exit::invalid_args(format!(
            "unsupported shell: {other} (expected bash|zsh|fish)"
        ))),
    }
}
