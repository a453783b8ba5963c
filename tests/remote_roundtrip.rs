use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::atomic::{AtomicU64, Ordering};

use httpmock::{Method::POST, Method::PUT, MockServer};

const ARTIFACT: &str = "generic://libs-release-local/com/example/app/1.0.0/app-1.0.0.jar";

fn cvewatch_cmd(home: &Path, server_url: &str) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_cvewatch"));
    cmd.env("HOME", home);
    cmd.env_remove("CVEWATCH_CONFIG");
    cmd.env_remove("CVEWATCH_QUERY_SEVERITIES");
    cmd.env_remove("CVEWATCH_QUERY_PAGE_LIMIT");
    cmd.env_remove("CVEWATCH_AUDIT_ARTIFACT");
    cmd.env_remove("CVEWATCH_AUDIT_WATCH");
    cmd.env_remove("CVEWATCH_REPORT_OUTPUT_DIR");
    cmd.env_remove("CVEWATCH_REPORT_MITIGATED_FILE");
    cmd.env_remove("CVEWATCH_UI_MAX_TABLE_ROWS");
    cmd.env("CVEWATCH_SERVER_URL", server_url);
    cmd.env("CVEWATCH_SERVER_USERNAME", "svc");
    cmd.env("CVEWATCH_SERVER_PASSWORD", "secret");
    cmd.env("CVEWATCH_REPORT_REPOSITORY", "reports-local");
    cmd
}

fn make_temp_home() -> PathBuf {
    static HOME_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = HOME_SEQ.fetch_add(1, Ordering::Relaxed);
    let home =
        std::env::temp_dir().join(format!("cvewatch-remote-test-{}-{seq}", std::process::id()));
    let _ = std::fs::remove_dir_all(&home);
    std::fs::create_dir_all(&home).expect("create home");
    home
}

fn violations_body() -> serde_json::Value {
    serde_json::json!({
        "data": [
            {
                "watch_name": "prod-policy",
                "impacted_artifact": {"component_id": ARTIFACT},
                "issues": [
                    {
                        "cve": "CVE-2023-0001",
                        "summary": "Heap overflow in parser",
                        "severity": "Critical",
                        "provider": "JFrog",
                        "fixed_versions": ["1.0.1"]
                    }
                ]
            }
        ]
    })
}

fn audit_args(out_dir: &Path, extra: &[&str]) -> Vec<String> {
    let mut args = vec![
        "audit".to_string(),
        "--artifact".to_string(),
        ARTIFACT.to_string(),
        "--watch".to_string(),
        "prod-policy".to_string(),
        "--output-dir".to_string(),
        out_dir.to_str().expect("path").to_string(),
    ];
    args.extend(extra.iter().map(|s| s.to_string()));
    args
}

fn run(home: &Path, server_url: &str, args: &[String]) -> Output {
    cvewatch_cmd(home, server_url)
        .args(args)
        .output()
        .expect("run cvewatch")
}

#[test]
fn audit_fetches_violations_and_writes_both_reports() {
    let server = MockServer::start();
    let fetch = server.mock(|when, then| {
        when.method(POST)
            .path("/xray/api/v1/violations")
            .header_exists("authorization");
        then.status(200).json_body(violations_body());
    });

    let home = make_temp_home();
    let out_dir = home.join("out");

    let out = run(&home, &server.base_url(), &audit_args(&out_dir, &[]));
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    fetch.assert();

    let names: Vec<String> = std::fs::read_dir(&out_dir)
        .expect("read out dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names.len(), 2, "names={names:?}");
    assert!(names.iter().any(|n| n.ends_with(".json")), "names={names:?}");
    assert!(names.iter().any(|n| n.ends_with(".md")), "names={names:?}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn audit_with_upload_puts_both_reports_into_the_repository() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/xray/api/v1/violations");
        then.status(200).json_body(violations_body());
    });
    let upload = server.mock(|when, then| {
        when.method(PUT)
            .path_contains("/artifactory/reports-local/critical_cves_prod-policy_");
        then.status(201);
    });

    let home = make_temp_home();
    let out_dir = home.join("out");

    let out = run(&home, &server.base_url(), &audit_args(&out_dir, &["--upload"]));
    assert!(
        out.status.success(),
        "stderr={}",
        String::from_utf8_lossy(&out.stderr)
    );
    assert_eq!(upload.hits(), 2);

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(stdout.contains("Uploaded:"), "stdout={stdout}");

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn fetch_failure_exits_20() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/xray/api/v1/violations");
        then.status(500);
    });

    let home = make_temp_home();
    let out_dir = home.join("out");

    let out = run(&home, &server.base_url(), &audit_args(&out_dir, &[]));
    assert_eq!(out.status.code(), Some(20));

    let _ = std::fs::remove_dir_all(&home);
}

#[test]
fn upload_failure_exits_20_but_keeps_the_local_reports() {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST).path("/xray/api/v1/violations");
        then.status(200).json_body(violations_body());
    });
    server.mock(|when, then| {
        when.method(PUT).path_contains("/artifactory/reports-local/");
        then.status(403);
    });

    let home = make_temp_home();
    let out_dir = home.join("out");

    let out = run(&home, &server.base_url(), &audit_args(&out_dir, &["--upload"]));
    assert_eq!(out.status.code(), Some(20));

    // the run failed, but the rendered reports stay on disk
    let count = std::fs::read_dir(&out_dir).expect("read out dir").count();
    assert_eq!(count, 2);

    let _ = std::fs::remove_dir_all(&home);
}
