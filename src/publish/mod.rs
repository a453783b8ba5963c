use std::path::Path;

use anyhow::{Context, Result};
use reqwest::blocking::Client;

use crate::config::ResolvedServer;

/// Uploads a rendered report file to the artifact store. The remote path is
/// the base URL, the target repository and the file's base name; transport
/// errors and non-2xx responses propagate to the caller.
pub fn upload(
    client: &Client,
    server: &ResolvedServer,
    repository: &str,
    path: &Path,
) -> Result<String> {
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow::anyhow!("upload path has no file name: {}", path.display()))?;
    let url = format!("{}/artifactory/{repository}/{file_name}", server.url);

    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read report for upload: {}", path.display()))?;

    client
        .put(&url)
        .basic_auth(&server.username, Some(&server.password))
        .body(bytes)
        .send()
        .with_context(|| format!("upload request failed: {url}"))?
        .error_for_status()
        .with_context(|| format!("upload rejected: {url}"))?;

    Ok(url)
}
