//! Upload/process/download, history and delete commands.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use photoprep_core::config::Config;
use photoprep_core::images::{LocalId, RemoteId};
use photoprep_core::processing::{DirectoryTarget, ProcessOutcome};
use photoprep_core::remote::UploadFile;
use serde_json::json;

use super::account::credits_label;
use crate::cli::client::{Client, client_error};

/// Where processed results go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOptions {
    out: Option<PathBuf>,
    skip: bool,
}

impl DownloadOptions {
    pub fn new(out: Option<PathBuf>, skip: bool) -> Self {
        Self { out, skip }
    }

    /// `--out`, then the configured `download_dir`, then the current directory.
    fn target(&self, config: &Config) -> Option<DirectoryTarget> {
        if self.skip {
            return None;
        }
        let dir = self
            .out
            .clone()
            .or_else(|| config.download_dir.as_deref().map(expand_home))
            .unwrap_or_else(|| PathBuf::from("."));
        Some(DirectoryTarget::new(dir))
    }
}

/// Expands a leading `~` in a configured path. Left as is when there is no
/// home directory.
fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}

fn read_upload(path: &Path) -> Result<UploadFile> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
    Ok(UploadFile::new(name, bytes))
}

/// Uploads every file, processes the uploads concurrently and downloads
/// the results. Fails if any image failed at any step.
pub async fn process(config: &Config, files: &[PathBuf], download: DownloadOptions) -> Result<()> {
    let mut client = Client::connect(config)?;
    client.require_session().await?;

    let mut failed = 0usize;
    let mut uploaded: Vec<LocalId> = Vec::with_capacity(files.len());

    for path in files {
        let file = read_upload(path)?;
        let name = file.file_name.clone();
        match client.uploader().upload(file).await {
            Ok(image) => {
                tracing::debug!(file = %name, remote_id = %image.remote_id(), "uploaded");
                uploaded.push(image.local_id());
            }
            Err(err) => {
                failed += 1;
                eprintln!("{name}: {err}");
            }
        }
    }

    let results = client.coordinator().process_many(&uploaded).await;
    let mut completed = Vec::new();
    for (id, result) in results {
        let name = client
            .registry()
            .get(id)
            .map_or_else(|| id.to_string(), |image| image.file_name().to_string());
        match result {
            Ok(ProcessOutcome::Completed { result_url, .. }
            | ProcessOutcome::AlreadyCompleted { result_url }) => {
                println!("{name}: processed ({result_url})");
                completed.push(id);
            }
            Ok(ProcessOutcome::Discarded) => {
                failed += 1;
                eprintln!("{name}: result discarded");
            }
            Err(err) => {
                failed += 1;
                eprintln!("{name}: {err}");
            }
        }
    }

    if let Some(target) = download.target(config) {
        for id in completed {
            match client.coordinator().download(id, &target).await {
                Ok(path) => println!("Saved {}", path.display()),
                Err(err) => {
                    failed += 1;
                    eprintln!("{id}: {err}");
                }
            }
        }
    }

    client.drain_events();
    if let Some(session) = client.session().get() {
        println!("Plan: {} ({})", session.plan, credits_label(config, &session));
    }

    if failed > 0 {
        bail!("{failed} of {} images failed", files.len());
    }
    Ok(())
}

pub async fn history(config: &Config, json: bool) -> Result<()> {
    let mut client = Client::connect(config)?;
    client.require_session().await?;

    let result = client.history().list().await;
    client.drain_events();
    let records = result.map_err(|e| client_error(&e))?;

    if json {
        let items: Vec<_> = records
            .iter()
            .map(|r| {
                json!({
                    "image_id": r.remote_id.as_str(),
                    "status": r.status,
                    "original_filename": r.original_filename,
                    "original_url": r.original_url,
                    "processed_url": r.processed_url,
                    "created_at": r.created_at,
                })
            })
            .collect();
        let out = serde_json::to_string_pretty(&items).context("serialize history")?;
        println!("{out}");
        return Ok(());
    }

    if records.is_empty() {
        println!("No images yet.");
        return Ok(());
    }

    for record in &records {
        println!(
            "{:<24} {:<10} {:<20} {}",
            record.remote_id.as_str(),
            record.status.to_string(),
            record.created_at.as_deref().unwrap_or("-"),
            record.original_filename.as_deref().unwrap_or(""),
        );
    }
    Ok(())
}

pub async fn delete(config: &Config, id: &str) -> Result<()> {
    let mut client = Client::connect(config)?;
    client.require_session().await?;

    let result = client.history().delete(&RemoteId::new(id)).await;
    client.drain_events();
    result.map_err(|e| client_error(&e))?;

    println!("Deleted {id}");
    Ok(())
}
