//! CLI command implementations

use crate::config::{self, Config};
use crate::output::{file_name_from_url, format_bytes};
use crate::progress::{BarProgress, JsonProgress};
use crate::{ConfigAction, OutputFormat};
use anyhow::{anyhow, bail, Context, Result};
use console::style;
use reget_core::{
    CancellationToken, ExpectedChecksum, FileDownloader, HttpTransport, Interrupted, NoProgress,
    ProgressSink,
};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::debug;

/// Exit status when the download failed
const EXIT_FAILED: u8 = 1;
/// Exit status after a timeout
const EXIT_TIMED_OUT: u8 = 124;
/// Exit status after Ctrl-C
const EXIT_CANCELLED: u8 = 130;

fn build_downloader(config: &Config) -> Result<FileDownloader<HttpTransport>> {
    let transport = HttpTransport::new(config.transport())?;
    Ok(FileDownloader::new(transport, config.download_options()))
}

/// Cancel `token` on Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            debug!("Ctrl-C received, cancelling");
            token.cancel();
        }
    });
}

fn parse_sha256(hex_digest: &str) -> Result<ExpectedChecksum> {
    let digest = hex::decode(hex_digest.trim()).context("--sha256 must be hex")?;
    if digest.len() != 32 {
        bail!("--sha256 must be 64 hex characters, got {}", hex_digest.trim().len());
    }
    Ok(ExpectedChecksum::sha256(digest))
}

// ============================================================================
// Download
// ============================================================================

pub async fn get(
    config: &Config,
    url: &str,
    out: Option<PathBuf>,
    sha256: Option<&str>,
    show_progress: bool,
    format: OutputFormat,
) -> Result<ExitCode> {
    let destination = match out {
        Some(path) => path,
        None => PathBuf::from(
            file_name_from_url(url)
                .ok_or_else(|| anyhow!("Cannot derive a file name from {url}, use --out"))?,
        ),
    };
    let checksum = sha256.map(parse_sha256).transpose()?;

    let downloader = build_downloader(config)?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let label = destination.display().to_string();
    let bar = (show_progress && format == OutputFormat::Human).then(|| BarProgress::new(&label));
    let json = JsonProgress::default();
    let sink: &dyn ProgressSink = match (&bar, format) {
        (Some(bar), _) => bar,
        (None, OutputFormat::Json) if show_progress => &json,
        _ => &NoProgress,
    };

    let result = downloader
        .try_download_file_with_checksum(url, &destination, checksum, sink, &cancel)
        .await;

    let (status, code) = match result {
        Ok(true) => ("completed", ExitCode::SUCCESS),
        Ok(false) => ("failed", ExitCode::from(EXIT_FAILED)),
        Err(Interrupted::Cancelled) => ("cancelled", ExitCode::from(EXIT_CANCELLED)),
        Err(Interrupted::TimedOut) => ("timed_out", ExitCode::from(EXIT_TIMED_OUT)),
    };

    match format {
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "url": url,
                "path": destination,
                "status": status,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
        OutputFormat::Human => {
            let failed = style("✗").red().bold();
            let message = match result {
                Ok(true) => {
                    format!("{} Saved {}", style("✓").green().bold(), style(&label).cyan())
                }
                Ok(false) => format!("{failed} Download failed (see log, use -v for details)"),
                Err(Interrupted::Cancelled) => {
                    format!("{} Cancelled, run again to resume", style("○").dim())
                }
                Err(Interrupted::TimedOut) => format!("{failed} Timed out, run again to resume"),
            };
            match &bar {
                Some(bar) if result == Ok(true) => bar.finish(message),
                Some(bar) => bar.abandon(message),
                None => println!("{message}"),
            }
        }
    }

    Ok(code)
}

// ============================================================================
// Probe
// ============================================================================

pub async fn probe(config: &Config, urls: Vec<String>, format: OutputFormat) -> Result<ExitCode> {
    let downloader = build_downloader(config)?;
    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());

    let mut code = ExitCode::SUCCESS;
    let mut results = Vec::new();

    for url in urls {
        match downloader.probe(&url, &cancel).await {
            Ok(metadata) => {
                let ok = metadata.status.is_success();
                if !ok {
                    code = ExitCode::from(EXIT_FAILED);
                }
                results.push(serde_json::json!({
                    "url": url,
                    "status": metadata.status.as_u16(),
                    "size": metadata.content_length,
                    "range_supported": metadata.range_supported,
                    "checksum": metadata.checksum.as_ref().map(|c| {
                        serde_json::json!({
                            "algorithm": c.algorithm,
                            "digest": hex::encode(&c.digest),
                        })
                    }),
                }));

                if format == OutputFormat::Human {
                    if ok {
                        println!("{} {}", style("✓").green(), url);
                    } else {
                        let status = style(metadata.status).red();
                        println!("{} {}: {}", style("✗").red(), url, status);
                    }
                    match metadata.content_length {
                        Some(size) => println!("    Size: {} ({} bytes)", format_bytes(size), size),
                        None => println!("    Size: {}", style("unknown").yellow()),
                    }
                    println!(
                        "    Resumable: {}",
                        if metadata.range_supported {
                            style("Yes").green()
                        } else {
                            style("No").yellow()
                        }
                    );
                    if let Some(checksum) = &metadata.checksum {
                        println!("    {}: {}", checksum.algorithm, hex::encode(&checksum.digest));
                    }
                }
            }
            Err(e) => {
                code = ExitCode::from(EXIT_FAILED);
                results.push(serde_json::json!({ "url": url, "error": e.to_string() }));
                if format == OutputFormat::Human {
                    println!("{} {}: {}", style("✗").red(), url, style(&e).red());
                }
                if e.interruption().is_some() {
                    break;
                }
            }
        }
    }

    if format == OutputFormat::Json {
        println!("{}", serde_json::to_string_pretty(&results)?);
    }

    Ok(code)
}

// ============================================================================
// Config
// ============================================================================

pub fn config_action(
    config: &Config,
    action: Option<ConfigAction>,
    format: OutputFormat,
) -> Result<()> {
    match action.unwrap_or(ConfigAction::Show) {
        ConfigAction::Show => match format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(config)?),
            OutputFormat::Human => {
                let options = config.download_options();
                let transport = config.transport();
                println!("{}", style("Download").bold());
                println!("  max_retries:         {}", options.max_retries);
                println!("  initial_retry_delay: {:?}", options.initial_retry_delay);
                println!("  max_retry_delay:     {:?}", options.max_retry_delay);
                println!("  chunk_size:          {}", format_bytes(options.chunk_size));
                println!("  buffer_size:         {}", format_bytes(options.buffer_size as u64));
                println!("{}", style("HTTP").bold());
                println!("  user_agent:          {}", transport.user_agent);
                println!("  connect_timeout:     {:?}", transport.connect_timeout);
                println!("  request_timeout:     {:?}", transport.request_timeout);
            }
        },
        ConfigAction::Path => match config::default_path() {
            Some(path) => println!("{}", path.display()),
            None => bail!("No config directory on this platform"),
        },
    }
    Ok(())
}
