//! Health and configuration commands

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use fathom_core::config::default_config_path;
use fathom_core::{Config, HealthStatus, TransactionSearch};

pub async fn cmd_health(search: &TransactionSearch, json: bool) -> Result<()> {
    let status = search.health(None).await?;

    let mut out = std::io::stdout().lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &status)?;
        writeln!(out)?;
    } else {
        write_health(&mut out, &status)?;
    }

    if !status.reachable {
        anyhow::bail!("Store is not reachable");
    }
    Ok(())
}

pub fn write_health<W: Write>(out: &mut W, status: &HealthStatus) -> Result<()> {
    writeln!(out)?;
    writeln!(out, "🩺 Store Health")?;
    writeln!(
        out,
        "   ─────────────────────────────────────────────────────────────"
    )?;

    if !status.reachable {
        writeln!(out, "   ❌ Unreachable")?;
        if let Some(ref error) = status.error {
            writeln!(out, "      {}", error)?;
        }
        return Ok(());
    }

    writeln!(
        out,
        "   ✅ Connected to {} ({})",
        status.cluster_name.as_deref().unwrap_or("unknown"),
        status.status.as_deref().unwrap_or("unknown")
    )?;
    if let Some(latency) = status.latency_ms {
        writeln!(out, "   Latency:    {} ms", latency)?;
    }
    if status.index_exists {
        writeln!(
            out,
            "   Index:      {} ({} documents)",
            status.index_name, status.document_count
        )?;
    } else {
        writeln!(out, "   ⚠️  Index '{}' does not exist", status.index_name)?;
    }

    Ok(())
}

pub fn cmd_config(config_path: Option<&Path>) -> Result<()> {
    let config = Config::load(config_path).context("Failed to load configuration")?;
    let mut out = std::io::stdout().lock();

    let source = config_path
        .map(Path::to_path_buf)
        .or_else(|| default_config_path().filter(|p| p.exists()));
    match source {
        Some(path) => writeln!(out, "Config file: {}", path.display())?,
        None => writeln!(out, "Config file: (built-in defaults)")?,
    }
    write_config(&mut out, &config)
}

/// Effective configuration with credentials redacted
pub fn write_config<W: Write>(out: &mut W, config: &Config) -> Result<()> {
    let store = &config.store;
    let auth = if store.api_key.is_some() {
        "api key"
    } else if store.username.is_some() {
        "basic"
    } else {
        "none"
    };

    writeln!(out, "[store]")?;
    writeln!(out, "host = {}", store.host)?;
    writeln!(out, "index = {}", store.index)?;
    writeln!(out, "auth = {}", auth)?;
    writeln!(out, "verify_certs = {}", store.verify_certs)?;
    writeln!(out, "timeout_secs = {}", store.timeout_secs)?;
    writeln!(out)?;
    writeln!(out, "[summary]")?;
    writeln!(out, "bucket_size = {}", config.summary.bucket_size)?;
    Ok(())
}
