//! # Slotwarden — Capacity-Bounded Poll Bot
//!
//! Creates a recurring group poll on WhatsApp, watches the votes, and closes
//! options when they fill up.
//!
//! Usage:
//!   slotwarden                         # run with ~/.slotwarden/config.toml
//!   slotwarden --config ./dev.toml     # explicit config
//!   slotwarden --list-groups           # print visible groups and exit

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use slotwarden_channels::WhatsAppChannel;
use slotwarden_core::{PollChannel, SlotwardenConfig};
use slotwarden_moderation::PollTrack;

#[derive(Parser)]
#[command(
    name = "slotwarden",
    version,
    about = "📊 Slotwarden — capacity-bounded group poll bot"
)]
struct Cli {
    /// Config file path
    #[arg(short, long, default_value = "~/.slotwarden/config.toml")]
    config: String,

    /// List group chats visible to the session and exit
    #[arg(long)]
    list_groups: bool,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        "slotwarden=debug"
    } else {
        "slotwarden=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_target(false)
        .init();

    let config_path = shellexpand::tilde(&cli.config).to_string();
    let config = SlotwardenConfig::load_from(Path::new(&config_path))
        .with_context(|| format!("failed to load config from {config_path}"))?;
    config.validate().context("invalid configuration")?;

    let tz: chrono_tz::Tz = config
        .timezone
        .parse()
        .map_err(|_| anyhow::anyhow!("unknown timezone '{}'", config.timezone))?;

    // Catch schedule typos before any poll goes out.
    for track in &config.tracks {
        for (label, expr) in [("reset_cron", &track.reset_cron), ("check_cron", &track.check_cron)] {
            if !slotwarden_scheduler::cron::validate(expr) {
                anyhow::bail!("track '{}': invalid {label} '{expr}'", track.name);
            }
        }
    }

    let channel = Arc::new(WhatsAppChannel::new(config.bridge.clone(), &config.group_id));
    channel
        .connect()
        .await
        .map_err(|e| anyhow::anyhow!("bridge check failed: {e}"))?;

    // Log the visible groups so operators can find the right group id.
    match channel.list_groups().await {
        Ok(groups) => {
            tracing::info!("📋 {} group chat(s) visible:", groups.len());
            for group in &groups {
                tracing::info!("  • {} — {}", group.name, group.id);
            }
        }
        Err(e) => tracing::warn!("⚠️ could not list groups: {e}"),
    }
    if cli.list_groups {
        return Ok(());
    }

    // Start every configured track: one poll now, then reset on schedule.
    let mut tracks = Vec::new();
    for track_config in &config.tracks {
        let track = Arc::new(PollTrack::new(
            track_config.clone(),
            &config.group_id,
            tz,
            channel.clone(),
        ));
        let reset_job = track
            .clone()
            .start()
            .await
            .map_err(|e| anyhow::anyhow!("track '{}': {e}", track_config.name))?;
        tracks.push((track, reset_job));
    }
    tracing::info!("🚀 slotwarden running with {} track(s) in {}", tracks.len(), tz);

    tokio::signal::ctrl_c().await?;
    tracing::info!("👋 shutting down");
    for (_, reset_job) in &tracks {
        reset_job.stop();
    }
    Ok(())
}
