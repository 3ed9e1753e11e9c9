//! Huddle CLI application

use anyhow::Result;
use clap::{Parser, Subcommand};
use directories::ProjectDirs;
use huddle_core::prelude::*;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

mod terminal_ui;

use terminal_ui::TerminalUI;

#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Join a call
    Join {
        /// Display name shown on your tile
        #[arg(short, long, env = "HUDDLE_NAME")]
        name: Option<String>,

        /// Channel to join (overrides the config file)
        #[arg(short, long)]
        channel: Option<String>,

        /// Application identifier (overrides the config file)
        #[arg(long)]
        app_id: Option<String>,

        /// Temporary auth token (overrides the config file)
        #[arg(long)]
        token: Option<String>,

        /// Path to a JSON config file
        #[arg(long)]
        config: Option<PathBuf>,

        /// Script remote participants on the loopback engine
        #[arg(long)]
        demo: bool,
    },

    /// Show status and available commands
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing for debugging
    tracing_subscriber::fmt()
        .with_env_filter("huddle=info")
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Join {
            name,
            channel,
            app_id,
            token,
            config,
            demo,
        } => {
            handle_join(name, channel, app_id, token, config, demo).await?;
        }
        Commands::Status => {
            handle_status();
        }
    }

    Ok(())
}

async fn handle_join(
    name: Option<String>,
    channel: Option<String>,
    app_id: Option<String>,
    token: Option<String>,
    config_path: Option<PathBuf>,
    demo: bool,
) -> Result<()> {
    let config = resolve_config(channel, app_id, token, config_path)?;
    let name = match name {
        Some(name) if !name.trim().is_empty() => name.trim().to_string(),
        _ => prompt_display_name()?,
    };

    let engine = Arc::new(LoopbackEngine::new());
    let service = Arc::new(
        CallService::builder(engine.clone() as Arc<dyn RtcEngine>, config.clone())
            .with_display_name(name.as_str())
            .build(),
    );

    println!("📞 Joining channel '{}' as {}...", config.channel, name);
    if !service.join_call().await {
        println!("❌ Could not join the channel; check your configuration and try again.");
        return Ok(());
    }
    println!("✅ Joined channel '{}'", config.channel);

    if demo {
        spawn_demo_participants(Arc::clone(&engine), Arc::clone(&service));
    }

    let mut ui = TerminalUI::new()?;
    ui.run(Arc::clone(&service)).await?;
    drop(ui);

    service.leave_call().await;
    println!("📞 Call ended");
    Ok(())
}

/// Resolve the call configuration from flags, a config file, and the
/// environment
///
/// Precedence, highest first: command-line flags, `HUDDLE_*` variables,
/// the config file (`--config`, falling back to the platform config dir),
/// and finally a built-in loopback demo configuration.
fn resolve_config(
    channel: Option<String>,
    app_id: Option<String>,
    token: Option<String>,
    config_path: Option<PathBuf>,
) -> Result<CallConfig> {
    let path = config_path.or_else(default_config_path);
    let mut config = match CallConfig::load(path.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            tracing::debug!(error = %e, "no usable config source, using demo defaults");
            CallConfig::new("huddle-demo", "main")
        }
    };

    if let Some(app_id) = app_id {
        config.app_id = app_id;
    }
    if let Some(channel) = channel {
        config.channel = channel;
    }
    if let Some(token) = token {
        config = config.with_token(token);
    }
    config.validate()?;
    Ok(config)
}

fn default_config_path() -> Option<PathBuf> {
    let dirs = ProjectDirs::from("", "", "huddle")?;
    let path = dirs.config_dir().join("config.json");
    path.exists().then_some(path)
}

/// The name-entry dialog: the call is not joined until a non-empty name is
/// submitted
fn prompt_display_name() -> Result<String> {
    loop {
        print!("Enter your name: ");
        io::stdout().flush()?;
        let mut line = String::new();
        io::stdin().read_line(&mut line)?;
        let name = line.trim();
        if !name.is_empty() {
            return Ok(name.to_string());
        }
    }
}

/// Script a couple of remote participants so the tile grid has something to
/// show on the loopback engine
fn spawn_demo_participants(engine: Arc<LoopbackEngine>, service: Arc<CallService>) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(2)).await;
        let robin = ParticipantUid::new(42);
        service.set_participant_name(robin, "Robin");
        engine.announce_publish(robin, MediaKind::Video);
        engine.announce_publish(robin, MediaKind::Audio);
        tracing::info!(uid = %robin, "demo participant joined");

        tokio::time::sleep(Duration::from_secs(3)).await;
        let kai = ParticipantUid::new(7);
        service.set_participant_name(kai, "Kai");
        engine.announce_publish(kai, MediaKind::Video);
        tracing::info!(uid = %kai, "demo participant joined");

        tokio::time::sleep(Duration::from_secs(12)).await;
        engine.announce_unpublish(kai, MediaKind::Video);
        tracing::info!(uid = %kai, "demo participant stopped video");

        tokio::time::sleep(Duration::from_secs(3)).await;
        engine.announce_leave(robin);
        tracing::info!(uid = %robin, "demo participant left");
    });
}

fn handle_status() {
    println!("📊 Huddle CLI Status");
    println!("====================");
    println!("✅ CLI interface: Ready");
    println!("✅ Terminal UI: Available");
    println!("✅ Engine: In-process loopback");
    println!("⚠️  Vendor engine binding: Not bundled");
    println!();
    println!("Available commands:");
    println!("  huddle join [options]   - Join a call");
    println!("  huddle status           - Show this status");
    println!();
    println!("Use 'huddle --help' for detailed options");
}
