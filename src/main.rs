use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use playmanity_session::{
    AdOutcome, AdProgress, ClientConfig, Playmanity, Result, SessionError, SessionEvent,
};
use tokio_util::sync::CancellationToken;

#[derive(Parser)]
#[command(name = "playmanity", about = "Playmanity backend session client")]
struct Cli {
    /// JSON config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the API base URL
    #[arg(long)]
    server_url: Option<String>,

    /// Override the game UUID
    #[arg(long)]
    game_uuid: Option<String>,

    /// Log filter when RUST_LOG is unset
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Authorize this device, then hold a session until Ctrl-C
    Login {
        /// Device identifier supplied by the host
        #[arg(long)]
        device_id: String,
    },
    /// Hold a session with an existing token until Ctrl-C
    Session {
        #[arg(long, env = "PLAYMANITY_TOKEN")]
        token: String,
    },
    /// Fetch one advertisement and run it for the given time
    Ad {
        #[arg(long, env = "PLAYMANITY_TOKEN")]
        token: String,
        /// Display time in seconds
        #[arg(long, default_value_t = 5)]
        seconds: u64,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level)),
        )
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("[playmanity] {e}");
        std::process::exit(1);
    }
}

fn load_config(cli: &Cli) -> Result<ClientConfig> {
    let mut config = match &cli.config {
        Some(path) => ClientConfig::from_file(path)?,
        None => ClientConfig::default(),
    }
    .apply_env();

    if let Some(url) = &cli.server_url {
        config.server_url = url.clone();
    }
    if let Some(uuid) = &cli.game_uuid {
        config.game_uuid = uuid.clone();
    }
    Ok(config)
}

async fn run(cli: Cli) -> Result<()> {
    let client = Playmanity::init(load_config(&cli)?)?;
    spawn_event_logger(&client);

    let result = match cli.command {
        Commands::Login { device_id } => {
            let cancel = CancellationToken::new();
            let ctrl_c = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    ctrl_c.cancel();
                }
            });

            let authenticated = client
                .authenticate(&device_id, &cancel, |pending| {
                    println!("Open this URL to authorize the device:\n  {}", pending.auth_url);
                })
                .await;
            match authenticated {
                Ok(true) => hold_until_ctrl_c(&client).await,
                Ok(false) => Ok(()),
                Err(SessionError::Cancelled) => Ok(()),
                Err(e) => Err(e),
            }
        }
        Commands::Session { token } => {
            client.session().set_auth_token(token);
            if client.session().init_session().await? {
                hold_until_ctrl_c(&client).await
            } else {
                Ok(())
            }
        }
        Commands::Ad { token, seconds } => {
            client.session().set_auth_token(token);
            client.session().init_session().await?;
            show_ad(&client, Duration::from_secs(seconds)).await
        }
    };

    // Shutdown hook: always end the session before exiting
    if !client.shutdown().await {
        eprintln!("[playmanity] session could not be ended cleanly");
    }
    result
}

fn spawn_event_logger(client: &Playmanity) {
    let mut events = client.session().subscribe();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::StateChanged(valid) => {
                    println!("session {}", if valid { "active" } else { "inactive" });
                }
                SessionEvent::ApiError { context, message, .. } => {
                    eprintln!("[playmanity] {context}: {message}");
                }
            }
        }
    });
}

async fn hold_until_ctrl_c(client: &Playmanity) -> Result<()> {
    println!("Session active; press Ctrl-C to end it");
    tokio::signal::ctrl_c()
        .await
        .map_err(|e| SessionError::Config(format!("cannot listen for Ctrl-C: {e}")))?;
    tracing::debug!(phase = %client.session().phase(), "Ctrl-C received");
    Ok(())
}

async fn show_ad(client: &Playmanity, display_time: Duration) -> Result<()> {
    let handle = client.ads().start(display_time)?;
    let mut progress = handle.progress();

    let printer = tokio::spawn(async move {
        let mut last_decile = None;
        while progress.changed().await.is_ok() {
            let line = match &*progress.borrow_and_update() {
                AdProgress::Showing { ad, progress } => {
                    let decile = (progress * 10.0) as u32;
                    if last_decile == Some(decile) {
                        None
                    } else {
                        last_decile = Some(decile);
                        Some(format!("{} [{:>3.0}%]", ad.title, progress * 100.0))
                    }
                }
                AdProgress::Loading | AdProgress::Finished => None,
            };
            if let Some(line) = line {
                println!("{line}");
            }
        }
    });

    let outcome = handle.wait().await;
    printer.abort();

    match outcome {
        AdOutcome::Completed(ad) => {
            println!("Completed: {} -> {}", ad.title, ad.target_url);
            Ok(())
        }
        AdOutcome::Cancelled => Ok(()),
        AdOutcome::Failed(reason) => Err(SessionError::InvalidResponse(reason)),
    }
}
