mod history_tui;

use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use spotify_history::{
    auth::{AccessToken, authorize_url, generate_state, parse_redirect},
    config::Config,
    history::{PaginationController, SpotifyHistoryClient},
    logging::setup_logging,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "SPOTIFY_HISTORY_CONFIG")]
    config: Option<PathBuf>,

    /// Console log level (default: off)
    #[arg(long, default_value = "off", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "SPOTIFY_HISTORY_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Authorize with Spotify and print an access token
    Login {
        /// Skip the Spotify consent dialog if access was granted before
        #[arg(long)]
        no_dialog: bool,
    },
    /// Browse your recently played tracks
    History {
        /// Spotify access token
        #[arg(short, long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Print your recently played tracks
    Dump {
        /// Spotify access token
        #[arg(short, long, env = "SPOTIFY_ACCESS_TOKEN", hide_env_values = true)]
        token: String,

        /// Number of pages to fetch
        #[arg(short, long, default_value = "1")]
        pages: usize,
    },
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    if let Some(path) = path {
        Config::from_file(&path)
    } else {
        Config::load()
    }
    .wrap_err("Failed to load spotify-history config")
}

/// The history commands only need API settings, which all have defaults.
fn load_config_or_default(path: Option<PathBuf>) -> Result<Config> {
    match path {
        Some(path) => load_config(Some(path)),
        None if Config::config_path().is_some_and(|path| path.exists()) => load_config(None),
        None => {
            log::debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}

fn build_controller(
    config: &Config,
    token: String,
) -> Result<PaginationController<SpotifyHistoryClient>> {
    let token = AccessToken::new(token)?;
    let client = SpotifyHistoryClient::new(config.api_base_url()?, config.request_timeout()?);
    Ok(PaginationController::new(client, Some(token)))
}

fn login(config: &Config, show_dialog: bool) -> Result<()> {
    if config.client_id.is_empty() {
        return Err(color_eyre::eyre::eyre!(
            "client_id is not set. Add your Spotify application's client id to the config file"
        ));
    }

    let state = generate_state();
    let url = authorize_url(
        &config.client_id,
        &config.redirect_uri,
        &config.scopes,
        &state,
        show_dialog,
    );

    println!("Open this URL in your browser and approve access:\n\n{}\n", url);
    println!("Then paste the full URL you were redirected to:");

    let mut redirect = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut redirect)
        .wrap_err("Failed to read redirect URL")?;

    let grant = parse_redirect(&redirect, Some(&state))?;
    log::info!("Authorization successful");

    if let Some(expires_in) = grant.expires_in {
        println!(
            "\nToken expires in {}.",
            humantime::format_duration(std::time::Duration::from_secs(expires_in))
        );
    }
    println!("export SPOTIFY_ACCESS_TOKEN={}", grant.access_token.secret());
    Ok(())
}

async fn dump(controller: PaginationController<SpotifyHistoryClient>, pages: usize) -> Result<()> {
    controller
        .refresh()
        .await
        .wrap_err("Failed to fetch recently played tracks")?;

    let mut fetched = 1;
    while fetched < pages && controller.snapshot().has_more {
        controller
            .load_more()
            .await
            .wrap_err("Failed to fetch older tracks")?;
        fetched += 1;
    }

    for record in controller.snapshot().records {
        println!(
            "{}\t{} - {}\t{}",
            record.played_at_display, record.artist_name, record.track_name, record.detail_url
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("spotify-history starting");

    match args.command {
        Commands::Config(config_commands) => match config_commands {
            ConfigCommands::CreateDefault => {
                log::debug!("Creating default config");
                let path = Config::create_default()?;
                println!("{}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        },
        Commands::Login { no_dialog } => {
            let config = load_config(args.config)?;
            login(&config, !no_dialog)?;
        }
        Commands::History { token } => {
            let config = load_config_or_default(args.config)?;
            let controller = Arc::new(build_controller(&config, token)?);
            log::debug!("Starting history browser");
            history_tui::run(controller)?;
        }
        Commands::Dump { token, pages } => {
            let config = load_config_or_default(args.config)?;
            let controller = build_controller(&config, token)?;
            dump(controller, pages).await?;
        }
    }

    Ok(())
}
