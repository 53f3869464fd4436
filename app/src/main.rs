//! `arda`: command-line client for the photo server.

use api_client::{ApiClient, PhotoId};
use auth::{Session, SessionStore};
use cache::Spool;
use clap::{Parser, Subcommand};
use linking::{AppState, GalleryView, LinkError, SubmitOutcome, SubmitRejection};
use std::io::BufRead;
use std::path::PathBuf;
use std::time::Duration;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

mod config;

#[derive(Parser)]
#[command(name = "arda", author, version, about = "Arda photo client")]
struct Cli {
    /// Path to config file
    #[arg(long)]
    config: Option<PathBuf>,
    /// Override log level (e.g. info, debug)
    #[arg(long)]
    log_level: Option<String>,
    /// Override the server base URL
    #[arg(long)]
    base_url: Option<String>,
    /// Bearer token to use instead of the stored session
    #[arg(long)]
    token: Option<String>,
    /// Directory photos are downloaded into
    #[arg(long)]
    spool_dir: Option<PathBuf>,
    /// Maximum number of concurrent photo downloads
    #[arg(long)]
    concurrency: Option<usize>,
    /// Per-request timeout in seconds
    #[arg(long)]
    timeout_secs: Option<u64>,
    /// Enable tokio console for debugging
    #[arg(long)]
    debug_console: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in and store the session token
    Login {
        #[arg(long)]
        username: String,
        /// Read from stdin when omitted
        #[arg(long)]
        password: Option<String>,
    },
    /// Forget the stored session
    Logout,
    /// List albums
    Albums,
    /// Print photo ids, either all or those of one album
    Photos {
        #[arg(long)]
        album: Option<String>,
    },
    /// Download photos and print where each one landed
    Fetch {
        #[arg(long)]
        album: Option<String>,
    },
    /// Link photos to an album
    Link {
        /// Name of the target album
        #[arg(long)]
        album: String,
        /// Ids of the photos to link
        #[arg(required = true)]
        ids: Vec<PhotoId>,
    },
}

fn init_tracing(cfg: &config::AppConfig) -> Result<Option<WorkerGuard>, Box<dyn std::error::Error>> {
    if cfg.debug_console {
        #[cfg(feature = "tokio-console")]
        {
            console_subscriber::init();
            return Ok(None);
        }
        #[cfg(not(feature = "tokio-console"))]
        eprintln!("tokio console support not compiled in; use --features tokio-console");
    }

    std::fs::create_dir_all(&cfg.data_dir)?;
    let file_appender = rolling::daily(&cfg.data_dir, "arda.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(cfg.log_level.clone()))
        .with_writer(std::io::stderr.and(file_writer))
        .init();
    Ok(Some(guard))
}

fn build_client(cfg: &config::AppConfig, token: String) -> Result<ApiClient, Box<dyn std::error::Error>> {
    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(cfg.request_timeout_secs))
        .build()?;
    Ok(ApiClient::with_client(http, token, cfg.base_url.clone()))
}

fn read_password() -> Result<String, Box<dyn std::error::Error>> {
    eprint!("Password: ");
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

#[cfg_attr(feature = "trace-spans", tracing::instrument)]
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let overrides = config::AppConfigOverrides {
        log_level: cli.log_level.clone(),
        base_url: cli.base_url.clone(),
        spool_path: cli.spool_dir.clone(),
        fetch_concurrency: cli.concurrency,
        request_timeout_secs: cli.timeout_secs,
        debug_console: cli.debug_console,
    };
    let cfg = config::AppConfig::load_from(cli.config.clone()).apply_overrides(&overrides);
    let guard = init_tracing(&cfg)?;

    if let Err(e) = run(cli, cfg).await {
        tracing::debug!(error = %e, "command failed");
        eprintln!("Error: {}", e);
        drop(guard);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli, cfg: config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let store = SessionStore::new(cfg.session_path());

    let token = match &cli.command {
        Commands::Login { username, password } => {
            let password = match password {
                Some(p) => p.clone(),
                None => read_password()?,
            };
            let session: Session = auth::login(&cfg.base_url, username, &password).await?;
            store.save(&session)?;
            println!("Logged in as {}", session.username);
            return Ok(());
        }
        Commands::Logout => {
            if store.clear()? {
                println!("Logged out");
            } else {
                println!("No session stored");
            }
            return Ok(());
        }
        _ => match cli.token.clone() {
            Some(token) => token,
            None => auth::get_access_token(&store)?,
        },
    };

    let client = build_client(&cfg, token)?;
    let spool = Spool::new(&cfg.spool_path)?;
    let app = AppState::new(client.clone(), spool, cfg.fetch_concurrency);

    match cli.command {
        Commands::Login { .. } | Commands::Logout => {}
        Commands::Albums => {
            let albums = app.load_albums().await?;
            if albums.is_empty() {
                println!("No albums");
            }
            for album in albums {
                println!("{}\t{}", album.id, album.name);
            }
        }
        Commands::Photos { album } => {
            let ids = match &album {
                Some(name) => client.list_album_photo_ids(name).await?,
                None => client.list_photo_ids().await?,
            };
            if ids.is_empty() {
                println!("No photos");
            }
            for id in ids {
                println!("{}", id);
            }
        }
        Commands::Fetch { album } => {
            let view = match album {
                Some(name) => GalleryView::Album(name),
                None => GalleryView::AllPhotos,
            };
            app.browse(view.clone()).await?;
            {
                let gallery = app.gallery();
                println!("{}: {} photo(s)", view, gallery.len());
                for handle in gallery.iter() {
                    println!("{} -> {}", handle.id(), handle.local_ref().path().display());
                }
            }
            app.close_gallery();
        }
        Commands::Link { album, ids } => link(&app, &album, &ids).await?,
    }

    Ok(())
}

async fn link(app: &AppState, album_name: &str, ids: &[PhotoId]) -> Result<(), Box<dyn std::error::Error>> {
    app.load_albums().await?;
    let album = app
        .find_album(album_name)
        .ok_or_else(|| format!("No album named {}", album_name))?;

    let workflow = app.linking();
    if !workflow.open(album).await? {
        return Err("photo selector could not be opened".into());
    }
    for &id in ids {
        if !workflow.set_selected(id, true) && !workflow.selection().contains(&id) {
            eprintln!("Photo {} is not available, skipping", id);
        }
    }

    let result = workflow.submit().await;
    workflow.cancel();
    match result {
        Ok(SubmitOutcome::Linked {
            album,
            photo_ids,
            confirmation,
        }) => {
            println!("{}", confirmation);
            let ids: Vec<String> = photo_ids.iter().map(|id| id.to_string()).collect();
            println!("{} now holds: {}", album, ids.join(", "));
            Ok(())
        }
        Ok(SubmitOutcome::Ignored(SubmitRejection::EmptySelection)) => {
            Err("none of the given photos are available".into())
        }
        Ok(SubmitOutcome::Ignored(rejection)) => Err(format!("link not submitted: {:?}", rejection).into()),
        Err(err @ LinkError::Reconciliation { .. }) => {
            println!("{}", err);
            Ok(())
        }
        Err(err) => {
            tracing::debug!(code = err.code(), "linking failed");
            Err(err.into())
        }
    }
}
