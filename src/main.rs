mod cli;
mod error;
mod server;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use crate::server::AppState;
use clap::Parser;
use exn::ResultExt;
use std::process::ExitCode;
use std::sync::Arc;
use tgimg_config::Config;
use tgimg_resolve::{ImgbbUploader, Resolution, Resolver, Uploader};
use tgimg_storage::backend::LocalBackend;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load(cli.config.as_deref()).or_raise(|| ErrorKind::Config)?;
    let store = config.storage.resolved_directory().or_raise(|| ErrorKind::Config)?;
    let backend = Arc::new(LocalBackend::new("local", &store).or_raise(|| ErrorKind::Storage)?);
    let client = tgimg_resolve::client(&config.http).or_raise(|| ErrorKind::Setup)?;
    let resolver = Resolver::new(client.clone(), backend);
    let uploader: Option<Arc<dyn Uploader>> = config
        .upload
        .as_ref()
        .map(|upload| Arc::new(ImgbbUploader::new(client, upload)) as Arc<dyn Uploader>);

    match cli.command {
        Command::Serve => {
            let shutdown = CancellationToken::new();
            tokio::spawn(on_ctrl_c(shutdown.clone()));
            let state = AppState {
                resolver,
                uploader,
                static_prefix: config.server.static_prefix.clone(),
                shutdown: shutdown.clone(),
            };
            let listener = tokio::net::TcpListener::bind(config.server.bind)
                .await
                .or_raise(|| ErrorKind::Bind(config.server.bind))?;
            tracing::info!(bind = %config.server.bind, store = %store.display(), "Serving");
            axum::serve(listener, server::router(state, &store))
                .with_graceful_shutdown(shutdown.cancelled_owned())
                .await
                .or_raise(|| ErrorKind::Serve)?;
            tracing::info!("Server stopped");
        },
        Command::Resolve { link, upload } => {
            let failed = || ErrorKind::Resolve(link.clone());
            let resolution = resolver.resolve(&link).await.or_raise(failed)?;
            match &resolution {
                Resolution::Cached(identifier) => println!("{identifier} (already stored)"),
                Resolution::Downloaded { identifier, bytes } | Resolution::Decoded { identifier, bytes } => {
                    println!("{identifier} ({bytes} bytes)")
                },
            }
            if upload {
                let Some(uploader) = uploader else {
                    tracing::warn!("No upload section configured; skipping upload");
                    return Ok(());
                };
                let url = resolver.publish(uploader.as_ref(), resolution.identifier()).await.or_raise(failed)?;
                println!("{url}");
            }
        },
    }
    Ok(())
}

/// Cancels `shutdown` on Ctrl-C. Requests still in flight see the
/// cancellation and answer 503.
async fn on_ctrl_c(shutdown: CancellationToken) {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Shutting down");
            shutdown.cancel();
        },
        Err(err) => tracing::warn!(error = %err, "Could not listen for Ctrl-C"),
    }
}
