use anyhow::Context;
use devstate_common::RealFileSystem;
use devstate_workspace::{DevstateServer, ServerConfig};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Parse arguments
    let args: Vec<String> = std::env::args().collect();
    let mut root_dir = std::env::current_dir().context("current directory is not accessible")?;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--help" | "-h" => {
                println!("Usage: devstate-server [OPTIONS] [ROOT_DIR]");
                println!();
                println!("Options:");
                println!("  -h, --help              Show this help message");
                println!();
                println!("Arguments:");
                println!("  [ROOT_DIR]              Directory holding devfile.yaml (default: current dir)");
                println!();
                println!("Settings are read from {} in ROOT_DIR.", devstate_workspace::CONFIG_FILE_NAME);
                std::process::exit(0);
            }
            arg if !arg.starts_with('-') => {
                root_dir = PathBuf::from(arg);
                i += 1;
            }
            _ => {
                eprintln!("Unknown argument: {}", args[i]);
                std::process::exit(1);
            }
        }
    }

    let fs = Arc::new(RealFileSystem);
    let config = ServerConfig::load(&root_dir, fs.as_ref())
        .with_context(|| format!("loading config from {}", root_dir.display()))?;

    let server = DevstateServer::new(root_dir.clone(), config.clone(), fs);
    if let Err(e) = server.watch() {
        tracing::warn!(error = %e, "Devfile changes on disk will not be reported");
    }

    let listener = tokio::net::TcpListener::bind(&config.bind)
        .await
        .with_context(|| format!("binding {}", config.bind))?;

    tracing::info!(
        root = %root_dir.display(),
        devfile = %server.devfile_path().display(),
        addr = %config.bind,
        "Devstate server listening"
    );

    axum::serve(listener, server.router()).await?;
    Ok(())
}
