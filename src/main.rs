use anyhow::{Result, bail};
use clap::Parser;
use std::{io::ErrorKind, path::Path};
use tokio::{fs, net::TcpListener};
use tracing_subscriber::EnvFilter;

use image_buckets::{
    client::{
        controller::UploadClient,
        records::{SelectedFile, UploadStatus},
        uploader::HttpUploader,
    },
    config::{AppConfig, Cli, Command, ServeArgs, UploadArgs},
    routes,
    state::AppState,
};

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    match Cli::parse().command {
        Command::Serve(args) => serve(args).await,
        Command::Upload(args) => upload(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<()> {
    let cfg = AppConfig::from_env_and_args(args)?;
    tracing::info!("Starting image-buckets with config: {:?}", cfg);

    // --- Ensure upload root exists ---
    if !Path::new(&cfg.upload_dir).exists() {
        fs::create_dir_all(&cfg.upload_dir).await?;
        tracing::info!("Created upload directory at {}", cfg.upload_dir.display());
    }

    let state = AppState {
        storage: cfg.storage(),
        public_url: cfg.public_url.clone(),
        max_upload_bytes: cfg.max_upload_bytes,
    };
    let app = routes::routes::routes(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    tracing::info!("Public URLs will start with {}", cfg.public_url);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn upload(args: UploadArgs) -> Result<()> {
    let mut client = UploadClient::new();
    client.set_bucket_input(&args.bucket);
    if let Some(err) = client.bucket_error() {
        bail!("invalid bucket `{}`: {}", args.bucket, err);
    }

    let mut selected = Vec::with_capacity(args.files.len());
    for path in &args.files {
        match SelectedFile::from_path(path).await {
            Ok(file) if file.is_image() => selected.push(file),
            Ok(file) => println!("skipping {}: not an image ({})", path.display(), file.mime),
            Err(err) => println!("skipping {}: {}", path.display(), err),
        }
    }
    client.add_files(selected);

    let uploader = HttpUploader::new(&args.server);
    let Some(report) = client.upload_all(&uploader).await else {
        bail!("no images to upload");
    };

    for record in &report.records {
        match (record.status, record.url.as_deref()) {
            (UploadStatus::Success, Some(url)) => println!(
                "{} ({} MB) -> {}",
                record.file.name,
                record.file.size_mib(),
                url
            ),
            _ => println!("{} failed", record.file.name),
        }
    }
    println!(
        "{} uploaded, {} failed",
        report.succeeded(),
        report.failed()
    );

    if !report.completed {
        bail!("every upload failed");
    }
    Ok(())
}
