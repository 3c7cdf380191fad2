use crate::services::storage_service::StorageService;
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::{env, path::PathBuf, str::FromStr};

const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_UPLOAD_DIR: &str = "./uploads";
const DEFAULT_MAX_UPLOAD_BYTES: usize = 25 * 1024 * 1024;

/// Centralized server configuration.
/// Combines environment variables and CLI arguments.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub upload_dir: PathBuf,
    /// Unserved directory for partial uploads; `None` uses the sibling
    /// `.<upload dir name>-staging`.
    pub staging_dir: Option<PathBuf>,
    pub public_url: String,
    pub max_upload_bytes: usize,
}

/// Command-line entry point.
#[derive(Parser, Debug)]
#[command(author, version, about = "Image upload service with per-bucket folders")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the upload server
    Serve(ServeArgs),
    /// Upload images into a bucket on a running server
    Upload(UploadArgs),
}

#[derive(Args, Debug, Default)]
pub struct ServeArgs {
    /// Host to bind to (overrides IMAGE_BUCKETS_HOST)
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to (overrides IMAGE_BUCKETS_PORT)
    #[arg(long)]
    pub port: Option<u16>,

    /// Directory where buckets are stored (overrides IMAGE_BUCKETS_UPLOAD_DIR)
    #[arg(long)]
    pub upload_dir: Option<PathBuf>,

    /// Directory for partial uploads, on the same filesystem as the upload
    /// directory (overrides IMAGE_BUCKETS_STAGING_DIR)
    #[arg(long)]
    pub staging_dir: Option<PathBuf>,

    /// Base URL used in returned links (overrides IMAGE_BUCKETS_PUBLIC_URL)
    #[arg(long)]
    pub public_url: Option<String>,

    /// Largest accepted upload in bytes (overrides IMAGE_BUCKETS_MAX_UPLOAD_BYTES)
    #[arg(long)]
    pub max_upload_bytes: Option<usize>,
}

#[derive(Args, Debug)]
pub struct UploadArgs {
    /// Server base URL
    #[arg(long, env = "IMAGE_BUCKETS_SERVER", default_value = "http://localhost:3000")]
    pub server: String,

    /// Bucket to upload into
    #[arg(long)]
    pub bucket: String,

    /// Image files to upload, in order
    #[arg(required = true)]
    pub files: Vec<PathBuf>,
}

impl AppConfig {
    /// Merge serve arguments with the process environment.
    pub fn from_env_and_args(args: ServeArgs) -> Result<Self> {
        Self::from_sources(args, |key| env::var(key))
    }

    /// Merge serve arguments with an environment lookup; CLI values win.
    pub fn from_sources<F>(args: ServeArgs, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Result<String, env::VarError>,
    {
        // --- Environment fallback ---
        let env_host = lookup("IMAGE_BUCKETS_HOST").unwrap_or_else(|_| DEFAULT_HOST.into());
        let env_port = parse_var(&lookup, "IMAGE_BUCKETS_PORT", DEFAULT_PORT)?;
        let env_upload_dir = lookup("IMAGE_BUCKETS_UPLOAD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_UPLOAD_DIR));
        let env_staging_dir = lookup("IMAGE_BUCKETS_STAGING_DIR").ok().map(PathBuf::from);
        let env_public_url = lookup("IMAGE_BUCKETS_PUBLIC_URL").ok();
        let env_max_upload = parse_var(
            &lookup,
            "IMAGE_BUCKETS_MAX_UPLOAD_BYTES",
            DEFAULT_MAX_UPLOAD_BYTES,
        )?;

        // --- Merge ---
        let port = args.port.unwrap_or(env_port);
        let public_url = args
            .public_url
            .or(env_public_url)
            .unwrap_or_else(|| format!("http://localhost:{}", port));

        Ok(Self {
            host: args.host.unwrap_or(env_host),
            port,
            upload_dir: args.upload_dir.unwrap_or(env_upload_dir),
            staging_dir: args.staging_dir.or(env_staging_dir),
            public_url,
            max_upload_bytes: args.max_upload_bytes.unwrap_or(env_max_upload),
        })
    }

    /// Storage rooted at `upload_dir`, staging where configured.
    pub fn storage(&self) -> StorageService {
        match &self.staging_dir {
            Some(staging) => StorageService::with_staging_dir(&self.upload_dir, staging),
            None => StorageService::new(&self.upload_dir),
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn parse_var<F, T>(lookup: &F, key: &str, default: T) -> Result<T>
where
    F: Fn(&str) -> Result<String, env::VarError>,
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Ok(value) => value
            .parse::<T>()
            .with_context(|| format!("parsing {} value `{}`", key, value)),
        Err(env::VarError::NotPresent) => Ok(default),
        Err(err) => Err(err).with_context(|| format!("reading {}", key)),
    }
}
