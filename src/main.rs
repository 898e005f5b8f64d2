use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::Parser;
use drive_upload::{Config, LocalFile, SessionEvent};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Upload a file into a named Google Drive folder, creating the folder if needed.
#[derive(Debug, Parser)]
#[command(version)]
struct Args {
    /// File to upload
    file: PathBuf,

    /// Destination folder name (exact match)
    #[arg(short, long)]
    folder: String,

    /// Media type to declare instead of the sniffed one
    #[arg(long)]
    mime: Option<String>,

    /// Only accept files with this extension, e.g. `pdf`
    #[arg(long)]
    accept: Option<String>,

    /// JSON config file; `DRIVE_*` environment variables are used otherwise
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new("info"))?;
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();

    if let Some(ext) = &args.accept {
        check_extension(&args.file, ext)?;
    }

    let config = match &args.config {
        Some(p) => Config::from_file(p)
            .await
            .with_context(|| format!("Could not load config '{}'", p.display()))?,
        None => Config::from_env().context("Could not load config from the environment")?,
    };

    let file = LocalFile::read(&args.file, args.mime.as_deref()).await?;

    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut session = config.session().with_events(tx);

    let notices = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                SessionEvent::AuthFailed(m)
                | SessionEvent::FolderFailed(m)
                | SessionEvent::UploadFailed(m) => error!("{m}"),
                SessionEvent::Uploaded(id) => info!(%id, "file uploaded"),
                _ => {}
            }
        }
    });

    let result = async {
        session.authorize().await?;
        session.resolve_folder(&args.folder).await?;
        session.upload(file).await
    }
    .await;

    session.revoke();
    drop(session);
    notices.await?;

    let id = result?;
    println!("{id}");
    Ok(())
}

/// Client-side filter only; the content is not inspected.
fn check_extension(path: &Path, ext: &str) -> anyhow::Result<()> {
    let want = ext.trim_start_matches('.');
    let ok = path
        .extension()
        .map(|e| e.to_string_lossy().eq_ignore_ascii_case(want))
        .unwrap_or(false);

    anyhow::ensure!(ok, "'{}' is not a .{} file", path.display(), want);
    Ok(())
}
