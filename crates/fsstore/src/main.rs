use std::fs::File;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fsstore::{loader, ContentId, FileObjectStore, ObjectStore, OpContext, StoreConfig};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// fsstore - content addressable object store on a local filesystem
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file, used in place of ./fsstore.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Bucket name
    #[arg(long, global = true)]
    bucket: Option<String>,

    /// Verbose per-operation logging
    #[arg(long, global = true)]
    debug: bool,

    /// Give up on the operation after this many milliseconds
    #[arg(long, global = true)]
    timeout_ms: Option<u64>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store a file (`-` for stdin) and print its id
    Put { path: PathBuf },

    /// Write an object's bytes to stdout or a file
    Get {
        cid: ContentId,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Exit 0 if the object exists, 1 otherwise
    Has { cid: ContentId },

    /// Print size and location of an object as JSON
    Stat { cid: ContentId },

    /// Print every object id in the bucket
    List,

    /// Print the id a file (`-` for stdin) would be stored under
    Digest { path: PathBuf },

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (mut builder, sources) =
        loader::load_builder(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(dir) = &cli.data_dir {
        builder = builder.base_dir(dir);
    }
    if let Some(bucket) = &cli.bucket {
        builder = builder.bucket(bucket);
    }
    if cli.debug {
        builder = builder.debug(true);
    }
    let config = builder.build().context("Invalid store configuration")?;

    init_tracing(config.debug());
    for file in &sources.files {
        tracing::debug!(file = %file.display(), "loaded config file");
    }
    for var in &sources.env_overrides {
        tracing::debug!(var = %var, "applied environment override");
    }

    let shutdown = CancellationToken::new();
    let signal_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Received SIGINT, cancelling");
            signal_token.cancel();
        }
    });
    let ctx = OpContext::from_token(shutdown).child(cli.timeout_ms.map(Duration::from_millis));

    match cli.command {
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
        Commands::Digest { path } => {
            let cid = fsstore::digest_reader(config.algorithm(), open_input(&path)?)
                .with_context(|| format!("Failed to digest {}", path.display()))?;
            println!("{}", cid);
        }
        Commands::Put { path } => {
            let store = open_store(config)?;
            let cid = store
                .create_object_from_reader(&ctx, open_input(&path)?)
                .with_context(|| format!("Failed to store {}", path.display()))?;
            println!("{}", cid);
        }
        Commands::Get { cid, output } => {
            let data = open_store(config)?.read_object(&ctx, &cid)?;
            match output {
                Some(path) => std::fs::write(&path, &data)
                    .with_context(|| format!("Failed to write {}", path.display()))?,
                None => io::stdout().write_all(&data)?,
            }
        }
        Commands::Has { cid } => {
            if !open_store(config)?.has_object(&ctx, &cid) {
                std::process::exit(1);
            }
        }
        Commands::Stat { cid } => {
            let info = open_store(config)?.stat_object(&ctx, &cid)?;
            println!("{}", serde_json::to_string_pretty(&info)?);
        }
        Commands::List => {
            let mut listing = open_store(config)?.list_objects(&ctx);
            while let Some(cid) = listing.next().await {
                println!("{}", cid);
            }
            listing.finish().await.context("Listing did not complete")?;
        }
    }

    Ok(())
}

fn open_store(config: StoreConfig) -> Result<FileObjectStore> {
    FileObjectStore::new(config).context("Failed to open object store")
}

fn open_input(path: &Path) -> Result<Box<dyn Read>> {
    if path == Path::new("-") {
        return Ok(Box::new(io::stdin()));
    }
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(file))
}

fn init_tracing(debug: bool) {
    let default_filter = if debug { "info,fsstore=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();
}
