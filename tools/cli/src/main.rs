//! Stowage CLI - Command line interface for storage operations.
//!
//! Loads the configured drivers and exposes the dispatcher operations
//! (add, get, size, delete, acl) against object URIs.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use stowage_common::ObjectId;
use stowage_storage::{
    create_default_catalog, AccessControl, Dispatcher, ReaderSource, RequestContext, StoreConfig,
};

#[derive(Parser)]
#[command(name = "stowage")]
#[command(about = "Stowage - Pluggable object storage")]
#[command(version)]
struct Cli {
    /// Path to the JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a local file.
    Add {
        /// Object identifier.
        #[arg(short, long)]
        id: String,

        /// File to upload.
        #[arg(short, long)]
        file: PathBuf,

        /// Scheme of the target store (default: configured default store).
        #[arg(short, long)]
        scheme: Option<String>,
    },

    /// Download an object.
    Get {
        /// Object URI.
        #[arg(short, long)]
        uri: String,

        /// Output file (default: stdout).
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Byte offset to start reading at.
        #[arg(long, default_value_t = 0)]
        offset: u64,

        /// Preferred chunk size in bytes.
        #[arg(long)]
        chunk_size: Option<usize>,
    },

    /// Show the size of an object.
    Size {
        /// Object URI.
        #[arg(short, long)]
        uri: String,
    },

    /// Delete an object.
    Delete {
        /// Object URI.
        #[arg(short, long)]
        uri: String,

        /// Log failures instead of returning them.
        #[arg(long, requires = "id")]
        safe: bool,

        /// Object identifier, used in log output of a safe delete.
        #[arg(short, long)]
        id: Option<String>,
    },

    /// Set access controls on an object.
    Acl {
        /// Object URI.
        #[arg(short, long)]
        uri: String,

        /// Make the object publicly readable.
        #[arg(long)]
        public: bool,

        /// Principal allowed to read (repeatable).
        #[arg(long = "read")]
        read: Vec<String>,

        /// Principal allowed to write (repeatable).
        #[arg(long = "write")]
        write: Vec<String>,
    },

    /// List the schemes of the loaded drivers.
    Schemes,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(cli.config.as_deref()).await?;
    let dispatcher = Dispatcher::from_config(&create_default_catalog(), &config)
        .context("Failed to initialize storage drivers")?;
    let ctx = RequestContext::new();
    debug!(request_id = %ctx.request_id, "Dispatcher ready");

    match cli.command {
        Commands::Add { id, file, scheme } => {
            cmd_add(&dispatcher, &id, &file, scheme.as_deref()).await
        }

        Commands::Get {
            uri,
            out,
            offset,
            chunk_size,
        } => cmd_get(&dispatcher, &ctx, &uri, out.as_deref(), offset, chunk_size).await,

        Commands::Size { uri } => {
            let size = dispatcher
                .get_size(&uri, &ctx)
                .await
                .context("Failed to get object size")?;
            println!("{}", size);
            Ok(())
        }

        Commands::Delete { uri, safe, id } => cmd_delete(&dispatcher, &ctx, &uri, safe, id).await,

        Commands::Acl {
            uri,
            public,
            read,
            write,
        } => {
            let access = AccessControl {
                public,
                read_principals: read,
                write_principals: write,
            };
            dispatcher
                .set_acls(&uri, &access)
                .await
                .context("Failed to set access controls")?;
            println!("Access controls applied: {}", uri);
            Ok(())
        }

        Commands::Schemes => {
            for scheme in dispatcher.known_schemes() {
                let marker = if scheme == dispatcher.default_scheme() {
                    " (default)"
                } else {
                    ""
                };
                println!("{}{}", scheme, marker);
            }
            Ok(())
        }
    }
}

/// Load the configuration from `path`, the user config directory, or
/// built-in defaults, in that order.
async fn load_config(path: Option<&Path>) -> Result<StoreConfig> {
    if let Some(path) = path {
        return StoreConfig::load(path)
            .await
            .with_context(|| format!("Failed to load config from {}", path.display()));
    }

    if let Some(default) = dirs::config_dir().map(|d| d.join("stowage").join("config.json")) {
        if tokio::fs::try_exists(&default).await.unwrap_or(false) {
            debug!(path = %default.display(), "Using user configuration");
            return StoreConfig::load(&default)
                .await
                .with_context(|| format!("Failed to load config from {}", default.display()));
        }
    }

    Ok(StoreConfig::default())
}

/// Upload a local file.
async fn cmd_add(
    dispatcher: &Dispatcher,
    id: &str,
    file: &Path,
    scheme: Option<&str>,
) -> Result<()> {
    info!("Adding {} as {}", file.display(), id);

    let object_id = ObjectId::new(id).context("Invalid object id")?;
    let handle = tokio::fs::File::open(file)
        .await
        .context("Failed to open source file")?;
    let size = handle
        .metadata()
        .await
        .context("Failed to read source file metadata")?
        .len();

    let stored = dispatcher
        .add(&object_id, ReaderSource::new(handle).with_len(size), size, scheme)
        .await
        .context("Failed to add object")?;

    println!("Object stored successfully!");
    println!("  URI: {}", stored.uri);
    println!("  Size: {} bytes", stored.size);
    println!("  Checksum: {}", stored.checksum);
    if let Some(metadata) = &stored.metadata {
        println!("  Metadata: {}", serde_json::to_string(metadata)?);
    }

    Ok(())
}

/// Download an object to a file or stdout.
async fn cmd_get(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    uri: &str,
    out: Option<&Path>,
    offset: u64,
    chunk_size: Option<usize>,
) -> Result<()> {
    let mut stream = dispatcher
        .get(uri, offset, chunk_size, ctx)
        .await
        .context("Failed to get object")?;

    let mut writer: Box<dyn tokio::io::AsyncWrite + Unpin> = match out {
        Some(path) => Box::new(
            tokio::fs::File::create(path)
                .await
                .context("Failed to create output file")?,
        ),
        None => Box::new(tokio::io::stdout()),
    };

    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.context("Failed to read object data")?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;

    if let Some(path) = out {
        println!("Object extracted: {} ({} bytes)", path.display(), written);
    }

    Ok(())
}

/// Delete an object, optionally in best-effort mode.
async fn cmd_delete(
    dispatcher: &Dispatcher,
    ctx: &RequestContext,
    uri: &str,
    safe: bool,
    id: Option<String>,
) -> Result<()> {
    if safe {
        let id = id.context("--safe requires --id")?;
        let object_id = ObjectId::new(id).context("Invalid object id")?;
        dispatcher.safe_delete(uri, &object_id, ctx).await;
        return Ok(());
    }

    dispatcher
        .delete(uri, ctx)
        .await
        .context("Failed to delete object")?;
    println!("Object deleted: {}", uri);
    Ok(())
}
