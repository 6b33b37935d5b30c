use clap::{Parser, Subcommand};
use darkroom::source::{AssetSource, DriveSource};
use darkroom::{config, server};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "darkroom")]
#[command(about = "Image proxy and transcoding service for a cloud-drive photo diary")]
#[command(long_about = "\
Image proxy and transcoding service for a cloud-drive photo diary

Fetches photos from a drive folder through the authenticated API, converts
HEIC/HEIF/AVIF captures to JPEG, optionally resizes and recompresses, and
serves the result with long-lived cache headers.

Endpoints:

  GET /images/<id>?variant=thumbnail|full&width=<px>&quality=<1-100>
  GET /images/<id>/info
  GET /health

The drive API bearer token is read from the environment variable named by
source.token_env in config.toml (default: DRIVE_ACCESS_TOKEN).

Run 'darkroom gen-config' to print a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP server
    Serve {
        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,
    },
    /// Verify source connectivity by fetching one asset's metadata
    Check {
        /// Asset identifier to look up
        identifier: String,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Serve { port } => {
            init_tracing();
            let mut config = config::AppConfig::load(&cli.config)?;
            if let Some(port) = port {
                config.server.port = port;
            }
            let token = config.source.load_token()?;
            let source = Arc::new(DriveSource::new(&config.source, token)?);
            server::serve(config, source).await?;
        }
        Command::Check { identifier } => {
            init_tracing();
            let config = config::AppConfig::load(&cli.config)?;
            let token = config.source.load_token()?;
            let source = DriveSource::new(&config.source, token)?;
            let meta = source.metadata(&identifier).await?;
            println!("name:      {}", meta.name.as_deref().unwrap_or("(unnamed)"));
            println!("mime type: {}", meta.mime_type);
            match meta.size {
                Some(size) => println!("size:      {size} bytes"),
                None => println!("size:      (unknown)"),
            }
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
}
