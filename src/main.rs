use anyhow::{Context, Result};
use clap::Parser;
use sf_image_compression::app::App;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "sf-image-compression")]
#[command(about = "Recompress Salesforce image files and upload them as new versions")]
struct CliArgs {
    /// Invocation payload JSON file; reads stdin when omitted.
    #[arg(long, value_name = "FILE")]
    payload: Option<PathBuf>,

    /// Pretty-print the result JSON.
    #[arg(long)]
    pretty: bool,
}

fn read_payload(path: Option<&Path>) -> Result<serde_json::Value> {
    let raw = match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read payload file {}", path.display()))?,
        None => {
            let mut raw = String::new();
            std::io::stdin()
                .read_to_string(&mut raw)
                .context("Failed to read payload from stdin")?;
            raw
        }
    };

    if raw.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(&raw).context("Payload is not valid JSON")
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sf_image_compression=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = CliArgs::parse();

    let payload = match read_payload(args.payload.as_deref()) {
        Ok(payload) => payload,
        Err(e) => {
            error!("{:#}", e);
            std::process::exit(1);
        }
    };

    let app = match App::new() {
        Ok(app) => app,
        Err(e) => {
            error!("Failed to initialize function: {}", e.report());
            std::process::exit(1);
        }
    };

    match app.handle(payload).await {
        Ok(result) => {
            let output = if args.pretty {
                serde_json::to_string_pretty(&result)?
            } else {
                serde_json::to_string(&result)?
            };
            println!("{}", output);
            info!("Invocation completed");
            Ok(())
        }
        Err(e) => {
            error!("Invocation failed: {}", e.report());
            std::process::exit(1);
        }
    }
}
