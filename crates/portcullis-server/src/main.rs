//! Portcullis demo server entry point.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context as _;
use portcullis_config::ConfigLoader;
use portcullis_server::{site, Server};

/// Command-line arguments.
struct Args {
    /// Path to a TOML or JSON settings file.
    config: Option<PathBuf>,
}

impl Args {
    fn parse() -> Result<Self, ExitCode> {
        let mut args = std::env::args().skip(1);
        let mut config = None;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--config" | "-c" => config = args.next().map(PathBuf::from),
                "--help" | "-h" => {
                    print_help();
                    return Err(ExitCode::SUCCESS);
                }
                "--version" | "-V" => {
                    println!("portcullis-server {}", portcullis_server::VERSION);
                    return Err(ExitCode::SUCCESS);
                }
                other => {
                    eprintln!("Unknown argument: {other}");
                    eprintln!("Use --help for usage information");
                    return Err(ExitCode::FAILURE);
                }
            }
        }

        Ok(Self { config })
    }
}

fn print_help() {
    println!(
        r"Portcullis demo server

USAGE:
    portcullis-server [OPTIONS]

OPTIONS:
    -c, --config <PATH>    Settings file (TOML or JSON)
    -h, --help             Print help information
    -V, --version          Print version information

ENVIRONMENT VARIABLES:
    PORTCULLIS__SERVER__HTTP_ADDR        Listen address (default: 0.0.0.0:3000)
    PORTCULLIS__RUN_MODE                 dev or prod (default: prod)
    PORTCULLIS__LOGGING__LEVEL           Log filter (default: info)
    PORTCULLIS__METRICS__ENABLED         Serve Prometheus metrics (default: true)
"
    );
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut loader = ConfigLoader::new().with_env_prefix("PORTCULLIS");
    if let Some(path) = &args.config {
        loader = loader
            .with_file(path)
            .with_context(|| format!("loading {}", path.display()))?;
    }
    let settings = Arc::new(loader.load().context("invalid settings")?);

    portcullis_telemetry::init_telemetry(&settings.telemetry()).context("initialising telemetry")?;
    tracing::info!(
        version = portcullis_server::VERSION,
        run_mode = ?settings.run_mode,
        config = ?args.config,
        "starting portcullis-server"
    );

    let router = site::router(Arc::clone(&settings)).context("building route table")?;
    let server = Server::bind(router).await?;
    server.run().await?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::parse() {
        Ok(args) => args,
        Err(code) => return code,
    };

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            // Logging may not be up yet.
            eprintln!("portcullis-server: {err:#}");
            tracing::error!(error = %format!("{err:#}"), "server exited with error");
            ExitCode::FAILURE
        }
    }
}
