use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::anyhow;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use voxgate::{ServerConfig, init, routes, state::AppState};

#[derive(Debug, Default)]
struct Cli {
    config_path: Option<PathBuf>,
    check_only: bool,
}

fn parse_args() -> anyhow::Result<Cli> {
    let mut cli = Cli {
        config_path: env::var("CONFIG_PATH").ok().map(PathBuf::from),
        check_only: false,
    };

    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                cli.config_path = Some(PathBuf::from(path));
            }
            "check" => cli.check_only = true,
            other => {
                anyhow::bail!("Unknown argument '{other}'. Usage: voxgate [--config <path>] [check]")
            }
        }
    }
    Ok(cli)
}

fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.as_str()));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if config.log.json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = parse_args()?;

    // Load configuration
    let config = match &cli.config_path {
        Some(path) => ServerConfig::from_file(path),
        None => ServerConfig::from_env(),
    }
    .map_err(|e| anyhow!(e.to_string()))?;

    init_tracing(&config);
    if let Some(path) = &cli.config_path {
        info!("Loaded configuration from {}", path.display());
    }

    init::run(&config.inference).await?;
    if cli.check_only {
        info!("Inference service check passed");
        return Ok(());
    }

    let address = config.address();
    let app_state = AppState::new(config)?;

    let app = routes::api::create_api_router()
        .merge(routes::ws::create_ws_router())
        .with_state(app_state);

    let listener = TcpListener::bind(&address).await?;
    println!("voxgate listening on {address}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
