use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tracing::{info, Level};

use farmbot::catalog::GameCatalog;
use farmbot::manager::Manager;
use farmbot::store::Store;

mod jsonstore;

use jsonstore::JsonStore;

const DEFAULT_GATE_URL: &str = "wss://gate-obt.nqf.qq.com/prod/ws";
const DEFAULT_CLIENT_VERSION: &str = "1.6.0.14_20251224";

#[derive(Clone, Debug)]
struct Config {
    data_dir: PathBuf,
    game_config_dir: PathBuf,
    gate_url: String,
    client_version: String,
}

fn usage_and_exit() -> ! {
    eprintln!(
        "farmd\n\n\
USAGE:\n  farmd [--data-dir DIR] [--game-config-dir DIR] [--gate-url URL] [--client-version VER]\n\n\
ENV:\n  FARMD_DATA_DIR         default data (accounts.json + logs.jsonl)\n  FARMD_GAME_CONFIG_DIR  default gameConfig (Plant.json, RoleLevel.json, seed-shop-merged-export.json)\n  FARMD_GATE_URL         default {DEFAULT_GATE_URL}\n  FARMD_CLIENT_VERSION   default {DEFAULT_CLIENT_VERSION}\n"
    );
    std::process::exit(2);
}

fn parse_args() -> Config {
    let mut data_dir =
        PathBuf::from(std::env::var("FARMD_DATA_DIR").unwrap_or_else(|_| "data".to_string()));
    let mut game_config_dir = PathBuf::from(
        std::env::var("FARMD_GAME_CONFIG_DIR").unwrap_or_else(|_| "gameConfig".to_string()),
    );
    let mut gate_url =
        std::env::var("FARMD_GATE_URL").unwrap_or_else(|_| DEFAULT_GATE_URL.to_string());
    let mut client_version = std::env::var("FARMD_CLIENT_VERSION")
        .unwrap_or_else(|_| DEFAULT_CLIENT_VERSION.to_string());

    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--data-dir" => data_dir = PathBuf::from(it.next().unwrap_or_else(|| usage_and_exit())),
            "--game-config-dir" => {
                game_config_dir = PathBuf::from(it.next().unwrap_or_else(|| usage_and_exit()))
            }
            "--gate-url" => gate_url = it.next().unwrap_or_else(|| usage_and_exit()),
            "--client-version" => client_version = it.next().unwrap_or_else(|| usage_and_exit()),
            "-h" | "--help" => usage_and_exit(),
            _ => usage_and_exit(),
        }
    }

    Config {
        data_dir,
        game_config_dir,
        gate_url,
        client_version,
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,farmd=info".into()),
        )
        .with_target(false)
        .with_max_level(Level::INFO)
        .init();

    let cfg = parse_args();
    info!(data_dir = %cfg.data_dir.display(), gate = %cfg.gate_url, "farmd starting");

    let store: Arc<dyn Store> =
        Arc::new(JsonStore::open(&cfg.data_dir).context("open data dir")?);
    let catalog = Arc::new(GameCatalog::load(&cfg.game_config_dir));
    let manager = Arc::new(Manager::new(
        store,
        catalog,
        &cfg.gate_url,
        &cfg.client_version,
    ));

    manager.auto_start().await;

    info!("farmd running; ctrl-c to stop");
    tokio::signal::ctrl_c().await?;
    info!("shutting down, stopping all bots");
    manager.stop_all().await;
    Ok(())
}
