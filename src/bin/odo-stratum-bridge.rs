//! Entry point for `odo-stratum-bridge`: runs C5, translating between this
//! system's miner line protocol and a real upstream Stratum V1 pool.

use std::net::TcpListener;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use log::error;

use odo_pool::config::{BridgeCli, BridgeConfigSurface};
use odo_pool::stratum::accept_loop;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = BridgeCli::parse();
    let config = BridgeConfigSurface::from_cli(cli);

    let listener = match TcpListener::bind((config.bind_addr.as_str(), config.listen_port)) {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {}:{}: {e}", config.bind_addr, config.listen_port);
            exit(1);
        }
    };

    accept_loop(listener, Arc::new(config.stratum));
}
