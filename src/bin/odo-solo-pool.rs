//! Entry point for `odo-solo-pool`: runs C3 (template builder) + C4 (pool
//! manager) against one configured node, serving miners on a local port.
//!
//! Grounded on the teacher's `main.rs` (wire everything up, `std::process::exit`
//! on fatal setup errors) and `pool.py`'s top-level thread wiring (refresher +
//! manager + accept loop as three concurrent activities).

use std::net::TcpListener;
use std::process::exit;
use std::sync::Arc;

use clap::Parser;
use log::error;

use odo_pool::config::{Cli, Config};
use odo_pool::manager::{accept_loop, run_refresher, Manager};
use odo_pool::rpc::RpcClient;

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(e) => {
            error!("configuration error: {e}");
            exit(1);
        }
    };

    let rpc = Arc::new(RpcClient::new(config.rpc_url.clone(), config.rpc_authorization.clone()));
    let manager = Manager::new();

    let listener = match TcpListener::bind((config.bind_addr.as_str(), config.listen_port)) {
        Ok(listener) => listener,
        Err(e) => {
            error!("failed to bind {}:{}: {e}", config.bind_addr, config.listen_port);
            exit(1);
        }
    };

    {
        let manager = manager.clone();
        let rpc = rpc.clone();
        let reward_split = config.reward_split.clone();
        let cbstring = config.coinbase_tag.clone();
        std::thread::spawn(move || run_refresher(manager, rpc, reward_split, cbstring));
    }

    {
        let manager = manager.clone();
        std::thread::spawn(move || manager.run());
    }

    accept_loop(manager, rpc, listener);
}
