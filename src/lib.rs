//! Solo-mining coordinator and Stratum bridge for the Odo proof-of-work
//! algorithm: a block-template engine and work-distribution pipeline (C1-C4)
//! plus an independent Stratum V1 bridge (C5).

pub mod address;
pub mod chain;
pub mod config;
pub mod encoder;
pub mod error;
pub mod manager;
pub mod rpc;
pub mod stratum;
pub mod template;

pub use chain::{ChainParams, Network};
pub use config::Config;
pub use manager::Manager;
pub use rpc::RpcClient;
pub use template::{BlockTemplate, RewardSplit};
