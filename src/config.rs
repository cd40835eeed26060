//! §6 CLI surface and auth resolution for the solo-pool binary.
//!
//! Grounded on `config.py::init` (MentalCollatz odo-miner): same flag set,
//! same two-chain address probe, same auth precedence (user+password, auth
//! file, node cookie). Realized as a `clap` derive struct producing one
//! immutable `Config` value threaded through the rest of the process,
//! instead of the original's process-global `params` dict (§9 Design Notes).

use std::io::Read;
use std::path::PathBuf;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use clap::Parser;

use crate::address::decode_address;
use crate::chain::{ChainParams, Network};
use crate::error::ConfigError;
use crate::template::{Allotment, RewardSplit, Share};

const DEFAULT_LISTEN_PORT: u16 = 17064;
const DEFAULT_COINBASE_TAG: &str = "/odo-miner-solo/";
const DEFAULT_DONATE_PCT: f64 = 2.0;

/// Raw CLI arguments for `odo-solo-pool`, parsed by `clap`'s derive API
/// (§9 "CLI argument parsing library internals" is out of scope; the
/// library itself is not).
#[derive(Debug, Parser)]
#[command(name = "odo-solo-pool", about = "Solo-mining coordinator for the Odo proof-of-work algorithm")]
pub struct Cli {
    /// Address to mine to.
    pub address: String,

    /// Use testnet4 chain parameters.
    #[arg(short = 't', long)]
    pub testnet: bool,

    /// Node RPC host.
    #[arg(short = 'H', long = "host", default_value = "localhost")]
    pub rpc_host: String,

    /// Node RPC port (defaults to the chain's canonical port).
    #[arg(short = 'p', long = "port")]
    pub rpc_port: Option<u16>,

    /// RPC username (discouraged, --auth is preferred).
    #[arg(long)]
    pub user: Option<String>,

    /// RPC password (discouraged, --auth is preferred).
    #[arg(long)]
    pub password: Option<String>,

    /// RPC authorization file, containing a raw `user:password` line.
    #[arg(short = 'a', long)]
    pub auth: Option<PathBuf>,

    /// Port to listen for miners on.
    #[arg(short = 'l', long = "listen", default_value_t = DEFAULT_LISTEN_PORT)]
    pub listen_port: u16,

    /// Allow remote miners to connect (bind 0.0.0.0 instead of loopback).
    #[arg(short = 'r', long)]
    pub remote: bool,

    /// Coinbase tag string, pushed into the coinbase scriptSig as `cbstring`.
    #[arg(long, default_value_t = DEFAULT_COINBASE_TAG.to_string())]
    pub coinbase: String,

    /// Donation percentage, taken out of the block reward.
    #[arg(short = 'd', long, default_value_t = DEFAULT_DONATE_PCT)]
    pub donate: f64,
}

/// The resolved, immutable configuration threaded through the rest of the
/// process — replaces the original's module-level `params` dict.
pub struct Config {
    pub chain: ChainParams,
    pub rpc_url: String,
    pub rpc_authorization: String,
    pub bind_addr: String,
    pub listen_port: u16,
    pub coinbase_tag: String,
    pub reward_split: RewardSplit,
}

impl Config {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let chain = ChainParams::for_network(if cli.testnet { Network::Testnet4 } else { Network::Main });
        let payout_script = resolve_address(&cli.address, &chain)?;

        let rpc_authorization = resolve_rpc_authorization(&cli)?;
        let rpc_port = cli.rpc_port.unwrap_or(chain.rpc_port);
        let rpc_url = format!("http://{}:{}", cli.rpc_host, rpc_port);

        let donation_script = match decode_address(chain.donation_address, &chain) {
            Some(script) => script.to_script().data,
            None => {
                return Err(ConfigError::InvalidAddress(chain.donation_address.to_string()));
            }
        };
        let reward_split = RewardSplit::new(vec![
            Allotment {
                script: payout_script,
                share: Share::Remainder,
            },
            Allotment {
                script: donation_script,
                share: Share::Fraction(cli.donate / 100.0),
            },
        ])
        .expect("exactly one Remainder allotment is constructed above");

        Ok(Config {
            chain,
            rpc_url,
            rpc_authorization,
            bind_addr: if cli.remote { "0.0.0.0".to_string() } else { "127.0.0.1".to_string() },
            listen_port: cli.listen_port,
            coinbase_tag: cli.coinbase,
            reward_split,
        })
    }
}

/// The two-chain probe (`config.py::init`): try the requested network's
/// address format; on failure, try the other network's format solely to
/// produce a more specific "wrong network" error than a generic "invalid
/// address" one.
fn resolve_address(address: &str, chain: &ChainParams) -> Result<Vec<u8>, ConfigError> {
    if let Some(script) = decode_address(address, chain) {
        return Ok(script.to_script().data);
    }
    let other = chain.other();
    if decode_address(address, &other).is_some() {
        return Err(match chain.network {
            Network::Main => ConfigError::TestnetAddressOnMainnet,
            Network::Testnet4 => ConfigError::MainnetAddressOnTestnet,
        });
    }
    Err(ConfigError::InvalidAddress(address.to_string()))
}

fn resolve_rpc_authorization(cli: &Cli) -> Result<String, ConfigError> {
    let raw = match (&cli.user, &cli.password) {
        (Some(user), Some(password)) => {
            if cli.auth.is_some() {
                return Err(ConfigError::AuthConflictsWithUserPass);
            }
            if user.contains(':') {
                return Err(ConfigError::UserContainsColon);
            }
            format!("{user}:{password}")
        }
        (None, None) => {
            if let Some(path) = &cli.auth {
                read_to_string(path).map_err(|source| ConfigError::AuthFileUnreadable {
                    path: path.display().to_string(),
                    source,
                })?
            } else {
                let path = default_cookie_path(cli.testnet);
                read_to_string(&path).map_err(|source| ConfigError::CookieUnreadable {
                    path: path.display().to_string(),
                    source,
                })?
            }
        }
        _ => return Err(ConfigError::PartialUserPass),
    };
    Ok(format!("Basic {}", BASE64.encode(raw.trim_end())))
}

fn read_to_string(path: &std::path::Path) -> std::io::Result<String> {
    let mut f = std::fs::File::open(path)?;
    let mut contents = String::new();
    f.read_to_string(&mut contents)?;
    Ok(contents)
}

/// The node's default auth-cookie location, mirroring `config.py::data_dir`
/// but via the `dirs` crate instead of hand-rolled `platform.system()`
/// branching.
fn default_cookie_path(testnet: bool) -> PathBuf {
    let mut dir = dirs::data_dir()
        .map(|d| d.join("DigiByte"))
        .unwrap_or_else(|| PathBuf::from(".digibyte"));
    if testnet {
        dir = dir.join("testnet4");
    }
    dir.join(".cookie")
}

/// CLI arguments for `odo-stratum-bridge`. Not part of §6's solo-pool CLI
/// surface; shaped the same way (one `clap` derive struct, one immutable
/// config value) for the bridge's own listen/upstream/credential knobs.
#[derive(Debug, Parser)]
#[command(name = "odo-stratum-bridge", about = "Stratum V1 bridge for the Odo proof-of-work algorithm")]
pub struct BridgeCli {
    /// Upstream Stratum V1 pool host.
    pub upstream_host: String,

    /// Upstream Stratum V1 pool port.
    pub upstream_port: u16,

    /// Port to listen for miners on.
    #[arg(short = 'l', long = "listen", default_value_t = DEFAULT_LISTEN_PORT)]
    pub listen_port: u16,

    /// Allow remote miners to connect (bind 0.0.0.0 instead of loopback).
    #[arg(short = 'r', long)]
    pub remote: bool,

    /// Use testnet4 chain parameters (for odo-key derivation only).
    #[arg(short = 't', long)]
    pub testnet: bool,

    /// Pool account username, overriding whatever the miner sends in `auth`.
    #[arg(long, requires = "pool_password")]
    pub pool_user: Option<String>,

    /// Pool account password, overriding whatever the miner sends in `auth`.
    #[arg(long, requires = "pool_user")]
    pub pool_password: Option<String>,

    /// Suffix the pool username with `_<client-supplied-id>` for worker
    /// separation under one pool account.
    #[arg(long)]
    pub pool_worker_suffix: bool,
}

pub struct BridgeConfigSurface {
    pub bind_addr: String,
    pub listen_port: u16,
    pub stratum: crate::stratum::StratumConfig,
}

impl BridgeConfigSurface {
    pub fn from_cli(cli: BridgeCli) -> Self {
        let chain = ChainParams::for_network(if cli.testnet { Network::Testnet4 } else { Network::Main });
        let pool_credentials = match (cli.pool_user, cli.pool_password) {
            (Some(user), Some(password)) => Some(crate::stratum::PoolCredentials {
                user,
                password,
                append_worker_name: cli.pool_worker_suffix,
            }),
            _ => None,
        };
        BridgeConfigSurface {
            bind_addr: if cli.remote { "0.0.0.0".to_string() } else { "127.0.0.1".to_string() },
            listen_port: cli.listen_port,
            stratum: crate::stratum::StratumConfig {
                upstream_host: cli.upstream_host,
                upstream_port: cli.upstream_port,
                chain,
                pool_credentials,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_address_distinguishes_wrong_network_from_invalid() {
        let main = ChainParams::main();
        let testnet = ChainParams::testnet4();

        let fake_hash = [0x11u8; 20];
        let mut payload = vec![main.prefix_pubkey];
        payload.extend_from_slice(&fake_hash);
        let mainnet_addr = bs58::encode(payload).with_check().into_string();

        assert!(resolve_address(&mainnet_addr, &main).is_ok());
        assert!(matches!(
            resolve_address(&mainnet_addr, &testnet),
            Err(ConfigError::MainnetAddressOnTestnet)
        ));
        assert!(matches!(
            resolve_address("not-an-address", &main),
            Err(ConfigError::InvalidAddress(_))
        ));
    }
}
