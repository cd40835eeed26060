//! §4.6 (added) / §6 "Networks" — the two supported chain parameter sets.
//!
//! Grounded on `config.py`'s `MAINNET_ADDR_FORMAT`/`TESTNET_ADDR_FORMAT`/
//! `MAINNET_RPC_PORT`/`TESTNET_RPC_PORT` constants and `header.py`'s
//! `odokey_from_ntime` interval constants. Per §9 Open Question 1, the
//! per-chain-params table (14022/14023) is canonical; the stray 18332 seen
//! in one copy of the Python config is not reproduced.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Network {
    Main,
    Testnet4,
}

#[derive(Debug, Clone)]
pub struct ChainParams {
    pub network: Network,
    pub bech32_hrp: &'static str,
    pub prefix_pubkey: u8,
    pub prefix_script: u8,
    pub donation_address: &'static str,
    pub rpc_port: u16,
    /// Odo shapechange interval, in seconds, for `odokey_from_ntime`.
    pub odo_shapechange_interval_secs: u32,
}

impl ChainParams {
    pub fn main() -> Self {
        ChainParams {
            network: Network::Main,
            bech32_hrp: "dgb",
            prefix_pubkey: 30,
            prefix_script: 63,
            donation_address: "DCo11atzQBsymnLEouhTn3CVxyL3zGbFBC",
            rpc_port: 14022,
            odo_shapechange_interval_secs: 10 * 86_400,
        }
    }

    pub fn testnet4() -> Self {
        ChainParams {
            network: Network::Testnet4,
            bech32_hrp: "dgbt",
            prefix_pubkey: 126,
            prefix_script: 140,
            donation_address: "dgbt1qtm6z2cw2tm2pj0jrj79v87hjfz2ylc2xsk274a",
            rpc_port: 14023,
            odo_shapechange_interval_secs: 86_400,
        }
    }

    pub fn for_network(network: Network) -> Self {
        match network {
            Network::Main => ChainParams::main(),
            Network::Testnet4 => ChainParams::testnet4(),
        }
    }

    pub fn other(&self) -> ChainParams {
        match self.network {
            Network::Main => ChainParams::testnet4(),
            Network::Testnet4 => ChainParams::main(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rpc_ports_match_canonical_table() {
        assert_eq!(ChainParams::main().rpc_port, 14022);
        assert_eq!(ChainParams::testnet4().rpc_port, 14023);
    }
}
