//! Error kinds, split by propagation policy (spec §7).

use thiserror::Error;

/// Fatal at startup: bad CLI args, unparseable address, unreadable auth file.
/// Terminates the process before any component begins serving.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid address `{0}`")]
    InvalidAddress(String),

    #[error("mainnet address specified with --testnet")]
    MainnetAddressOnTestnet,

    #[error("testnet address specified without --testnet")]
    TestnetAddressOnMainnet,

    #[error("--user and --password must both be present or neither present")]
    PartialUserPass,

    #[error("argument --auth is not allowed with arguments --user and --password")]
    AuthConflictsWithUserPass,

    #[error("user may not contain `:`")]
    UserContainsColon,

    #[error("unable to read auth file `{path}`: {source}")]
    AuthFileUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("unable to read default cookie file `{path}`: {source}")]
    CookieUnreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// A JSON-RPC error reported by the node, or a transport failure standing in
/// for one. Retried indefinitely by the refresher; surfaced as `result error`
/// on the submission path.
#[derive(Debug, Error, Clone)]
#[error("rpc error {code}: {message}")]
pub struct RpcError {
    pub code: i64,
    pub message: String,
}

impl RpcError {
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        RpcError {
            code,
            message: message.into(),
        }
    }
}

/// Per-connection I/O failure. Closes only the connection that raised it.
#[derive(Debug, Error)]
pub enum SocketError {
    #[error("socket error: {0}")]
    Io(#[from] std::io::Error),

    #[error("peer closed the connection")]
    Eof,
}

/// A malformed miner line or malformed upstream Stratum message.
#[derive(Debug, Error)]
pub enum ProtocolParseError {
    #[error("malformed line: {0}")]
    MalformedLine(String),

    #[error("malformed upstream JSON: {0}")]
    MalformedJson(String),

    #[error("extra_nonce2 requested before set_subscribe_params (n2len uninitialized)")]
    Nonce2LenUninitialized,
}

/// Coinbase construction violated an assumed invariant (scriptSig too long,
/// malformed reward split). A programmer error: construction aborts and the
/// refresher will re-fetch and retry on the next template.
#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("scriptSig too long: {0} bytes (limit 100)")]
    ScriptSigTooLong(usize),

    #[error("reward split must have exactly one remainder allotment, found {0}")]
    RewardSplitRemainderCount(usize),

    #[error("template marks needs_witness but supplied no default_witness_commitment")]
    MissingWitnessCommitment,

    #[error("malformed hex field `{field}`: {source}")]
    BadHex {
        field: &'static str,
        #[source]
        source: hex::FromHexError,
    },
}
