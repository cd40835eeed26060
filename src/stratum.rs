//! C5: Stratum V1 bridge — translates between this system's line protocol
//! (spoken by C4 and by any miner) and a real Stratum V1 pool upstream.
//!
//! Grounded on `stratum.py`/`stratum_proxy.py`/`header.py` (MentalCollatz
//! odo-miner): `ProxyServer`/`ProxyClientProtocol` become one accept loop
//! plus, per accepted miner, a pair of blocking reader threads joined by a
//! channel rather than a Twisted reactor — the realization §5/SPEC_FULL §5
//! call for. `get_params_header`/`odokey_from_ntime`/`n2hex`/
//! `difficulty_to_hextarget` are carried over as free functions.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use num_bigint::BigUint;
use serde_json::{json, Value};

use crate::chain::ChainParams;
use crate::encoder::{sha256d, var_int};
use crate::error::ProtocolParseError;

/// Credentials this bridge substitutes for whatever the miner sends in its
/// `auth` line, per the original's pool-credentials variant
/// (`stratum.py::ProxyClientProtocol.doAuth`).
#[derive(Debug, Clone)]
pub struct PoolCredentials {
    pub user: String,
    pub password: String,
    /// When true, the miner's own username is appended to `user` as
    /// `<user>_<miner-user>`, letting one pool account separate workers.
    pub append_worker_name: bool,
}

#[derive(Debug, Clone)]
pub struct StratumConfig {
    pub upstream_host: String,
    pub upstream_port: u16,
    pub chain: ChainParams,
    pub pool_credentials: Option<PoolCredentials>,
}

/// Converts a mining difficulty to a 256-bit hex target string, matching
/// `header.py::difficulty_to_hextarget`'s `diff1 / difficulty - 1` formula,
/// evaluated exactly with arbitrary-precision integers rather than `f64`
/// (which cannot represent the 224-bit `diff1` constant precisely).
pub fn difficulty_to_hextarget(difficulty: u64) -> String {
    if difficulty == 0 {
        return "f".repeat(64);
    }
    let diff1 = (BigUint::from(0xffff0000u64) << 192u32) + BigUint::from(1u32);
    let max_target = (BigUint::from(1u32) << 256u32) - BigUint::from(1u32);
    let mut target = &diff1 / BigUint::from(difficulty);
    if target > BigUint::from(0u32) {
        target -= BigUint::from(1u32);
    }
    if target > max_target {
        target = max_target;
    }
    format!("{:0>64}", target.to_str_radix(16))
}

/// Derives the odokey for a job whose notify message carries no explicit
/// `odokey` field: the start of the current shapechange interval, per
/// `header.py::odokey_from_ntime`.
pub fn odokey_from_ntime(ntime: u32, chain: &ChainParams) -> u32 {
    let interval = chain.odo_shapechange_interval_secs;
    ntime - (ntime % interval)
}

/// Serializes an extra-nonce2 counter as lowercase hex, left-padded to
/// `2*n2len` characters, via the same `var_int`+hex pipeline as the
/// coinbase extra-nonce push (`header.py::n2hex`).
pub fn n2hex(value: u64, n2len: usize) -> String {
    let encoded = hex::encode(var_int(value));
    format!("{:0>width$}", encoded, width = 2 * n2len)
}

/// Reassembles a Stratum `prevhash` field (given word-swapped, each 4-byte
/// word internally byte-order-preserved) into this system's internal
/// (fully byte-reversed) 32-byte order — the net effect of
/// `header.py::swap_order(prevhash[::-1])` followed by `unhexlify(...)[::-1]`
/// in `get_params_header`, re-derived here as plain word-reversal plus a
/// single byte reversal rather than transliterated character slicing.
fn prevhash_to_internal(hex_str: &str) -> Result<[u8; 32], ProtocolParseError> {
    let chars: Vec<char> = hex_str.chars().collect();
    if chars.len() != 64 {
        return Err(ProtocolParseError::MalformedLine(format!(
            "prevhash must be 64 hex chars, got {}",
            chars.len()
        )));
    }
    let mut words: Vec<String> = chars.chunks(8).map(|c| c.iter().collect()).collect();
    words.reverse();
    let swapped_hex: String = words.concat();
    let mut bytes = hex::decode(&swapped_hex)
        .map_err(|_| ProtocolParseError::MalformedLine("prevhash is not valid hex".to_string()))?;
    bytes.reverse();
    bytes.try_into().map_err(|_| {
        ProtocolParseError::MalformedLine("prevhash did not decode to 32 bytes".to_string())
    })
}

fn hex_bytes_reversed(hex_str: &str, what: &'static str) -> Result<Vec<u8>, ProtocolParseError> {
    let mut bytes = hex::decode(hex_str)
        .map_err(|_| ProtocolParseError::MalformedLine(format!("{what} is not valid hex")))?;
    bytes.reverse();
    Ok(bytes)
}

/// A `mining.notify` message's positional parameters (spec §4.5 table).
struct NotifyParams {
    job_id: String,
    prev_hash: String,
    coinbase1: String,
    coinbase2: String,
    merkle_branch: Vec<String>,
    version: String,
    bits: String,
    ntime: String,
    clean_jobs: bool,
}

fn parse_notify_params(params: &Value) -> Result<NotifyParams, ProtocolParseError> {
    let arr = params
        .as_array()
        .ok_or_else(|| ProtocolParseError::MalformedJson("mining.notify params not an array".to_string()))?;
    if arr.len() < 9 {
        return Err(ProtocolParseError::MalformedJson(
            "mining.notify params too short".to_string(),
        ));
    }
    let as_str = |i: usize| -> Result<String, ProtocolParseError> {
        arr[i]
            .as_str()
            .map(|s| s.to_string())
            .ok_or_else(|| ProtocolParseError::MalformedJson(format!("notify param {i} not a string")))
    };
    let merkle_branch = arr[4]
        .as_array()
        .ok_or_else(|| ProtocolParseError::MalformedJson("notify merkle branch not an array".to_string()))?
        .iter()
        .map(|v| {
            v.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| ProtocolParseError::MalformedJson("merkle branch entry not a string".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;
    Ok(NotifyParams {
        job_id: as_str(0)?,
        prev_hash: as_str(1)?,
        coinbase1: as_str(2)?,
        coinbase2: as_str(3)?,
        merkle_branch,
        version: as_str(5)?,
        bits: as_str(6)?,
        ntime: as_str(7)?,
        clean_jobs: arr[8].as_bool().unwrap_or(false),
    })
}

/// Per-connection bridge state: everything the upstream-reading thread
/// accumulates that later notifies/submissions depend on. Owned by one
/// session; never shared across connections (unlike the original's
/// module-level `extra_nonce` global, which would otherwise leak an
/// extra-nonce2 counter across independent upstream links).
#[derive(Default)]
struct BridgeState {
    enonce1: Option<String>,
    n2len: Option<usize>,
    target: String,
    odokey: u32,
    announced_connected: bool,
    notify_seen: bool,
    extra_nonce2_counter: u32,
    job_id: String,
    ntime_hex: String,
}

impl BridgeState {
    fn fresh() -> Self {
        BridgeState {
            target: "f".repeat(64),
            ..Default::default()
        }
    }

    /// Applies the extra-nonce2 transition rule and returns the value to
    /// serialize for this job (§4.5 "Extra-nonce2 policy", S5): the first
    /// notify ever seen always starts the counter at zero; thereafter a
    /// `clean_jobs` notify while the counter is nonzero resets it, and any
    /// other notify increments it.
    fn next_extra_nonce2(&mut self, clean_jobs: bool) -> u32 {
        if !self.notify_seen {
            self.notify_seen = true;
            self.extra_nonce2_counter = 0;
        } else if clean_jobs && self.extra_nonce2_counter > 0 {
            self.extra_nonce2_counter = 0;
        } else {
            self.extra_nonce2_counter = self.extra_nonce2_counter.wrapping_add(1);
        }
        self.extra_nonce2_counter
    }
}

/// Builds the 80-byte header for a `mining.notify` job plus its
/// extra-nonce2 hex, given the enonce1/n2len already learned from the
/// upstream subscribe response (§4.5, `header.py::get_params_header`).
fn build_header(
    params: &NotifyParams,
    enonce1: &str,
    n2len: usize,
    extra_nonce2: u32,
) -> Result<(String, String), ProtocolParseError> {
    let extra_nonce2_hex = n2hex(extra_nonce2 as u64, n2len);

    let coinbase_hex = format!(
        "{}{}{}{}",
        params.coinbase1, enonce1, extra_nonce2_hex, params.coinbase2
    );
    let coinbase_bytes = hex::decode(&coinbase_hex)
        .map_err(|_| ProtocolParseError::MalformedLine("assembled coinbase is not valid hex".to_string()))?;
    let coinbase_txid = sha256d(&coinbase_bytes);

    let mut root = coinbase_txid;
    for branch_hex in &params.merkle_branch {
        let sibling: [u8; 32] = hex::decode(branch_hex)
            .map_err(|_| ProtocolParseError::MalformedLine("merkle branch entry is not valid hex".to_string()))?
            .try_into()
            .map_err(|_| ProtocolParseError::MalformedLine("merkle branch entry is not 32 bytes".to_string()))?;
        let mut buf = Vec::with_capacity(64);
        buf.extend_from_slice(&root);
        buf.extend_from_slice(&sibling);
        root = sha256d(&buf);
    }

    let prev_hash = prevhash_to_internal(&params.prev_hash)?;
    let version = u32::from_str_radix(&params.version, 16)
        .map_err(|_| ProtocolParseError::MalformedLine("version is not valid hex".to_string()))?;
    let bits = hex_bytes_reversed(&params.bits, "bits")?;
    let ntime = u32::from_str_radix(&params.ntime, 16)
        .map_err(|_| ProtocolParseError::MalformedLine("ntime is not valid hex".to_string()))?;

    let mut header = Vec::with_capacity(80);
    header.extend_from_slice(&version.to_le_bytes());
    header.extend_from_slice(&prev_hash);
    header.extend_from_slice(&root);
    header.extend_from_slice(&ntime.to_le_bytes());
    header.extend_from_slice(&bits);
    header.extend_from_slice(&[0u8; 4]); // nonce, miner-filled
    Ok((hex::encode(header), extra_nonce2_hex))
}

/// Translates one upstream Stratum line into zero or more lines to emit to
/// the miner, updating `state` as a side effect. Mirrors the dispatch in
/// `stratum.py::ProxyClientProtocol.lineReceived`.
fn translate_upstream_line(
    line: &str,
    state: &mut BridgeState,
    config: &StratumConfig,
) -> Result<Vec<String>, ProtocolParseError> {
    let v: Value = serde_json::from_str(line)
        .map_err(|e| ProtocolParseError::MalformedJson(e.to_string()))?;

    if let Some(reason) = v.get("reject-reason").and_then(|r| r.as_str()) {
        return Ok(vec![if reason == "Stale" {
            "result stale".to_string()
        } else {
            "result inconclusive".to_string()
        }]);
    }

    if let Some(method) = v.get("method").and_then(|m| m.as_str()) {
        return match method {
            "mining.set_difficulty" => {
                let difficulty = v
                    .get("params")
                    .and_then(|p| p.as_array())
                    .and_then(|a| a.first())
                    .and_then(|d| d.as_f64())
                    .unwrap_or(1.0)
                    .max(1.0) as u64;
                state.target = difficulty_to_hextarget(difficulty);

                let mut lines = Vec::new();
                if !state.announced_connected {
                    lines.push(format!("connected {}:{}", config.upstream_host, config.upstream_port));
                    state.announced_connected = true;
                }
                lines.push(format!("set_target {} diff {}", state.target, difficulty));
                Ok(lines)
            }
            "mining.notify" => {
                let (Some(enonce1), Some(n2len)) = (state.enonce1.clone(), state.n2len) else {
                    return Err(ProtocolParseError::Nonce2LenUninitialized);
                };
                let params = v
                    .get("params")
                    .ok_or_else(|| ProtocolParseError::MalformedJson("mining.notify missing params".to_string()))?;
                let notify = parse_notify_params(params)?;

                let extra_nonce2 = state.next_extra_nonce2(notify.clean_jobs);
                let (header_hex, extra_nonce2_hex) = build_header(&notify, &enonce1, n2len, extra_nonce2)?;

                let ntime = u32::from_str_radix(&notify.ntime, 16)
                    .map_err(|_| ProtocolParseError::MalformedLine("ntime is not valid hex".to_string()))?;
                state.odokey = v
                    .get("odokey")
                    .and_then(|o| o.as_u64())
                    .map(|o| o as u32)
                    .unwrap_or_else(|| odokey_from_ntime(ntime, &config.chain));
                state.job_id = notify.job_id.clone();
                state.ntime_hex = notify.ntime.clone();

                Ok(vec![format!(
                    "work {} {} {} {} {} {}",
                    header_hex, state.target, state.odokey, notify.job_id, notify.ntime, extra_nonce2_hex
                )])
            }
            _ => Ok(vec![line.to_string()]),
        };
    }

    if let Some(result) = v.get("result") {
        let id = v.get("id").and_then(|i| i.as_i64());
        if id == Some(0) {
            // mining.subscribe response: [subscription_details, enonce1, n2len]
            let arr = result
                .as_array()
                .ok_or_else(|| ProtocolParseError::MalformedJson("subscribe result not an array".to_string()))?;
            let enonce1 = arr
                .get(1)
                .and_then(|v| v.as_str())
                .ok_or_else(|| ProtocolParseError::MalformedJson("subscribe result missing enonce1".to_string()))?
                .to_string();
            let n2len = arr
                .get(2)
                .and_then(|v| v.as_u64().or_else(|| v.as_str().and_then(|s| s.parse().ok())))
                .ok_or_else(|| ProtocolParseError::MalformedJson("subscribe result missing n2len".to_string()))?
                as usize;
            let lines = vec![format!("set_subscribe_params {enonce1} {n2len}")];
            state.enonce1 = Some(enonce1);
            state.n2len = Some(n2len);
            return Ok(lines);
        }
        if result.as_bool() == Some(true) {
            return Ok(vec![if id == Some(1) {
                "authorized".to_string()
            } else {
                "result accepted".to_string()
            }]);
        }
        return Ok(vec![line.to_string()]);
    }

    Ok(vec![line.to_string()])
}

/// A miner→upstream request-id allocator plus whatever the `auth` line
/// told us about the miner's own username (needed for the worker-suffix
/// pool-credentials variant).
struct MinerToUpstream {
    next_id: u64,
    miner_user: Option<String>,
}

impl MinerToUpstream {
    fn new() -> Self {
        MinerToUpstream {
            next_id: 1,
            miner_user: None,
        }
    }

    fn alloc_id(&mut self) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }
}

/// Translates one miner line into a JSON-RPC request to forward upstream,
/// per §4.5's `auth`/`submit_nonce` rows.
fn translate_miner_line(
    line: &str,
    mts: &mut MinerToUpstream,
    config: &StratumConfig,
    bridge_state: &Mutex<BridgeState>,
) -> Result<Value, ProtocolParseError> {
    let mut parts = line.split_whitespace();
    match parts.next() {
        Some("auth") => {
            let user = parts
                .next()
                .ok_or_else(|| ProtocolParseError::MalformedLine(line.to_string()))?;
            let password = parts
                .next()
                .ok_or_else(|| ProtocolParseError::MalformedLine(line.to_string()))?;
            mts.miner_user = Some(user.to_string());

            let (final_user, final_password) = match &config.pool_credentials {
                Some(creds) if creds.append_worker_name => {
                    (format!("{}_{}", creds.user, user), creds.password.clone())
                }
                Some(creds) => (creds.user.clone(), creds.password.clone()),
                None => (user.to_string(), password.to_string()),
            };
            let id = mts.alloc_id();
            Ok(json!({
                "id": id,
                "method": "mining.authorize",
                "params": [final_user, final_password],
            }))
        }
        Some("submit_nonce") => {
            let ntime = parts.next();
            let nonce = parts.next();
            let header_placeholder = parts.next();
            let extra_nonce2_dec = parts.next();
            let (Some(ntime), Some(nonce), Some(header_placeholder), Some(extra_nonce2_dec)) =
                (ntime, nonce, header_placeholder, extra_nonce2_dec)
            else {
                return Err(ProtocolParseError::MalformedLine(line.to_string()));
            };
            let n2len = bridge_state
                .lock()
                .unwrap()
                .n2len
                .ok_or(ProtocolParseError::Nonce2LenUninitialized)?;
            let extra_nonce2: u64 = extra_nonce2_dec
                .parse()
                .map_err(|_| ProtocolParseError::MalformedLine(line.to_string()))?;
            let extra_nonce2_hex = n2hex(extra_nonce2, n2len);

            let user = config
                .pool_credentials
                .as_ref()
                .map(|c| {
                    if c.append_worker_name {
                        format!("{}_{}", c.user, mts.miner_user.as_deref().unwrap_or(""))
                    } else {
                        c.user.clone()
                    }
                })
                .or_else(|| mts.miner_user.clone())
                .unwrap_or_default();

            let id = mts.alloc_id();
            Ok(json!({
                "id": id,
                "method": "mining.submit",
                "params": [user, nonce, extra_nonce2_hex, header_placeholder, ntime],
            }))
        }
        _ => Err(ProtocolParseError::MalformedLine(line.to_string())),
    }
}

fn send_line(writer: &Mutex<TcpStream>, line: &str) -> std::io::Result<()> {
    let mut w = writer.lock().unwrap();
    w.write_all(line.as_bytes())?;
    w.write_all(b"\n")
}

enum SessionEnd {
    MinerDisconnected,
    UpstreamDisconnected,
}

/// Reads upstream lines, translates each, and forwards the results to the
/// miner — one side of the proxy tunnel.
fn upstream_to_miner_loop(
    upstream_read: TcpStream,
    miner_writer: Arc<Mutex<TcpStream>>,
    state: Arc<Mutex<BridgeState>>,
    config: Arc<StratumConfig>,
) {
    let mut reader = BufReader::new(upstream_read);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end();
                if trimmed.is_empty() {
                    continue;
                }
                let mut state = state.lock().unwrap();
                match translate_upstream_line(trimmed, &mut state, &config) {
                    Ok(out_lines) => {
                        drop(state);
                        for out in out_lines {
                            if send_line(&miner_writer, &out).is_err() {
                                return;
                            }
                        }
                    }
                    Err(e) => {
                        warn!("failed to translate upstream message: {e}");
                    }
                }
            }
            Err(e) => {
                debug!("upstream socket error: {e}");
                break;
            }
        }
    }
}

/// Reads miner lines, translates each, and forwards the results upstream —
/// the other side of the proxy tunnel.
fn miner_to_upstream_loop(
    miner_read: TcpStream,
    upstream_writer: Arc<Mutex<TcpStream>>,
    state: Arc<Mutex<BridgeState>>,
    config: Arc<StratumConfig>,
) {
    let mut mts = MinerToUpstream::new();
    let mut reader = BufReader::new(miner_read);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {
                let trimmed = line.trim_end();
                if trimmed.is_empty() {
                    continue;
                }
                match translate_miner_line(trimmed, &mut mts, &config, &state) {
                    Ok(request) => {
                        let body = request.to_string();
                        if send_line(&upstream_writer, &body).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        debug!("ignoring malformed miner line: {e}");
                    }
                }
            }
            Err(e) => {
                debug!("miner socket error: {e}");
                break;
            }
        }
    }
}

/// Runs one proxy session to completion: sends the initial
/// `mining.subscribe`, then pumps both directions until either side closes.
fn run_session(miner: TcpStream, upstream: TcpStream, config: Arc<StratumConfig>) -> std::io::Result<SessionEnd> {
    let miner_writer = Arc::new(Mutex::new(miner.try_clone()?));
    let upstream_writer = Arc::new(Mutex::new(upstream.try_clone()?));
    let state = Arc::new(Mutex::new(BridgeState::fresh()));

    send_line(
        &upstream_writer,
        &json!({"id": 0, "method": "mining.subscribe", "params": ["odo-stratum-bridge"]}).to_string(),
    )?;

    let (tx, rx) = mpsc::channel();

    let upstream_reader = upstream.try_clone()?;
    let miner_writer_for_up = miner_writer.clone();
    let state_for_up = state.clone();
    let config_for_up = config.clone();
    let tx_up = tx.clone();
    let up_handle = thread::spawn(move || {
        upstream_to_miner_loop(upstream_reader, miner_writer_for_up, state_for_up, config_for_up);
        let _ = tx_up.send(SessionEnd::UpstreamDisconnected);
    });

    let miner_reader = miner.try_clone()?;
    let down_handle = thread::spawn(move || {
        miner_to_upstream_loop(miner_reader, upstream_writer, state, config);
        let _ = tx.send(SessionEnd::MinerDisconnected);
    });

    let end = rx.recv().unwrap_or(SessionEnd::MinerDisconnected);
    let _ = miner.shutdown(Shutdown::Both);
    let _ = upstream.shutdown(Shutdown::Both);
    let _ = up_handle.join();
    let _ = down_handle.join();
    Ok(end)
}

/// Dials the upstream Stratum server, retrying with a doubling back-off
/// capped at 10 seconds (§4.5 "automatic reconnection").
fn connect_upstream_with_backoff(config: &StratumConfig) -> TcpStream {
    let mut backoff = Duration::from_secs(1);
    loop {
        match TcpStream::connect((config.upstream_host.as_str(), config.upstream_port)) {
            Ok(stream) => return stream,
            Err(e) => {
                warn!(
                    "failed to connect to upstream {}:{}: {e}, retrying in {:?}",
                    config.upstream_host, config.upstream_port, backoff
                );
                thread::sleep(backoff);
                backoff = (backoff * 2).min(Duration::from_secs(10));
            }
        }
    }
}

/// Runs one miner's bridge connection for its whole lifetime: dials (and
/// redials) the upstream pool, running a fresh proxy session each time the
/// upstream link drops, until the miner itself disconnects.
fn bridge_one_miner(miner: TcpStream, config: Arc<StratumConfig>) {
    loop {
        let upstream = connect_upstream_with_backoff(&config);
        info!("connected to upstream {}:{}", config.upstream_host, config.upstream_port);
        let miner_clone = match miner.try_clone() {
            Ok(m) => m,
            Err(e) => {
                warn!("failed to clone miner socket: {e}");
                return;
            }
        };
        match run_session(miner_clone, upstream, config.clone()) {
            Ok(SessionEnd::MinerDisconnected) | Err(_) => return,
            Ok(SessionEnd::UpstreamDisconnected) => {
                warn!("upstream connection dropped, reconnecting");
                continue;
            }
        }
    }
}

/// Accepts miner connections and spawns one bridge session per connection
/// (§5).
pub fn accept_loop(listener: std::net::TcpListener, config: Arc<StratumConfig>) {
    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let config = config.clone();
                thread::spawn(move || bridge_one_miner(stream, config));
            }
            Err(e) => warn!("accept() failed: {e}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn difficulty_one_begins_with_diff1_prefix() {
        // Invariant 7: difficulty_to_hextarget(1) begins with the diff-1 target.
        assert!(difficulty_to_hextarget(1).starts_with("00000000ffff0000"));
    }

    #[test]
    fn difficulty_zero_is_max_target() {
        assert_eq!(difficulty_to_hextarget(0), "f".repeat(64));
    }

    #[test]
    fn n2hex_pads_to_requested_length() {
        assert_eq!(n2hex(0, 4), "00000000");
        assert_eq!(n2hex(1, 4), "00000001");
    }

    /// S5: first notify emits extra_nonce2=0, second emits 1, and a
    /// clean_jobs notify while the counter is nonzero resets to 0.
    #[test]
    fn extra_nonce2_policy_matches_s5() {
        let mut state = BridgeState::fresh();
        assert_eq!(state.next_extra_nonce2(true), 0);
        assert_eq!(state.next_extra_nonce2(false), 1);
        assert_eq!(state.next_extra_nonce2(true), 0);
    }

    #[test]
    fn odokey_from_ntime_floors_to_interval_start() {
        let chain = ChainParams::testnet4(); // 1-day interval
        let interval = chain.odo_shapechange_interval_secs;
        let ntime = interval * 3 + 1234;
        assert_eq!(odokey_from_ntime(ntime, &chain), interval * 3);
    }

    #[test]
    fn prevhash_word_swap_preserves_word_internal_order() {
        // Eight distinct 4-byte words; word-swap should reverse their order
        // while keeping each word's own bytes untouched, matching
        // header.py's swap_order(s[::-1]) composed with unhexlify(...)[::-1].
        let words = ["aabbccdd", "11223344", "55667788", "99aabbcc", "ddeeff00", "01020304", "05060708", "090a0b0c"];
        let s: String = words.concat();
        let internal = prevhash_to_internal(&s).unwrap();
        let expected_hex: String = words.iter().rev().cloned().collect();
        let mut expected = hex::decode(&expected_hex).unwrap();
        expected.reverse();
        assert_eq!(internal.to_vec(), expected);
    }
}
