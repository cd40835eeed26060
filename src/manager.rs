//! C4: pool manager — template refresher, manager loop, and per-miner
//! sessions.
//!
//! Grounded on `pool.py`'s `get_templates`/`Manager`/`Miner` (MentalCollatz
//! odo-miner), kept as three cooperating activities under `std::thread` +
//! `Mutex`/`Condvar` exactly as §5 describes, rather than introducing an
//! async runtime the teacher doesn't use.

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Condvar, Mutex};
use std::time::{Duration, Instant};

use log::{debug, error, info, warn};

use crate::error::RpcError;
use crate::rpc::RpcClient;
use crate::template::{BlockTemplate, RewardSplit};

fn zeroed_work_line() -> String {
    format!("work {} {} 0", "0".repeat(64), "0".repeat(64))
}

/// Per-miner bookkeeping kept in MRU order so a submission referencing a
/// slightly outdated header can still be reconstructed (§3 `WorkItem`).
#[derive(Clone)]
struct WorkItem {
    header_hex: String,
    template: Arc<BlockTemplate>,
    extra_nonce: u32,
}

/// Mutable state shared by the refresher, the manager loop, and reader
/// threads — the only cross-thread mutable structure in C4 (§5).
struct ManagerState {
    current_template: Option<Arc<BlockTemplate>>,
    extra_nonce_counter: u32,
    miners: Vec<Arc<MinerSession>>,
}

/// Owns `ManagerState` behind a single mutex+condvar pair, per §4.4/§5.
pub struct Manager {
    state: Mutex<ManagerState>,
    cond: Condvar,
}

impl Manager {
    pub fn new() -> Arc<Self> {
        Arc::new(Manager {
            state: Mutex::new(ManagerState {
                current_template: None,
                extra_nonce_counter: 0,
                miners: Vec::new(),
            }),
            cond: Condvar::new(),
        })
    }

    /// Replaces the current template, resets the extra-nonce counter, and
    /// clears every miner's `next_refresh` so each is dispatched fresh work
    /// before the manager loop re-waits.
    pub fn push_template(&self, template: Option<BlockTemplate>) {
        let mut state = self.state.lock().unwrap();
        state.current_template = template.map(Arc::new);
        state.extra_nonce_counter = 0;
        for miner in &state.miners {
            *miner.next_refresh.lock().unwrap() = Instant::now();
        }
        self.cond.notify_all();
    }

    fn add_miner(&self, miner: Arc<MinerSession>) {
        let mut state = self.state.lock().unwrap();
        state.miners.push(miner);
        self.cond.notify_all();
    }

    fn remove_miner(&self, id: u64) {
        let mut state = self.state.lock().unwrap();
        state.miners.retain(|m| m.id != id);
    }

    /// The manager loop (§4.4): for each miner due for a refresh, dispatch
    /// work and consume one extra-nonce; then sleep until the earliest
    /// `next_refresh` or a broadcast (new template / new miner).
    pub fn run(self: Arc<Self>) {
        loop {
            let mut state = self.state.lock().unwrap();
            let now = Instant::now();
            let mut next_wake = now + Duration::from_secs(1000);

            let due: Vec<Arc<MinerSession>> = state
                .miners
                .iter()
                .filter(|m| *m.next_refresh.lock().unwrap() <= now)
                .cloned()
                .collect();

            for miner in &due {
                let extra_nonce = state.extra_nonce_counter;
                state.extra_nonce_counter = state.extra_nonce_counter.wrapping_add(1);
                let template = state.current_template.clone();
                miner.push_work(template, extra_nonce);
            }

            for miner in &state.miners {
                next_wake = next_wake.min(*miner.next_refresh.lock().unwrap());
            }
            let wait_for = next_wake.saturating_duration_since(Instant::now());
            let (guard, _timeout) = self.cond.wait_timeout(state, wait_for).unwrap();
            drop(guard);
        }
    }
}

/// A connected miner's session state (§3 `MinerSession`).
struct MinerSession {
    id: u64,
    conn_write: Mutex<TcpStream>,
    work_items: Mutex<Vec<WorkItem>>,
    next_refresh: Mutex<Instant>,
    refresh_interval: Duration,
}

impl MinerSession {
    /// On a non-null template: computes the header, sends `work ...`,
    /// inserts the new `WorkItem` at the front of MRU order (trimmed to
    /// length 2). On a null template: emits the zeroed "paused" line and
    /// clears retained work items.
    fn push_work(&self, template: Option<Arc<BlockTemplate>>, extra_nonce: u32) {
        let line = match &template {
            None => {
                *self.work_items.lock().unwrap() = Vec::new();
                zeroed_work_line()
            }
            Some(template) => match template.get_work(extra_nonce) {
                Ok(header_hex) => {
                    let line = format!("work {} {} {}", header_hex, template.target, template.odo_key);
                    let mut items = self.work_items.lock().unwrap();
                    items.insert(
                        0,
                        WorkItem {
                            header_hex,
                            template: template.clone(),
                            extra_nonce,
                        },
                    );
                    items.truncate(2);
                    line
                }
                Err(e) => {
                    error!("failed to build work for miner {}: {e}", self.id);
                    zeroed_work_line()
                }
            },
        };
        *self.next_refresh.lock().unwrap() = Instant::now() + self.refresh_interval;
        if let Err(e) = self.send(&line) {
            debug!("miner {} send failed, will be cleaned up by its reader: {e}", self.id);
        }
    }

    fn send(&self, line: &str) -> std::io::Result<()> {
        let mut conn = self.conn_write.lock().unwrap();
        conn.write_all(line.as_bytes())?;
        conn.write_all(b"\n")
    }

    /// Matches a submitted header against retained `WorkItem`s by its first
    /// 152 hex characters (76 bytes: everything but the nonce), per §4.4 and
    /// §9 Open Question 4. Returns the node's verdict, or `"stale"` if no
    /// retained item matches.
    fn submit(&self, rpc: &RpcClient, submitted_header: &str) -> String {
        let matched = {
            let items = self.work_items.lock().unwrap();
            items
                .iter()
                .find(|item| prefix_76_bytes(&item.header_hex) == prefix_76_bytes(submitted_header))
                .cloned()
        };
        let Some(item) = matched else {
            return "stale".to_string();
        };
        let block_data = match item.template.get_data(item.extra_nonce) {
            Ok(data) => data,
            Err(e) => {
                error!("failed to assemble block for submission: {e}");
                return "error".to_string();
            }
        };
        let full_block_hex = format!("{}{}", submitted_header, block_data);
        match rpc.submit_block(&full_block_hex) {
            Ok(verdict) => verdict,
            Err(e) => {
                warn!("failed to submit block: {e}");
                "error".to_string()
            }
        }
    }
}

fn prefix_76_bytes(header_hex: &str) -> &str {
    &header_hex[..152.min(header_hex.len())]
}

/// Runs one miner connection's reader loop to completion: parses `submit`
/// lines, replies with `result <verdict>`, and logs-and-ignores anything
/// else. On read error or EOF, deregisters from the manager and closes the
/// socket — exception-safe via the `Drop` guard below.
fn run_miner_session(manager: Arc<Manager>, rpc: Arc<RpcClient>, stream: TcpStream, id: u64) {
    let reader_stream = match stream.try_clone() {
        Ok(s) => s,
        Err(e) => {
            error!("failed to clone miner socket: {e}");
            return;
        }
    };
    let session = Arc::new(MinerSession {
        id,
        conn_write: Mutex::new(stream),
        work_items: Mutex::new(Vec::new()),
        next_refresh: Mutex::new(Instant::now()),
        refresh_interval: Duration::from_secs(10),
    });
    manager.add_miner(session.clone());

    struct Deregister<'a> {
        manager: &'a Manager,
        id: u64,
    }
    impl Drop for Deregister<'_> {
        fn drop(&mut self) {
            self.manager.remove_miner(self.id);
        }
    }
    let _guard = Deregister { manager: &manager, id };

    let mut reader = BufReader::new(reader_stream);
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let trimmed = line.trim_end();
                if trimmed.is_empty() {
                    continue;
                }
                let mut parts = trimmed.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some("submit"), Some(header), None) => {
                        let verdict = session.submit(&rpc, header);
                        if session.send(&format!("result {verdict}")).is_err() {
                            break;
                        }
                    }
                    _ => {
                        debug!("miner {id}: unknown command: {trimmed}");
                    }
                }
            }
            Err(e) => {
                debug!("miner {id}: socket error: {e}");
                break;
            }
        }
    }
}

/// Listens for miner connections and spawns one reader thread per
/// connection (§5).
pub fn accept_loop(manager: Arc<Manager>, rpc: Arc<RpcClient>, listener: TcpListener) {
    let mut next_id = 0u64;
    for incoming in listener.incoming() {
        match incoming {
            Ok(stream) => {
                let manager = manager.clone();
                let rpc = rpc.clone();
                let id = next_id;
                next_id += 1;
                std::thread::spawn(move || run_miner_session(manager, rpc, stream, id));
            }
            Err(e) => warn!("accept() failed: {e}"),
        }
    }
}

/// Template refresher (§4.4): long-polls the node, injects `cbstring` into
/// the template's `coinbaseaux`, and pushes parsed `BlockTemplate`s to the
/// manager. On RPC/socket failure it pushes a null template exactly once
/// per failure streak and retries with a 1-second back-off.
pub fn run_refresher(manager: Arc<Manager>, rpc: Arc<RpcClient>, reward_split: RewardSplit, cbstring: String) {
    let mut long_poll_id: Option<String> = None;
    let mut last_error_code: Option<i64> = None;
    // Tracks whether miners currently hold a template, so a failure only
    // nulls their work once at the success→failure transition (matching
    // `pool.py::get_templates`'s `last_errno == 0` check) rather than on
    // every tick of a failure streak.
    let mut had_template = false;

    loop {
        let outcome = rpc
            .get_block_template(long_poll_id.as_deref())
            .and_then(|mut raw_template| {
                raw_template
                    .coinbaseaux
                    .insert("cbstring".to_string(), cbstring.clone());
                BlockTemplate::from_rpc(&raw_template, &reward_split)
                    .map_err(|e| RpcError::new(0, e.to_string()))
            });

        match outcome {
            Ok(template) => {
                long_poll_id = Some(template.long_poll_id.clone());
                manager.push_template(Some(template));
                had_template = true;
                if last_error_code.is_some() {
                    info!("successfully acquired template");
                    last_error_code = None;
                }
            }
            Err(e) => {
                if had_template {
                    manager.push_template(None);
                    had_template = false;
                }
                if last_error_code != Some(e.code) {
                    last_error_code = Some(e.code);
                    warn!("template refresh failing: {e}");
                }
            }
        }
        std::thread::sleep(Duration::from_secs(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zeroed_work_line_has_expected_shape() {
        let line = zeroed_work_line();
        assert_eq!(line, format!("work {} {} 0", "0".repeat(64), "0".repeat(64)));
    }

    #[test]
    fn prefix_76_bytes_excludes_nonce() {
        let header = "a".repeat(152) + "ffffffff";
        assert_eq!(prefix_76_bytes(&header).len(), 152);
        assert_eq!(prefix_76_bytes(&header), "a".repeat(152));
    }
}
