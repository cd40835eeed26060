//! Integration test for S4 ("stale detection"): a miner's retained work
//! item survives being superseded once (stale-tolerant submission), but is
//! evicted once the MRU cache of size 2 has moved past it.

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::net::TcpStream;
use std::sync::Arc;

use odo_pool::manager::{accept_loop, Manager};
use odo_pool::rpc::{GetBlockTemplateResult, RpcClient};
use odo_pool::template::{BlockTemplate, RewardSplit};

fn sample_template() -> GetBlockTemplateResult {
    GetBlockTemplateResult {
        version: 0x20000000,
        previousblockhash: "11".repeat(32),
        transactions: vec![],
        coinbasevalue: 5_000_000_000,
        height: 42,
        bits: "1d00ffff".to_string(),
        curtime: 1_600_000_000,
        target: "00".repeat(32),
        odokey: 12345,
        longpollid: "abc".to_string(),
        default_witness_commitment: None,
        coinbaseaux: Default::default(),
    }
}

fn read_work_header(reader: &mut BufReader<TcpStream>) -> String {
    let mut line = String::new();
    reader.read_line(&mut line).expect("read work line");
    let mut parts = line.trim_end().split_whitespace();
    assert_eq!(parts.next(), Some("work"));
    parts.next().expect("work line has a header field").to_string()
}

#[test]
fn evicted_work_item_is_reported_stale() {
    let manager = Manager::new();
    {
        let manager = manager.clone();
        std::thread::spawn(move || manager.run());
    }

    // Never dialed: the "stale" path in MinerSession::submit returns before
    // any RPC call is made.
    let rpc = Arc::new(RpcClient::new("http://127.0.0.1:1", "Basic unused"));

    let listener = TcpListener::bind("127.0.0.1:0").expect("bind miner listener");
    let addr = listener.local_addr().expect("listener has a local addr");
    {
        let manager = manager.clone();
        let rpc = rpc.clone();
        std::thread::spawn(move || accept_loop(manager, rpc, listener));
    }

    let miner = TcpStream::connect(addr).expect("connect as miner");
    let mut reader = BufReader::new(miner.try_clone().expect("clone miner stream"));
    let mut writer = miner;

    // Give the accept thread time to register the session with the manager
    // before any template is pushed, so the first "work" line below is
    // guaranteed to carry push #1's template rather than a later one.
    std::thread::sleep(std::time::Duration::from_millis(100));

    let split = RewardSplit::solo(vec![0xAA]);
    let tpl = sample_template();

    // Push #1: the work item we'll try to redeem after it's evicted.
    manager.push_template(Some(BlockTemplate::from_rpc(&tpl, &split).unwrap()));
    let first_header = read_work_header(&mut reader);

    // Push #2: still within the size-2 MRU cache, so #1 remains valid.
    manager.push_template(Some(BlockTemplate::from_rpc(&tpl, &split).unwrap()));
    let _second_header = read_work_header(&mut reader);

    // Push #3: evicts #1 from the size-2 cache.
    manager.push_template(Some(BlockTemplate::from_rpc(&tpl, &split).unwrap()));
    let _third_header = read_work_header(&mut reader);

    writer
        .write_all(format!("submit {first_header}\n").as_bytes())
        .expect("send submit line");

    let mut result_line = String::new();
    reader.read_line(&mut result_line).expect("read result line");
    assert_eq!(result_line.trim_end(), "result stale");
}
