//! Node JSON-RPC client (blocking). The `reqwest::blocking` client and
//! `serde_json` request-body shape are carried straight from the teacher's
//! `submit_block_to_node` (`miner.rs`); the method table and error-mapping
//! policy are grounded in `rpc.py::json_request`/`get_block_template`/
//! `submit_work`.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

/// One non-coinbase transaction in a `getblocktemplate` response.
#[derive(Debug, Clone, Deserialize)]
pub struct TemplateTx {
    pub data: String,
    pub txid: String,
    pub hash: String,
}

/// The subset of `getblocktemplate`'s result this system consumes.
#[derive(Debug, Clone, Deserialize)]
pub struct GetBlockTemplateResult {
    pub version: u32,
    pub previousblockhash: String,
    pub transactions: Vec<TemplateTx>,
    pub coinbasevalue: u64,
    pub height: u32,
    pub bits: String,
    pub curtime: u32,
    pub target: String,
    pub odokey: u32,
    pub longpollid: String,
    pub default_witness_commitment: Option<String>,
    /// Insertion-ordered: pushed into the coinbase scriptSig in the order
    /// `getblocktemplate` returned them (§3/§4.3), not sorted by key.
    #[serde(default)]
    pub coinbaseaux: IndexMap<String, String>,
}

#[derive(Debug, Serialize)]
struct JsonRpcRequest<'a> {
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct JsonRpcResponse {
    result: Option<Value>,
    error: Option<JsonRpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct JsonRpcErrorBody {
    code: i64,
    message: String,
}

/// Blocking JSON-RPC client, authenticated with HTTP Basic auth, matching
/// the node's `Authorization: Basic <b64(user:pass)>` convention (§6).
pub struct RpcClient {
    url: String,
    authorization: String,
    http: reqwest::blocking::Client,
}

impl RpcClient {
    pub fn new(url: impl Into<String>, authorization: impl Into<String>) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("building the blocking HTTP client cannot fail with this configuration");
        RpcClient {
            url: url.into(),
            authorization: authorization.into(),
            http,
        }
    }

    fn call(&self, method: &str, params: Value) -> Result<Value, RpcError> {
        let body = JsonRpcRequest { method, params };
        let response = self
            .http
            .post(&self.url)
            .header("Authorization", &self.authorization)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .map_err(|e| RpcError::new(500, e.to_string()))?;

        let status = response.status();
        let parsed: Result<JsonRpcResponse, _> = response.json();
        let parsed = match parsed {
            Ok(p) => p,
            Err(e) => {
                if !status.is_success() {
                    return Err(RpcError::new(status.as_u16() as i64, "HTTP status code"));
                }
                return Err(RpcError::new(500, e.to_string()));
            }
        };

        if let Some(err) = parsed.error {
            return Err(RpcError::new(err.code, err.message));
        }
        Ok(parsed.result.unwrap_or(Value::Null))
    }

    /// `getblocktemplate({rules:["segwit"], longpollid?}, "odo")`. Blocks on
    /// the node's long-poll for however long the node chooses to hold the
    /// connection open.
    pub fn get_block_template(
        &self,
        long_poll_id: Option<&str>,
    ) -> Result<GetBlockTemplateResult, RpcError> {
        let mut request_params = serde_json::Map::new();
        request_params.insert("rules".to_string(), Value::Array(vec![Value::String("segwit".to_string())]));
        if let Some(id) = long_poll_id {
            request_params.insert("longpollid".to_string(), Value::String(id.to_string()));
        }
        let params = Value::Array(vec![Value::Object(request_params), Value::String("odo".to_string())]);
        let result = self.call("getblocktemplate", params)?;
        serde_json::from_value(result).map_err(|e| RpcError::new(500, e.to_string()))
    }

    /// `submitblock(<hex>)`. A JSON-null result means the node accepted the
    /// block; any non-null string is the rejection reason, normalized here
    /// to `"accepted"` when null (matching `rpc.py::submit_work`).
    pub fn submit_block(&self, block_hex: &str) -> Result<String, RpcError> {
        let params = Value::Array(vec![Value::String(block_hex.to_string())]);
        let result = self.call("submitblock", params)?;
        Ok(match result {
            Value::Null => "accepted".to_string(),
            Value::String(s) => s,
            other => other.to_string(),
        })
    }
}
