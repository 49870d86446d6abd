use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use relay_types::{BlockKind, BlockRecord, DsBlock, EpochId, TxBlock, VerboseDsBlock, VerboseTxBlock};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, trace};

use crate::{CommitteeState, Result, SourceChainReader, SourceError};

const RPC_INVALID_ADDRESS_OR_KEY: i64 = -5;
const RPC_INVALID_PARAMETER: i64 = -8;
const RPC_IN_WARMUP: i64 = -28;
const RPC_METHOD_NOT_FOUND: i64 = -32601;
const RPC_INTERNAL_ERROR: i64 = -32603;

/// JSON-RPC client for the source chain node API.
#[derive(Debug)]
pub struct JsonRpcSourceReader {
    client: reqwest::Client,
    url: String,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    id: u64,
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
}

#[derive(Deserialize)]
struct RpcResponse {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct DsCommResponse {
    #[serde(rename = "CurrentDSEpoch")]
    current_ds_epoch: String,
    #[serde(rename = "CurrentTxEpoch")]
    current_tx_epoch: String,
    #[serde(rename = "NumOfDSGuard", default)]
    num_of_ds_guard: Option<u32>,
    #[serde(rename = "dscomm")]
    ds_comm: Vec<String>,
}

#[derive(Deserialize)]
struct TxBlockResponse {
    header: TxBlockHeader,
}

#[derive(Deserialize)]
struct TxBlockHeader {
    #[serde(rename = "BlockNum")]
    block_num: String,
}

impl JsonRpcSourceReader {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| SourceError::Malformed(format!("http client: {err}")))?;
        Ok(Self {
            client,
            url: url.into(),
            next_id: AtomicU64::new(1),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            jsonrpc: "2.0",
            method,
            params,
        };
        trace!(method, "source rpc call");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|err| SourceError::Transient(format!("{method}: {err}")))?;

        let status = response.status();
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(SourceError::Transient(format!("{method}: http status {status}")));
        }
        if !status.is_success() {
            return Err(SourceError::Malformed(format!("{method}: http status {status}")));
        }

        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| SourceError::Malformed(format!("{method}: {err}")))?;
        unwrap_response(method, body)
    }
}

fn unwrap_response(method: &str, body: RpcResponse) -> Result<Value> {
    if let Some(error) = body.error {
        return Err(classify_rpc_error(method, &error));
    }
    match body.result {
        Some(Value::Null) | None => Err(SourceError::NotFound(format!("{method}: empty result"))),
        Some(value) => Ok(value),
    }
}

fn classify_rpc_error(method: &str, error: &RpcErrorBody) -> SourceError {
    let detail = format!("{method}: {} (code {})", error.message, error.code);
    match error.code {
        RPC_INVALID_ADDRESS_OR_KEY | RPC_INVALID_PARAMETER => SourceError::NotFound(detail),
        RPC_METHOD_NOT_FOUND => SourceError::Malformed(detail),
        RPC_IN_WARMUP | RPC_INTERNAL_ERROR => SourceError::Transient(detail),
        _ if error.message.to_lowercase().contains("not found") => SourceError::NotFound(detail),
        _ => SourceError::Transient(detail),
    }
}

fn parse_committee(value: Value) -> Result<CommitteeState> {
    let dto: DsCommResponse = serde_json::from_value(value)
        .map_err(|err| SourceError::Malformed(format!("GetCurrentDSComm: {err}")))?;
    Ok(CommitteeState {
        committee: dto.ds_comm,
        boundary: EpochId::new(dto.current_ds_epoch),
        content: EpochId::new(dto.current_tx_epoch),
        guard_count: dto.num_of_ds_guard,
    })
}

fn parse_head_height(value: Value) -> Result<u64> {
    let dto: TxBlockResponse = serde_json::from_value(value)
        .map_err(|err| SourceError::Malformed(format!("GetLatestTxBlock: {err}")))?;
    dto.header.block_num.parse().map_err(|err| {
        SourceError::Malformed(format!(
            "GetLatestTxBlock: block number {:?}: {err}",
            dto.header.block_num
        ))
    })
}

/// Decode a verbose block and check it is the one that was asked for.
fn decode_block(kind: BlockKind, id: &EpochId, value: Value) -> Result<BlockRecord> {
    let record = match kind {
        BlockKind::Boundary => {
            let verbose: VerboseDsBlock = serde_json::from_value(value)
                .map_err(|err| SourceError::Malformed(format!("ds block {id}: {err}")))?;
            let block = DsBlock::from_verbose(&verbose)
                .map_err(|err| SourceError::Malformed(format!("ds block {id}: {err}")))?;
            BlockRecord::boundary(id.clone(), block)
        }
        BlockKind::Content => {
            let verbose: VerboseTxBlock = serde_json::from_value(value)
                .map_err(|err| SourceError::Malformed(format!("tx block {id}: {err}")))?;
            let block = TxBlock::from_verbose(&verbose)
                .map_err(|err| SourceError::Malformed(format!("tx block {id}: {err}")))?;
            BlockRecord::content(id.clone(), block)
        }
    };
    if let Some(requested) = id.as_height() {
        if record.block_num() != requested {
            return Err(SourceError::Malformed(format!(
                "{kind} block {id}: node returned block {}",
                record.block_num()
            )));
        }
    }
    Ok(record)
}

#[async_trait]
impl SourceChainReader for JsonRpcSourceReader {
    async fn current_finality_committee(&self) -> Result<CommitteeState> {
        let state = parse_committee(self.call("GetCurrentDSComm", json!([])).await?)?;
        debug!(
            boundary = %state.boundary,
            content = %state.content,
            members = state.committee.len(),
            "fetched finality committee"
        );
        Ok(state)
    }

    async fn block_at(&self, kind: BlockKind, id: &EpochId) -> Result<BlockRecord> {
        let method = match kind {
            BlockKind::Boundary => "GetDsBlockVerbose",
            BlockKind::Content => "GetTxBlockVerbose",
        };
        let record = decode_block(kind, id, self.call(method, json!([id.as_str()])).await?)?;
        debug!(%kind, %id, hash = %record.block_hash_hex(), "fetched block");
        Ok(record)
    }

    async fn head_height(&self) -> Result<u64> {
        parse_head_height(self.call("GetLatestTxBlock", json!([])).await?)
    }

    async fn network_id(&self) -> Result<String> {
        Ok(match self.call("GetNetworkId", json!([])).await? {
            Value::String(id) => id,
            other => other.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn error(code: i64, message: &str) -> RpcErrorBody {
        RpcErrorBody {
            code,
            message: message.to_string(),
        }
    }

    #[test]
    fn out_of_range_block_is_not_found() {
        let err = classify_rpc_error(
            "GetTxBlockVerbose",
            &error(RPC_INVALID_PARAMETER, "Requested block number is out of range"),
        );
        assert!(matches!(err, SourceError::NotFound(_)));
    }

    #[test]
    fn method_not_found_is_not_a_missing_block() {
        let err = classify_rpc_error("GetDsBlockVerbose", &error(RPC_METHOD_NOT_FOUND, "Method not found"));
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[test]
    fn internal_errors_are_transient() {
        let err = classify_rpc_error("GetLatestTxBlock", &error(RPC_INTERNAL_ERROR, "busy"));
        assert!(err.is_transient());
    }

    #[test]
    fn null_result_is_not_found() {
        let body = RpcResponse {
            result: Some(Value::Null),
            error: None,
        };
        assert!(matches!(
            unwrap_response("GetTxBlockVerbose", body),
            Err(SourceError::NotFound(_))
        ));
    }

    #[test]
    fn committee_keeps_node_order() {
        let state = parse_committee(json!({
            "CurrentDSEpoch": "100",
            "CurrentTxEpoch": "101",
            "NumOfDSGuard": 3,
            "dscomm": ["0x03c", "0x02a", "0x02b"],
        }))
        .unwrap();
        assert_eq!(state.committee, ["0x03c", "0x02a", "0x02b"]);
        assert_eq!(state.boundary, EpochId::from("100"));
        assert_eq!(state.content, EpochId::from("101"));
        assert_eq!(state.guard_count, Some(3));
    }

    #[test]
    fn head_height_parses_decimal_block_number() {
        let height = parse_head_height(json!({ "header": { "BlockNum": "4242" }, "body": {} }));
        assert_eq!(height.unwrap(), 4242);

        let bad = parse_head_height(json!({ "header": { "BlockNum": "abc" } }));
        assert!(matches!(bad, Err(SourceError::Malformed(_))));
    }

    fn verbose_ds(block_num: &str) -> Value {
        let hash = hex::encode([1u8; 32]);
        json!({
            "header": {
                "BlockNum": block_num,
                "CommitteeHash": hash,
                "Difficulty": 5,
                "DifficultyDS": 9,
                "EpochNum": "9900",
                "GasPrice": "2000000000",
                "LeaderPubKey": "0x02aa",
                "PoWWinners": [],
                "PoWWinnersIP": [],
                "PrevHash": hash,
                "ShardingHash": hash,
                "Timestamp": "1609459100000000",
                "Version": 1
            },
            "signature": "bb",
            "CS1": "cc",
            "B1": [true],
            "B2": [true]
        })
    }

    #[test]
    fn verbose_ds_block_is_decoded() {
        let record =
            decode_block(BlockKind::Boundary, &EpochId::from("100"), verbose_ds("100")).unwrap();
        assert_eq!(record.kind(), BlockKind::Boundary);
        assert_eq!(record.block_num(), 100);
        assert_eq!(record.epoch, EpochId::from("100"));
    }

    #[test]
    fn block_for_another_height_is_malformed() {
        let err = decode_block(BlockKind::Boundary, &EpochId::from("100"), verbose_ds("99"))
            .unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)), "got {err:?}");
    }

    #[test]
    fn raw_block_without_header_fields_is_malformed() {
        let err = decode_block(
            BlockKind::Content,
            &EpochId::from("101"),
            json!({ "header": { "BlockNum": "101" }, "body": {} }),
        )
        .unwrap_err();
        assert!(matches!(err, SourceError::Malformed(_)));
    }

    #[tokio::test]
    async fn unreachable_node_is_transient() {
        let reader =
            JsonRpcSourceReader::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();
        let err = reader.head_height().await.unwrap_err();
        assert!(err.is_transient(), "got {err:?}");
    }
}
