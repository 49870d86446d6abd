use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rand_core::{OsRng, RngCore};
use relay_types::tx::{multisig_threshold, InvokeTx, NativeInvocation, SignatureEntry, SignedTx};
use relay_types::{Address, TxHash};
use relay_wallet::SigningIdentity;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::time::{sleep, Instant};
use tracing::{debug, info, trace, warn};

use crate::{Confirmation, DestError, DestinationClient, Result};

const RPC_SUCCESS: i64 = 0;
const RPC_UNKNOWN_TRANSACTION: i64 = 44001;

/// How long to poll for a transaction to land in a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConfirmationPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConfirmationPolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(1),
            timeout: Duration::from_secs(60),
        }
    }
}

/// JSON-RPC client for a destination chain node.
#[derive(Debug)]
pub struct JsonRpcDestinationClient {
    client: reqwest::Client,
    url: String,
    confirmation: ConfirmationPolicy,
    next_id: AtomicU64,
}

#[derive(Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: Value,
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    error: i64,
    #[serde(default)]
    desc: String,
    #[serde(default)]
    result: Value,
}

impl JsonRpcDestinationClient {
    pub fn new(
        url: impl Into<String>,
        request_timeout: Duration,
        confirmation: ConfirmationPolicy,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|err| DestError::InvalidRequest(format!("http client: {err}")))?;
        Ok(Self {
            client,
            url: url.into(),
            confirmation,
            next_id: AtomicU64::new(1),
        })
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };
        trace!(method, "destination rpc call");

        let response = self
            .client
            .post(&self.url)
            .json(&request)
            .send()
            .await
            .map_err(|err| DestError::Transport(format!("{method}: {err}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(DestError::Transport(format!("{method}: http status {status}")));
        }
        let body: RpcResponse = response
            .json()
            .await
            .map_err(|err| DestError::Malformed(format!("{method}: {err}")))?;
        unwrap_response(body)
    }

    async fn block_height_of(&self, tx_hash: &TxHash) -> Result<Option<u32>> {
        match self
            .call("getblockheightbytxhash", json!([tx_hash.to_hex_string()]))
            .await
        {
            Ok(value) => {
                let height = value.as_u64().ok_or_else(|| {
                    DestError::Malformed(format!("getblockheightbytxhash: {value}"))
                })?;
                let height = u32::try_from(height).map_err(|_| {
                    DestError::Malformed(format!("block height {height} out of range"))
                })?;
                Ok(Some(height))
            }
            Err(DestError::Rejected { code, .. }) if code == RPC_UNKNOWN_TRANSACTION => Ok(None),
            Err(err) => Err(err),
        }
    }
}

fn unwrap_response(body: RpcResponse) -> Result<Value> {
    if body.error == RPC_SUCCESS {
        return Ok(body.result);
    }
    let detail = match &body.result {
        Value::String(text) if !text.is_empty() => format!("{}: {text}", body.desc),
        Value::Null => body.desc.clone(),
        other => format!("{}: {other}", body.desc),
    };
    Err(DestError::Rejected {
        code: body.error,
        message: detail,
    })
}

/// Build and sign the transaction for `invocation`. Every signer signs the
/// same body hash.
pub fn sign_invocation(
    invocation: &NativeInvocation,
    signers: &[SigningIdentity],
    nonce: u32,
) -> Result<SignedTx> {
    if signers.is_empty() {
        return Err(DestError::InvalidRequest("no signers supplied".into()));
    }
    let threshold = u16::try_from(multisig_threshold(signers.len()))
        .map_err(|_| DestError::InvalidRequest(format!("{} signers", signers.len())))?;
    let tx = InvokeTx {
        nonce,
        invocation: invocation.clone(),
    };
    let hash = tx.hash();
    let signatures = signers
        .iter()
        .map(|signer| SignatureEntry {
            public_key: signer.public_key(),
            signature: signer.sign(&hash.0),
        })
        .collect();
    Ok(SignedTx {
        tx,
        threshold,
        signatures,
    })
}

#[async_trait]
impl DestinationClient for JsonRpcDestinationClient {
    async fn get_storage(&self, contract: &Address, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let value = self
            .call(
                "getstorage",
                json!([contract.to_hex_string(), hex::encode(key)]),
            )
            .await?;
        match value {
            Value::Null => Ok(None),
            Value::String(raw) if raw.is_empty() => Ok(None),
            Value::String(raw) => hex::decode(&raw)
                .map(Some)
                .map_err(|err| DestError::Malformed(format!("getstorage: {err}"))),
            other => Err(DestError::Malformed(format!("getstorage: {other}"))),
        }
    }

    async fn submit_transaction(
        &self,
        invocation: &NativeInvocation,
        signers: &[SigningIdentity],
    ) -> Result<TxHash> {
        let signed = sign_invocation(invocation, signers, OsRng.next_u32())?;
        let local_hash = signed.tx.hash();
        debug!(
            method = %invocation.method,
            contract = %invocation.contract.to_hex_string(),
            signers = signers.len(),
            threshold = signed.threshold,
            tx_hash = %local_hash,
            "broadcasting transaction"
        );

        let value = self
            .call("sendrawtransaction", json!([hex::encode(signed.encode())]))
            .await?;
        reported_tx_hash(&value, local_hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<Confirmation> {
        let deadline = Instant::now() + self.confirmation.timeout;
        loop {
            match self.block_height_of(tx_hash).await {
                Ok(Some(height)) => {
                    info!(%tx_hash, height, "transaction confirmed");
                    return Ok(Confirmation::Confirmed { height });
                }
                Ok(None) => trace!(%tx_hash, "transaction not yet in a block"),
                Err(DestError::Transport(err)) => {
                    debug!(%tx_hash, error = %err, "confirmation poll failed")
                }
                Err(err) => return Err(err),
            }
            if Instant::now() + self.confirmation.poll_interval > deadline {
                return Ok(Confirmation::TimedOut);
            }
            sleep(self.confirmation.poll_interval).await;
        }
    }
}

/// Hash the node accepted the transaction under. Falls back to the locally
/// computed hash only when the node did not report one.
fn reported_tx_hash(value: &Value, local: TxHash) -> Result<TxHash> {
    let reported = match value {
        Value::Null => return Ok(local),
        Value::String(raw) if raw.is_empty() => return Ok(local),
        Value::String(raw) => TxHash::from_hex_string(raw).map_err(|err| {
            DestError::Malformed(format!("sendrawtransaction: tx hash {raw:?}: {err}"))
        })?,
        other => {
            return Err(DestError::Malformed(format!(
                "sendrawtransaction: unexpected result {other}"
            )))
        }
    };
    if reported != local {
        warn!(%reported, %local, "node reported a different tx hash, tracking the node's");
    }
    Ok(reported)
}
