//! In-memory chains for unit tests.

use std::collections::{HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use parking_lot::Mutex;
use relay_dest::{Confirmation, DestError, DestinationClient};
use relay_source::{CommitteeState, SourceChainReader, SourceError};
use relay_types::codec::Source;
use relay_types::tx::{InvokeTx, NativeInvocation};
use relay_types::{
    Address, BlockKind, BlockRecord, ChainId, CoSignatures, DsBlock, DsBlockHeader, EpochId, TxBlock,
    TxBlockHeader, TxHash,
};
use relay_wallet::SigningIdentity;

pub struct MockSource {
    committee: Mutex<CommitteeState>,
    heads: Mutex<VecDeque<Result<u64, SourceError>>>,
    head_reads: Mutex<usize>,
    stall_heads: Mutex<bool>,
    block_failures: Mutex<HashMap<BlockKind, SourceError>>,
    block_requests: Mutex<Vec<(BlockKind, EpochId)>>,
}

impl MockSource {
    pub fn with_heads(heads: impl IntoIterator<Item = u64>) -> Self {
        Self::with_head_results(heads.into_iter().map(Ok).collect())
    }

    /// Head reads answer from `results` in order; the last answer repeats.
    pub fn with_head_results(results: Vec<Result<u64, SourceError>>) -> Self {
        Self {
            committee: Mutex::new(CommitteeState {
                committee: vec!["A".into(), "B".into(), "C".into()],
                boundary: EpochId::from("100"),
                content: EpochId::from("101"),
                guard_count: Some(0),
            }),
            heads: Mutex::new(results.into()),
            head_reads: Mutex::new(0),
            stall_heads: Mutex::new(false),
            block_failures: Mutex::new(HashMap::new()),
            block_requests: Mutex::new(Vec::new()),
        }
    }

    pub fn set_committee(&self, state: CommitteeState) {
        *self.committee.lock() = state;
    }

    pub fn fail_block(&self, kind: BlockKind, err: SourceError) {
        self.block_failures.lock().insert(kind, err);
    }

    /// Head reads never answer.
    pub fn stall_head_reads(&self) {
        *self.stall_heads.lock() = true;
    }

    pub fn head_reads(&self) -> usize {
        *self.head_reads.lock()
    }

    pub fn block_requests(&self) -> Vec<(BlockKind, EpochId)> {
        self.block_requests.lock().clone()
    }

    pub fn block(kind: BlockKind, id: &EpochId) -> BlockRecord {
        let height = id.as_height().unwrap_or_default();
        match kind {
            BlockKind::Boundary => BlockRecord::boundary(
                id.clone(),
                DsBlock::new(
                    DsBlockHeader {
                        block_num: height,
                        leader_pub_key: b"A".to_vec(),
                        ..DsBlockHeader::default()
                    },
                    1_000,
                    CoSignatures::default(),
                    [0; 32],
                ),
            ),
            BlockKind::Content => BlockRecord::content(
                id.clone(),
                TxBlock::new(
                    TxBlockHeader {
                        block_num: height,
                        ds_block_num: 100,
                        ..TxBlockHeader::default()
                    },
                    2_000,
                    CoSignatures::default(),
                    Vec::new(),
                ),
            ),
        }
    }
}

#[async_trait]
impl SourceChainReader for MockSource {
    async fn current_finality_committee(&self) -> Result<CommitteeState, SourceError> {
        Ok(self.committee.lock().clone())
    }

    async fn block_at(&self, kind: BlockKind, id: &EpochId) -> Result<BlockRecord, SourceError> {
        self.block_requests.lock().push((kind, id.clone()));
        if let Some(err) = self.block_failures.lock().get(&kind) {
            return Err(err.clone());
        }
        Ok(Self::block(kind, id))
    }

    async fn head_height(&self) -> Result<u64, SourceError> {
        *self.head_reads.lock() += 1;
        let stalled = *self.stall_heads.lock();
        if stalled {
            std::future::pending::<()>().await;
        }
        let mut heads = self.heads.lock();
        if heads.len() > 1 {
            heads.pop_front().unwrap()
        } else {
            heads
                .front()
                .cloned()
                .unwrap_or_else(|| Err(SourceError::Transient("no head".into())))
        }
    }

    async fn network_id(&self) -> Result<String, SourceError> {
        Ok("1".into())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestCall {
    Submit(TxHash),
    Confirm(TxHash),
}

/// Destination chain holding a header-sync contract and raw storage.
#[derive(Default)]
pub struct MockDest {
    storage: Mutex<HashMap<(Address, Vec<u8>), Vec<u8>>>,
    initialized: Mutex<HashSet<ChainId>>,
    payloads: Mutex<Vec<Vec<u8>>>,
    calls: Mutex<Vec<DestCall>>,
    confirmations: Mutex<VecDeque<Result<Confirmation, DestError>>>,
    submit_error: Mutex<Option<DestError>>,
}

impl MockDest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_storage(&self, contract: Address, key: &[u8], value: Vec<u8>) {
        self.storage.lock().insert((contract, key.to_vec()), value);
    }

    /// Answers for `wait_for_confirmation`; once drained, every wait confirms.
    pub fn script_confirmations(&self, answers: Vec<Result<Confirmation, DestError>>) {
        *self.confirmations.lock() = answers.into();
    }

    pub fn fail_submissions(&self, err: DestError) {
        *self.submit_error.lock() = Some(err);
    }

    pub fn calls(&self) -> Vec<DestCall> {
        self.calls.lock().clone()
    }

    /// Genesis headers accepted by the contract, in arrival order.
    pub fn payloads(&self) -> Vec<Vec<u8>> {
        self.payloads.lock().clone()
    }

    pub fn mark_initialized(&self, chain: ChainId) {
        self.initialized.lock().insert(chain);
    }

    pub fn is_initialized(&self, chain: ChainId) -> bool {
        self.initialized.lock().contains(&chain)
    }
}

fn decode_sync_args(args: &[u8]) -> (ChainId, Vec<u8>) {
    let mut source = Source::new(args);
    let chain = source.next_var_uint().unwrap();
    let header = source.next_var_bytes().unwrap().to_vec();
    (ChainId(chain), header)
}

#[async_trait]
impl DestinationClient for MockDest {
    async fn get_storage(
        &self,
        contract: &Address,
        key: &[u8],
    ) -> Result<Option<Vec<u8>>, DestError> {
        Ok(self.storage.lock().get(&(*contract, key.to_vec())).cloned())
    }

    async fn submit_transaction(
        &self,
        invocation: &NativeInvocation,
        signers: &[SigningIdentity],
    ) -> Result<TxHash, DestError> {
        if signers.is_empty() {
            return Err(DestError::InvalidRequest("no signers supplied".into()));
        }
        if let Some(err) = self.submit_error.lock().clone() {
            return Err(err);
        }
        let (chain, header) = decode_sync_args(&invocation.args);
        if !self.initialized.lock().insert(chain) {
            return Err(DestError::Rejected {
                code: 43001,
                message: "INVALID TRANSACTION: genesis header had been initialized".into(),
            });
        }
        self.payloads.lock().push(header);
        let hash = InvokeTx {
            nonce: 0,
            invocation: invocation.clone(),
        }
        .hash();
        self.calls.lock().push(DestCall::Submit(hash));
        Ok(hash)
    }

    async fn wait_for_confirmation(&self, tx_hash: &TxHash) -> Result<Confirmation, DestError> {
        self.calls.lock().push(DestCall::Confirm(*tx_hash));
        self.confirmations
            .lock()
            .pop_front()
            .unwrap_or(Ok(Confirmation::Confirmed { height: 7 }))
    }
}
