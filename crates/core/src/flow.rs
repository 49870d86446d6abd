use std::sync::Arc;

use relay_source::SourceChainReader;
use relay_types::ChainId;
use relay_wallet::SigningIdentity;
use tracing::{info, instrument};

use crate::assembler::assemble;
use crate::error::{RelayError, Result};
use crate::submitter::{BootstrapResult, BootstrapSubmitter};
use crate::waiter::{wait_for_height, CancelSignal, WaitPolicy};

/// End-to-end genesis bootstrap for one source chain.
pub struct GenesisSync {
    reader: Arc<dyn SourceChainReader>,
    submitter: BootstrapSubmitter,
    source_chain: ChainId,
    wait: WaitPolicy,
}

impl GenesisSync {
    pub fn new(
        reader: Arc<dyn SourceChainReader>,
        submitter: BootstrapSubmitter,
        source_chain: ChainId,
        wait: WaitPolicy,
    ) -> Self {
        Self {
            reader,
            submitter,
            source_chain,
            wait,
        }
    }

    /// Read the committee, wait for its content block, assemble the snapshot
    /// and submit it once.
    ///
    /// Only the wait observes `cancel`; a submission in flight runs to
    /// completion.
    #[instrument(skip_all, fields(chain_id = %chain_id))]
    pub async fn run(
        &self,
        chain_id: ChainId,
        signers: &[SigningIdentity],
        cancel: &mut CancelSignal,
    ) -> Result<BootstrapResult> {
        if chain_id != self.source_chain {
            return Err(RelayError::UnsupportedChain {
                requested: chain_id,
                configured: self.source_chain,
            });
        }

        let state = self
            .reader
            .current_finality_committee()
            .await
            .map_err(RelayError::Source)?;
        info!(
            boundary = %state.boundary,
            content = %state.content,
            members = state.committee.len(),
            guards = ?state.guard_count,
            "current finality committee"
        );

        let target = state
            .content
            .as_height()
            .ok_or_else(|| RelayError::InvalidEpoch(state.content.clone()))?;
        wait_for_height(self.reader.as_ref(), target, &self.wait, cancel).await?;

        let network = self.reader.network_id().await.map_err(RelayError::Source)?;
        info!(%network, "source chain reachable");

        let snapshot = assemble(
            &state.committee,
            &state.boundary,
            &state.content,
            self.reader.as_ref(),
        )
        .await?;
        let payload = snapshot.encode()?;

        Ok(self.submitter.submit(chain_id, &payload, signers).await)
    }
}
