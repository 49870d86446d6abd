use relay_source::SourceChainReader;
use relay_types::{BlockKind, EpochId, FinalityCommittee, GenesisSnapshot};
use tracing::debug;

use crate::error::{RelayError, Result};

/// Fetch the boundary and content blocks and bundle them with `committee`.
///
/// Read failures are not retried; the caller has already waited for the
/// content block to exist.
pub async fn assemble(
    committee: &[String],
    boundary: &EpochId,
    content: &EpochId,
    reader: &dyn SourceChainReader,
) -> Result<GenesisSnapshot> {
    let boundary_block = fetch(reader, BlockKind::Boundary, boundary).await?;
    let content_block = fetch(reader, BlockKind::Content, content).await?;

    debug!(
        %boundary,
        %content,
        members = committee.len(),
        boundary_hash = %boundary_block.block_hash_hex(),
        content_hash = %content_block.block_hash_hex(),
        "assembled genesis snapshot"
    );

    Ok(GenesisSnapshot::new(
        content_block,
        boundary_block,
        FinalityCommittee::from_public_keys(committee.iter().cloned()),
    ))
}

async fn fetch(
    reader: &dyn SourceChainReader,
    kind: BlockKind,
    id: &EpochId,
) -> Result<relay_types::BlockRecord> {
    reader
        .block_at(kind, id)
        .await
        .map_err(|source| RelayError::SourceRead {
            what: format!("{kind} block {id}"),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockSource;
    use relay_source::SourceError;

    fn keys(list: &[&str]) -> Vec<String> {
        list.iter().map(|k| k.to_string()).collect()
    }

    #[tokio::test]
    async fn fetches_boundary_then_content() {
        let source = MockSource::with_heads([101]);
        let snapshot = assemble(
            &keys(&["A", "B", "C"]),
            &EpochId::from("100"),
            &EpochId::from("101"),
            &source,
        )
        .await
        .unwrap();

        assert_eq!(
            source.block_requests(),
            vec![
                (BlockKind::Boundary, EpochId::from("100")),
                (BlockKind::Content, EpochId::from("101")),
            ]
        );
        assert_eq!(snapshot.boundary().epoch, EpochId::from("100"));
        assert_eq!(snapshot.content().epoch, EpochId::from("101"));
    }

    #[tokio::test]
    async fn committee_order_is_kept() {
        let source = MockSource::with_heads([101]);
        let snapshot = assemble(
            &keys(&["C", "A", "B"]),
            &EpochId::from("100"),
            &EpochId::from("101"),
            &source,
        )
        .await
        .unwrap();
        let order: Vec<_> = snapshot
            .committee()
            .members()
            .iter()
            .map(|member| member.pub_key.clone())
            .collect();
        assert_eq!(order, keys(&["C", "A", "B"]));
    }

    #[tokio::test]
    async fn missing_block_is_a_source_read_error() {
        let source = MockSource::with_heads([101]);
        source.fail_block(BlockKind::Content, SourceError::NotFound("tx block 101".into()));
        let err = assemble(
            &keys(&["A"]),
            &EpochId::from("100"),
            &EpochId::from("101"),
            &source,
        )
        .await
        .unwrap_err();
        match err {
            RelayError::SourceRead { what, source } => {
                assert_eq!(what, "content block 101");
                assert!(matches!(source, SourceError::NotFound(_)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
