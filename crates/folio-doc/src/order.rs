//! Fractional order keys for blocks.
//!
//! Blocks carry an `f64` order key. Inserting between two neighbours bisects
//! their keys, so siblings are never renumbered on a normal insert. When the
//! float gap is exhausted (the bisection is no longer strictly between the
//! neighbours) every key is rewritten to `0, 1, 2, …` and the insert retried.
//!
//! All functions are pure: they take the current block slice and return a new
//! `Vec`, leaving the caller to swap it into the document wholesale.

use folio_types::{Block, BlockId};

use crate::{DocError, Result};

/// Distance between keys after renormalization and when appending.
pub const KEY_STEP: f64 = 1.0;

/// Insert a new empty block directly after `after`.
///
/// Returns the new block and the full updated block list.
pub fn insert_after(blocks: &[Block], after: &BlockId) -> Result<(Block, Vec<Block>)> {
    let idx = index_of(blocks, after)?;
    let mut out = blocks.to_vec();

    let key = match candidate_key(&out, idx) {
        Some(key) => key,
        None => {
            tracing::debug!(
                anchor = %after,
                blocks = out.len(),
                "order keys exhausted, renormalizing"
            );
            renormalize_in_place(&mut out);
            // Integer keys always leave room at idx + 0.5.
            candidate_key(&out, idx).unwrap_or(idx as f64 * KEY_STEP + KEY_STEP / 2.0)
        }
    };

    let block = Block::new(out[idx].document_id, key);
    out.insert(idx + 1, block.clone());
    Ok((block, out))
}

/// Remove a block. Removing the last remaining block is a no-op: a document
/// always keeps at least one block.
pub fn remove(blocks: &[Block], id: &BlockId) -> Result<Vec<Block>> {
    let idx = index_of(blocks, id)?;
    let mut out = blocks.to_vec();
    if out.len() > 1 {
        out.remove(idx);
    }
    Ok(out)
}

/// Rewrite keys to evenly spaced integers, preserving display order.
pub fn renormalize(blocks: &[Block]) -> Vec<Block> {
    let mut out = blocks.to_vec();
    renormalize_in_place(&mut out);
    out
}

/// True when keys strictly increase in display order.
pub fn is_strictly_ordered(blocks: &[Block]) -> bool {
    blocks.windows(2).all(|w| w[0].order_key < w[1].order_key)
}

fn renormalize_in_place(blocks: &mut [Block]) {
    for (i, block) in blocks.iter_mut().enumerate() {
        block.order_key = i as f64 * KEY_STEP;
    }
}

fn index_of(blocks: &[Block], id: &BlockId) -> Result<usize> {
    blocks
        .iter()
        .position(|b| b.id == *id)
        .ok_or(DocError::BlockNotFound(*id))
}

/// Key for a block placed right after `blocks[idx]`, or `None` when the gap
/// to the following block (or past the end) has no representable room.
fn candidate_key(blocks: &[Block], idx: usize) -> Option<f64> {
    let lo = blocks[idx].order_key;
    let key = match blocks.get(idx + 1) {
        Some(next) => lo + (next.order_key - lo) / 2.0,
        None => lo + KEY_STEP,
    };
    let upper_ok = blocks.get(idx + 1).is_none_or(|next| key < next.order_key);
    (key.is_finite() && key > lo && upper_ok).then_some(key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_types::DocumentId;
    use rand::Rng;

    fn blocks_with_keys(keys: &[f64]) -> Vec<Block> {
        let doc = DocumentId::new();
        keys.iter().map(|k| Block::new(doc, *k)).collect()
    }

    #[test]
    fn test_append_after_last_adds_one() {
        let blocks = blocks_with_keys(&[0.0, 1.0]);
        let (new, out) = insert_after(&blocks, &blocks[1].id).unwrap();
        assert_eq!(new.order_key, 2.0);
        assert_eq!(out.len(), 3);
        assert_eq!(out[2].id, new.id);
        assert_eq!(new.document_id, blocks[0].document_id);
        assert!(new.content.is_none());
    }

    #[test]
    fn test_insert_between_bisects() {
        let blocks = blocks_with_keys(&[1.0, 2.0]);
        let (new, out) = insert_after(&blocks, &blocks[0].id).unwrap();
        assert_eq!(new.order_key, 1.5);
        assert_eq!(out[1].id, new.id);
        assert!(is_strictly_ordered(&out));
    }

    #[test]
    fn test_repeated_insert_at_fixed_anchor_stays_ordered() {
        let mut blocks = blocks_with_keys(&[0.0, 1.0]);
        let anchor = blocks[0].id;
        for _ in 0..200 {
            let (_, out) = insert_after(&blocks, &anchor).unwrap();
            blocks = out;
            assert!(is_strictly_ordered(&blocks));
        }
        assert_eq!(blocks.len(), 202);
        assert_eq!(blocks[0].id, anchor);
    }

    #[test]
    fn test_exhausted_gap_renormalizes() {
        let blocks = blocks_with_keys(&[1.0, f64::from_bits(1.0f64.to_bits() + 1)]);
        let (new, out) = insert_after(&blocks, &blocks[0].id).unwrap();
        assert!(is_strictly_ordered(&out));
        assert_eq!(out[0].order_key, 0.0);
        assert_eq!(new.order_key, 0.5);
        assert_eq!(out[2].order_key, 1.0);
    }

    #[test]
    fn test_unordered_input_is_repaired_on_insert() {
        // Keys produced by an older, non-bisecting policy can overshoot.
        let blocks = blocks_with_keys(&[1.0, 2.5, 2.0]);
        let (_, out) = insert_after(&blocks, &blocks[1].id).unwrap();
        assert!(is_strictly_ordered(&out));
    }

    #[test]
    fn test_random_inserts_keep_strict_order() {
        let mut rng = rand::thread_rng();
        let mut blocks = blocks_with_keys(&[0.0]);
        for _ in 0..500 {
            let anchor = blocks[rng.gen_range(0..blocks.len())].id;
            let (_, out) = insert_after(&blocks, &anchor).unwrap();
            blocks = out;
        }
        assert_eq!(blocks.len(), 501);
        assert!(is_strictly_ordered(&blocks));
    }

    #[test]
    fn test_remove_middle_block() {
        let blocks = blocks_with_keys(&[0.0, 1.0, 2.0]);
        let out = remove(&blocks, &blocks[1].id).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, blocks[0].id);
        assert_eq!(out[1].id, blocks[2].id);
    }

    #[test]
    fn test_remove_only_block_is_noop() {
        let blocks = blocks_with_keys(&[0.0]);
        let out = remove(&blocks, &blocks[0].id).unwrap();
        assert_eq!(out, blocks);
    }

    #[test]
    fn test_unknown_block_is_error() {
        let blocks = blocks_with_keys(&[0.0]);
        let missing = BlockId::new();
        assert_eq!(
            insert_after(&blocks, &missing).unwrap_err(),
            DocError::BlockNotFound(missing)
        );
        assert_eq!(
            remove(&blocks, &missing).unwrap_err(),
            DocError::BlockNotFound(missing)
        );
    }

    #[test]
    fn test_renormalize_preserves_order() {
        let blocks = blocks_with_keys(&[0.25, 7.0, 1e12]);
        let out = renormalize(&blocks);
        let keys: Vec<f64> = out.iter().map(|b| b.order_key).collect();
        assert_eq!(keys, vec![0.0, 1.0, 2.0]);
        assert_eq!(out[2].id, blocks[2].id);
    }
}
