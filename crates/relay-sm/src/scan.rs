//! Block-range arithmetic for backfills and live tails.

use tbtc_relayer_primitives::types::BlockHeight;

use crate::config::ScanCfg;

/// First block a backfill at `head` covers: `max(start_block, head - lookback)`.
pub fn backfill_start(cfg: &ScanCfg, head: BlockHeight) -> BlockHeight {
    let floor = cfg.start_block().unwrap_or(0);
    head.saturating_sub(cfg.lookback_blocks()).max(floor)
}

/// Splits `[from, to]` into consecutive inclusive ranges of at most `chunk_size` blocks.
pub fn block_ranges(
    from: BlockHeight,
    to: BlockHeight,
    chunk_size: u64,
) -> Vec<(BlockHeight, BlockHeight)> {
    let chunk_size = chunk_size.max(1);
    let mut ranges = Vec::new();
    let mut lo = from;

    while lo <= to {
        let hi = lo.saturating_add(chunk_size - 1).min(to);
        ranges.push((lo, hi));
        match hi.checked_add(1) {
            Some(next) => lo = next,
            None => break,
        }
    }

    ranges
}

/// The name under which a live tail stores its cursor.
pub fn cursor_stream(kind: &str, chain: &impl std::fmt::Display) -> String {
    format!("{kind}:{chain}")
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn backfill_respects_start_block() {
        let cfg = ScanCfg {
            start_block: Some(9_500),
            lookback_blocks: 1_000,
            chunk_size: 100,
        };

        assert_eq!(backfill_start(&cfg, 10_000), 9_500);
        assert_eq!(backfill_start(&cfg, 20_000), 19_000);

        let unbounded = ScanCfg {
            start_block: None,
            ..cfg
        };
        assert_eq!(backfill_start(&unbounded, 300), 0);
    }

    #[test]
    fn chunks_cover_the_range() {
        assert_eq!(
            block_ranges(100, 349, 100),
            vec![(100, 199), (200, 299), (300, 349)]
        );
        assert_eq!(block_ranges(5, 5, 100), vec![(5, 5)]);
        assert!(block_ranges(6, 5, 100).is_empty());
    }

    proptest! {
        #[test]
        fn chunks_are_contiguous_and_bounded(
            from in 0u64..1_000_000,
            len in 0u64..50_000,
            chunk in 1u64..5_000,
        ) {
            let to = from + len;
            let ranges = block_ranges(from, to, chunk);

            prop_assert_eq!(ranges.first().map(|r| r.0), Some(from));
            prop_assert_eq!(ranges.last().map(|r| r.1), Some(to));
            for window in ranges.windows(2) {
                prop_assert_eq!(window[0].1 + 1, window[1].0);
            }
            for (lo, hi) in ranges {
                prop_assert!(hi - lo < chunk);
            }
        }
    }
}
