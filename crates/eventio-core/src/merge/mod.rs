// crates/eventio-core/src/merge/mod.rs
//
// Two-input merge of block streams describing the same showers seen by
// different telescopes.

pub mod aggregate;
pub mod engine;
pub mod order;
pub mod state;

pub use engine::StreamMerger;
pub use order::{classify, BlockClass, OrderKey};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MergeOptions {
    /// Events with fewer telescopes than this (by any of the three counts)
    /// are dropped.
    pub min_telescopes: usize,
    /// Number of merged events listed individually before listing only
    /// every 1000th.
    pub max_list: usize,
    /// List every event.
    pub verbose: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            min_telescopes: 2,
            max_list: 999,
            verbose: false,
        }
    }
}

impl MergeOptions {
    /// Whether the `n`-th merged event record (counting from 0) is logged.
    pub fn lists_event(&self, n: usize) -> bool {
        self.verbose || n < self.max_list || n % 1000 == 0
    }

    /// Whether the switch to sparse listing is announced before the `n`-th
    /// merged event record.
    pub fn announces_sparse_listing(&self, n: usize) -> bool {
        !self.verbose && n == self.max_list
    }
}

/// A delayed record that was never written.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LostRecord {
    Event(i64),
    PeSum(i64),
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub events_written: u64,
    pub events_dropped: u64,
    pub pe_sums_written: u64,
    pub showers_written: u64,
    pub blocks_read: [u64; 2],
    pub events_read: [u64; 2],
    pub blocks_written: u64,
    pub lost: Vec<LostRecord>,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sparse_listing_is_announced_once() {
        for max_list in [999, 1000, 5] {
            let opts = MergeOptions {
                max_list,
                ..Default::default()
            };
            let announced: Vec<usize> = (0..5000)
                .filter(|&n| opts.announces_sparse_listing(n))
                .collect();
            assert_eq!(announced, vec![max_list]);
            assert!(opts.lists_event(max_list - 1));
            assert!(opts.lists_event(2000));
            assert!(!opts.lists_event(max_list + 2));
        }
    }

    #[test]
    fn verbose_lists_everything_without_notice() {
        let opts = MergeOptions {
            verbose: true,
            max_list: 10,
            ..Default::default()
        };
        assert!((0..3000).all(|n| opts.lists_event(n)));
        assert!((0..3000).all(|n| !opts.announces_sparse_listing(n)));
    }
}
