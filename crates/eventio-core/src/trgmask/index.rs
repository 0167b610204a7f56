// crates/eventio-core/src/trgmask/index.rs

use tracing::warn;

use crate::trgmask::set::{TriggerMaskEntry, TriggerMaskSet};

/// Number of hash buckets.
pub const TRGMASK_PRIME: i64 = 15269;

/// Bucket of (event, telescope), or `None` if the key hashes outside the
/// table (negative ids).
pub fn bucket_of(event: i64, tel_id: i32) -> Option<usize> {
    let key = (tel_id as i64).checked_mul(10_000)?.checked_add(event)?;
    let h = key % TRGMASK_PRIME;
    if (0..TRGMASK_PRIME).contains(&h) {
        Some(h as usize)
    } else {
        None
    }
}

/// Hash index over the entries of one [`TriggerMaskSet`]. The set is owned
/// by the index; chains are entry positions, so the index can never
/// outlive the entries it points into.
#[derive(Clone, Debug)]
pub struct TriggerMaskIndex {
    set: TriggerMaskSet,
    heads: Vec<Option<usize>>,
    next: Vec<Option<usize>>,
    dropped: usize,
}

impl TriggerMaskIndex {
    pub fn build(set: TriggerMaskSet) -> Self {
        let nb = TRGMASK_PRIME as usize;
        let mut heads = vec![None; nb];
        let mut tails: Vec<Option<usize>> = vec![None; nb];
        let mut next = vec![None; set.len()];
        let mut dropped = 0;

        for (i, e) in set.entries().iter().enumerate() {
            let Some(b) = bucket_of(e.event, e.tel_id) else {
                warn!(
                    event = e.event,
                    tel_id = e.tel_id,
                    "not indexing invalid trigger mask entry"
                );
                dropped += 1;
                continue;
            };
            match tails[b] {
                Some(t) => next[t] = Some(i),
                None => heads[b] = Some(i),
            }
            tails[b] = Some(i);
        }

        Self {
            set,
            heads,
            next,
            dropped,
        }
    }

    pub fn run(&self) -> i64 {
        self.set.run
    }

    pub fn set(&self) -> &TriggerMaskSet {
        &self.set
    }

    /// Entries rejected by `build`.
    pub fn dropped(&self) -> usize {
        self.dropped
    }

    fn chain(&self, bucket: usize) -> Chain<'_> {
        Chain {
            index: self,
            at: self.heads.get(bucket).copied().flatten(),
        }
    }

    pub fn lookup(&self, event: i64, tel_id: i32) -> Option<i32> {
        let b = bucket_of(event, tel_id)?;
        self.chain(b)
            .find(|e| e.event == event && e.tel_id == tel_id)
            .map(|e| e.mask)
    }

    /// Length of the longest collision chain.
    pub fn longest_chain(&self) -> usize {
        (0..self.heads.len())
            .map(|b| self.chain(b).count())
            .max()
            .unwrap_or(0)
    }

    /// Entries in bucket order, chains in insertion order.
    pub fn iter_hashed(&self) -> impl Iterator<Item = &TriggerMaskEntry> + '_ {
        (0..self.heads.len()).flat_map(move |b| self.chain(b))
    }
}

struct Chain<'a> {
    index: &'a TriggerMaskIndex,
    at: Option<usize>,
}

impl<'a> Iterator for Chain<'a> {
    type Item = &'a TriggerMaskEntry;

    fn next(&mut self) -> Option<Self::Item> {
        let i = self.at?;
        self.at = self.index.next.get(i).copied().flatten();
        self.index.set.entries().get(i)
    }
}
