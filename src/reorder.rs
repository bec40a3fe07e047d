//! Reordering of the pending buffer.
//!
//! No two candies of one flavour can be eaten at the same time, so a buffer
//! that front-loads a single flavour leaves eaters idle. Interleaving draws
//! one candy per flavour per round, in ascending flavour order:
//!
//! ```text
//! 0 1 1 2 2 2 3 3 3 3 4 4 4 4 4  ->  0 1 2 3 4 1 2 3 4 2 3 4 3 4 4
//! ```
//!
//! This is a best-effort heuristic. The only hard guarantee is that candies
//! of one flavour keep their relative order; a buffer dominated by one
//! flavour still ends in a run of it.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::model::{Candy, Flavour};

/// How the pending buffer is reordered after every change.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderPolicy {
    /// Round-robin across flavour groups (see [`interleave`]).
    #[default]
    Interleave,
    /// Keep submission order.
    Arrival,
}

impl ReorderPolicy {
    pub fn apply<C: Candy>(self, pending: &mut VecDeque<C>) {
        match self {
            ReorderPolicy::Interleave => interleave(pending),
            ReorderPolicy::Arrival => {}
        }
    }
}

impl std::str::FromStr for ReorderPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "interleave" => Ok(ReorderPolicy::Interleave),
            "arrival" => Ok(ReorderPolicy::Arrival),
            other => Err(format!("unknown reorder policy: {other}")),
        }
    }
}

impl std::fmt::Display for ReorderPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ReorderPolicy::Interleave => "interleave",
            ReorderPolicy::Arrival => "arrival",
        };
        write!(f, "{s}")
    }
}

/// Rebuild `pending` by round-robin draw across flavour groups.
///
/// Groups are visited in ascending flavour order; each round takes the next
/// candy from every group that still has one.
pub fn interleave<C: Candy>(pending: &mut VecDeque<C>) {
    if pending.len() < 2 {
        return;
    }

    let mut groups: BTreeMap<Flavour, VecDeque<C>> = BTreeMap::new();
    for candy in pending.drain(..) {
        groups.entry(candy.flavour()).or_default().push_back(candy);
    }

    // BTreeMap::retain visits keys in ascending order, which is the round order.
    while !groups.is_empty() {
        groups.retain(|_, group| {
            if let Some(candy) = group.pop_front() {
                pending.push_back(candy);
            }
            !group.is_empty()
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq)]
    struct Tagged {
        flavour: i64,
        seq: usize,
    }

    impl Candy for Tagged {
        fn flavour(&self) -> Flavour {
            Flavour(self.flavour)
        }
    }

    fn buffer(flavours: &[i64]) -> VecDeque<Flavour> {
        flavours.iter().copied().map(Flavour).collect()
    }

    fn flavours(pending: &VecDeque<Flavour>) -> Vec<i64> {
        pending.iter().map(|f| f.0).collect()
    }

    #[test]
    fn interleaves_groups_in_key_order() {
        let mut pending = buffer(&[0, 1, 1, 2, 2, 2]);
        interleave(&mut pending);
        assert_eq!(flavours(&pending), vec![0, 1, 2, 1, 2, 2]);
    }

    #[test]
    fn interleaves_uneven_groups() {
        let mut pending = buffer(&[0, 1, 1, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 4]);
        interleave(&mut pending);
        assert_eq!(
            flavours(&pending),
            vec![0, 1, 2, 3, 4, 1, 2, 3, 4, 2, 3, 4, 3, 4, 4]
        );
    }

    #[test]
    fn sorts_by_flavour_not_arrival() {
        let mut pending = buffer(&[5, 5, -3, 9, -3]);
        interleave(&mut pending);
        assert_eq!(flavours(&pending), vec![-3, 5, 9, -3, 5]);
    }

    #[test]
    fn same_flavour_keeps_submission_order() {
        let submitted = [2, 1, 2, 2, 1, 0, 2, 1];
        let mut pending: VecDeque<Tagged> = submitted
            .iter()
            .enumerate()
            .map(|(seq, &flavour)| Tagged { flavour, seq })
            .collect();

        interleave(&mut pending);

        assert_eq!(pending.len(), submitted.len());
        for flavour in [0, 1, 2] {
            let seqs: Vec<usize> = pending
                .iter()
                .filter(|c| c.flavour == flavour)
                .map(|c| c.seq)
                .collect();
            let mut sorted = seqs.clone();
            sorted.sort();
            assert_eq!(seqs, sorted, "flavour {flavour} reordered internally");
        }
    }

    #[test]
    fn repeated_interleave_is_stable() {
        let mut pending = buffer(&[3, 3, 1, 2, 1, 3]);
        interleave(&mut pending);
        let once = flavours(&pending);
        interleave(&mut pending);
        assert_eq!(flavours(&pending), once);
    }

    #[test]
    fn single_flavour_and_empty_buffers_are_untouched() {
        let mut pending = buffer(&[4, 4, 4]);
        interleave(&mut pending);
        assert_eq!(flavours(&pending), vec![4, 4, 4]);

        let mut empty = buffer(&[]);
        interleave(&mut empty);
        assert!(empty.is_empty());
    }

    #[test]
    fn arrival_policy_leaves_order_alone() {
        let mut pending = buffer(&[2, 2, 1]);
        ReorderPolicy::Arrival.apply(&mut pending);
        assert_eq!(flavours(&pending), vec![2, 2, 1]);
        ReorderPolicy::Interleave.apply(&mut pending);
        assert_eq!(flavours(&pending), vec![1, 2, 2]);
    }

    #[test]
    fn policy_parses_from_str() {
        assert_eq!("arrival".parse::<ReorderPolicy>(), Ok(ReorderPolicy::Arrival));
        assert_eq!(
            "interleave".parse::<ReorderPolicy>(),
            Ok(ReorderPolicy::Interleave)
        );
        assert!("head".parse::<ReorderPolicy>().is_err());
    }
}
