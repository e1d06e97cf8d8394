//! Cost-based ranking of viable candidates.
//!
//! Candidates are ordered by `(total_cost, implicit_count, index)`: cheaper
//! first, then fewer implicit conversions, then earlier declaration.

use crossbind_registry::Conversion;

use crate::policy::TieBreak;

/// A viable candidate with the conversions each supplied argument needs.
#[derive(Debug, Clone, PartialEq)]
pub struct OverloadMatch {
    /// Declaration index within the group.
    pub index: usize,
    pub conversions: Vec<Conversion>,
    pub total_cost: u32,
    pub implicit_count: usize,
}

impl OverloadMatch {
    pub fn new(index: usize, conversions: Vec<Conversion>) -> Self {
        let total_cost = conversions.iter().map(|c| c.cost).sum();
        let implicit_count = conversions.iter().filter(|c| c.is_implicit).count();
        Self { index, conversions, total_cost, implicit_count }
    }

    pub fn rank_key(&self) -> (u32, usize, usize) {
        (self.total_cost, self.implicit_count, self.index)
    }

    fn ties_with(&self, other: &OverloadMatch) -> bool {
        self.total_cost == other.total_cost && self.implicit_count == other.implicit_count
    }
}

/// Outcome of ranking a non-empty set of viable candidates.
#[derive(Debug, PartialEq)]
pub enum Ranked<'a> {
    Best(&'a OverloadMatch),
    /// The best candidates under a strict tie-break, in declaration order.
    Ambiguous(Vec<&'a OverloadMatch>),
}

/// Sort `viable` best first.
pub fn sort_matches(viable: &mut [OverloadMatch]) {
    viable.sort_by_key(OverloadMatch::rank_key);
}

/// Pick the best of `viable`, which must be sorted by [`sort_matches`].
///
/// Returns `None` only for an empty slice.
pub fn find_best_match(viable: &[OverloadMatch], tie_break: TieBreak) -> Option<Ranked<'_>> {
    let best = viable.first()?;
    if tie_break == TieBreak::Strict {
        let tied: Vec<_> = viable.iter().take_while(|m| m.ties_with(best)).collect();
        if tied.len() > 1 {
            return Some(Ranked::Ambiguous(tied));
        }
    }
    Some(Ranked::Best(best))
}
