//! Resolution policy.

use crossbind_registry::Conversion;

/// How candidates that tie on cost are settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TieBreak {
    /// The earliest declared candidate wins.
    #[default]
    DeclarationOrder,
    /// A tie on cost and implicit-conversion count is ambiguous.
    Strict,
}

/// Tunables for [`OverloadResolver`](crate::OverloadResolver).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvePolicy {
    /// Highest per-argument cost a viable candidate may need.
    pub max_cost: u32,
    pub tie_break: TieBreak,
}

impl Default for ResolvePolicy {
    fn default() -> Self {
        Self { max_cost: Conversion::COST_MAX_IMPLICIT, tie_break: TieBreak::default() }
    }
}

impl ResolvePolicy {
    pub fn with_max_cost(mut self, max_cost: u32) -> Self {
        self.max_cost = max_cost;
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }
}
