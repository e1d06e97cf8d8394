//! Bridge configuration.

use crossbind_resolver::{ResolvePolicy, TieBreak};

/// Depth of nested callback crossings allowed by default.
pub const DEFAULT_MAX_CALLBACK_DEPTH: usize = 64;

/// The lowest callback depth accepted: four nested levels plus the outer call.
pub const MIN_CALLBACK_DEPTH: usize = 4;

/// Runtime settings fixed when a [`Context`](crate::Context) is sealed.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub resolve: ResolvePolicy,
    /// Maximum nesting of callback crossings before `RecursionLimit`.
    pub max_callback_depth: usize,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self { resolve: ResolvePolicy::default(), max_callback_depth: DEFAULT_MAX_CALLBACK_DEPTH }
    }
}

impl BridgeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_resolve_policy(mut self, resolve: ResolvePolicy) -> Self {
        self.resolve = resolve;
        self
    }

    pub fn with_max_cost(mut self, max_cost: u32) -> Self {
        self.resolve = self.resolve.with_max_cost(max_cost);
        self
    }

    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.resolve = self.resolve.with_tie_break(tie_break);
        self
    }

    /// Values below [`MIN_CALLBACK_DEPTH`] are raised to it.
    pub fn with_max_callback_depth(mut self, depth: usize) -> Self {
        self.max_callback_depth = depth.max(MIN_CALLBACK_DEPTH);
        self
    }
}
