//! Overload resolution.
//!
//! Selects the best candidate of an [`OverloadGroup`] for a list of dynamic
//! arguments and converts them for the native call.

mod group;
mod policy;
mod ranking;
mod resolver;

pub use group::{OverloadGroup, OverloadGroupBuilder};
pub use policy::{ResolvePolicy, TieBreak};
pub use ranking::{OverloadMatch, Ranked, find_best_match, sort_matches};
pub use resolver::{OverloadResolver, Resolution};
