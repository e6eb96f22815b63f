//! Discovery orchestration engine: enumerates (locality, platform,
//! operation) targets, gates them on freshness, runs an ordered chain of
//! discovery strategies, and persists the winning canonical listing URL.

pub mod enumerate;
pub mod freshness;
pub mod matchers;
pub mod orchestrator;
pub mod persist;
pub mod rate_limit;
pub mod resolve;
pub mod selectors;
pub mod strategies;
pub mod traits;

#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use orchestrator::{Orchestrator, TargetOutcome};
pub use strategies::{DiscoveryStrategy, StrategyFailure};
