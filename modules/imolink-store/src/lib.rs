//! Postgres persistence for discovery: reference data reads, the
//! discovered-links table, the per-attempt audit log, and cycle
//! summaries.

pub mod pg;
pub mod traits;

pub use pg::{CoverageReport, LinkView, PgStore, StatusSummary};
pub use traits::{LinkStore, ReferenceStore};
