use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// --- Reference data (externally managed, read-only here) ---

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Locality {
    pub id: i32,
    pub name: String,
    pub state_id: i32,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct State {
    pub id: i32,
    pub name: String,
    pub abbreviation: String,
    pub active: bool,
}

/// A locality joined with its state, the shape the reference store
/// returns for enumeration.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LocalityRef {
    pub locality_id: i32,
    pub locality_name: String,
    pub state_id: i32,
    pub state_name: String,
    pub state_abbr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Platform {
    pub id: i32,
    pub name: String,
    pub base_url: String,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OperationType {
    pub id: i32,
    pub name: String,
}

impl OperationType {
    /// URL path segment for this operation ("VENDA" -> "venda").
    pub fn slug(&self) -> String {
        self.name.to_lowercase()
    }
}

// --- Work unit ---

/// One (locality, state, platform, operation-type) discovery unit.
/// Ephemeral: exists only for the duration of one attempt.
#[derive(Debug, Clone)]
pub struct DiscoveryTarget {
    pub locality: LocalityRef,
    pub platform: Platform,
    pub operation: OperationType,
}

impl DiscoveryTarget {
    pub fn key(&self) -> LinkKey {
        LinkKey {
            platform_id: self.platform.id,
            operation_type_id: self.operation.id,
            state_id: self.locality.state_id,
            locality_id: self.locality.locality_id,
        }
    }

    /// Deterministic listing URL from the platform template:
    /// `{base}/{operation}/{state}/{locality-slug}/`.
    pub fn default_url(&self) -> String {
        format!(
            "{}/{}/{}/{}/",
            self.platform.base_url.trim_end_matches('/'),
            self.operation.slug(),
            self.locality.state_abbr.to_lowercase(),
            crate::urls::locality_slug(&self.locality.locality_name),
        )
    }

    /// Human-readable label used in log lines.
    pub fn label(&self) -> String {
        format!(
            "{} - {} - {}/{}",
            self.platform.name,
            self.operation.name,
            self.locality.locality_name,
            self.locality.state_abbr,
        )
    }
}

impl std::fmt::Display for DiscoveryTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

// --- Persisted link ---

/// Uniqueness key for a persisted link. At most one row per key,
/// enforced by upsert logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LinkKey {
    pub platform_id: i32,
    pub operation_type_id: i32,
    pub state_id: i32,
    pub locality_id: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkStatus {
    /// A strategy found and validated the URL.
    Discovered,
    /// All strategies failed; the deterministic template URL was persisted.
    Default,
    /// Identifier resolution failed; nothing persisted.
    Error,
}

impl std::fmt::Display for LinkStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkStatus::Discovered => write!(f, "discovered"),
            LinkStatus::Default => write!(f, "default"),
            LinkStatus::Error => write!(f, "error"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct DiscoveredLink {
    pub id: i32,
    pub url: String,
    pub platform_id: i32,
    pub operation_type_id: i32,
    pub state_id: i32,
    pub locality_id: i32,
    pub district_id: Option<i32>,
    pub search_term: String,
    pub result_position: i32,
    pub status: String,
    pub processed: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl DiscoveredLink {
    /// The timestamp the freshness gate compares against.
    pub fn last_touched(&self) -> DateTime<Utc> {
        match self.updated_at {
            Some(updated) if updated > self.created_at => updated,
            _ => self.created_at,
        }
    }
}

/// Payload for a link write. IDs come from the key; the remaining
/// columns come from here.
#[derive(Debug, Clone)]
pub struct NewLink {
    pub url: String,
    pub search_term: String,
    pub result_position: i32,
    pub status: LinkStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
}

// --- Audit log ---

/// One row per orchestration attempt, success or not.
#[derive(Debug, Clone)]
pub struct NewLogEntry {
    pub engine_used: String,
    pub query_or_task: String,
    pub platform_id: i32,
    pub locality_id: i32,
    pub links_found: i32,
    pub links_saved: i32,
    pub note: Option<String>,
}

// --- Cycle statistics ---

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleStats {
    pub cycle_number: u32,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub processed: u32,
    pub succeeded: u32,
    pub skipped: u32,
    pub failed: u32,
}

impl std::fmt::Display for CycleStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let duration = self.finished_at - self.started_at;
        write!(
            f,
            "cycle #{}: {} processed, {} succeeded, {} skipped, {} failed in {}s",
            self.cycle_number,
            self.processed,
            self.succeeded,
            self.skipped,
            self.failed,
            duration.num_seconds(),
        )
    }
}

// --- Strategy results ---

/// Successful output of a discovery strategy, before normalization of
/// the persisted row.
#[derive(Debug, Clone)]
pub struct Discovery {
    pub url: String,
    pub title: String,
    pub item_count: Option<String>,
    pub search_term: String,
    pub result_position: i32,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn link(created: DateTime<Utc>, updated: Option<DateTime<Utc>>) -> DiscoveredLink {
        DiscoveredLink {
            id: 1,
            url: "https://www.vivareal.com.br/venda/pr/curitiba/".into(),
            platform_id: 1,
            operation_type_id: 1,
            state_id: 1,
            locality_id: 1,
            district_id: None,
            search_term: "venda Curitiba PR".into(),
            result_position: 1,
            status: "discovered".into(),
            processed: false,
            created_at: created,
            updated_at: updated,
        }
    }

    #[test]
    fn last_touched_prefers_newer_update() {
        let created = Utc.with_ymd_and_hms(2025, 6, 1, 12, 0, 0).unwrap();
        let updated = Utc.with_ymd_and_hms(2025, 6, 2, 12, 0, 0).unwrap();
        assert_eq!(link(created, Some(updated)).last_touched(), updated);
        assert_eq!(link(created, None).last_touched(), created);
        // A stale updated_at (backfill artifact) never wins over created_at
        let older = Utc.with_ymd_and_hms(2025, 5, 1, 12, 0, 0).unwrap();
        assert_eq!(link(created, Some(older)).last_touched(), created);
    }

    #[test]
    fn default_url_follows_platform_template() {
        let target = DiscoveryTarget {
            locality: LocalityRef {
                locality_id: 7,
                locality_name: "Araucária".into(),
                state_id: 2,
                state_name: "Paraná".into(),
                state_abbr: "PR".into(),
            },
            platform: Platform {
                id: 1,
                name: "VivaReal".into(),
                base_url: "https://www.vivareal.com.br/".into(),
                active: true,
            },
            operation: OperationType {
                id: 3,
                name: "VENDA".into(),
            },
        };
        assert_eq!(
            target.default_url(),
            "https://www.vivareal.com.br/venda/pr/araucaria/"
        );
    }
}
