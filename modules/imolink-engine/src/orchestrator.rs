//! The per-cycle driver. One logical worker walks the enumerated target
//! sequence strictly sequentially; throughput is capped on purpose via
//! the inter-target pauses, since parallel requests against the same
//! platform or search engine invite blocks and CAPTCHAs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use tracing::{error, info, warn};

use imolink_common::types::{CycleStats, DiscoveryTarget};
use imolink_common::{ImolinkError, Tuning};
use imolink_store::{LinkStore, ReferenceStore};

use crate::enumerate::enumerate_targets;
use crate::freshness;
use crate::persist::Persister;
use crate::strategies::DiscoveryStrategy;

/// Terminal state of one target. SKIPPED comes from the freshness gate;
/// DEFAULTED is a failed discovery with the template URL persisted;
/// FAILED persisted nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TargetOutcome {
    Skipped,
    Discovered { url: String, engine: String },
    Defaulted { url: String },
    Failed(String),
}

pub struct Orchestrator {
    reference: Arc<dyn ReferenceStore>,
    links: Arc<dyn LinkStore>,
    strategies: Vec<Arc<dyn DiscoveryStrategy>>,
    persister: Persister,
    tuning: Tuning,
    shutdown: Arc<AtomicBool>,
}

impl Orchestrator {
    pub fn new(
        reference: Arc<dyn ReferenceStore>,
        links: Arc<dyn LinkStore>,
        strategies: Vec<Arc<dyn DiscoveryStrategy>>,
        tuning: Tuning,
        shutdown: Arc<AtomicBool>,
    ) -> Self {
        let persister = Persister::new(links.clone());
        Self {
            reference,
            links,
            strategies,
            persister,
            tuning,
            shutdown,
        }
    }

    /// Run one target through the gate, the strategy chain, and the
    /// persister. Only cycle-fatal store errors propagate; everything
    /// else resolves to a terminal [`TargetOutcome`].
    pub async fn process_target(
        &self,
        target: &DiscoveryTarget,
    ) -> Result<TargetOutcome, ImolinkError> {
        if freshness::should_skip(
            self.links.as_ref(),
            target,
            self.tuning.freshness_ttl,
            Utc::now(),
        )
        .await
        {
            info!(target = %target, "Fresh link exists, skipping");
            return Ok(TargetOutcome::Skipped);
        }

        for strategy in &self.strategies {
            match strategy.discover(target).await {
                Ok(discovery) => {
                    return match self
                        .persister
                        .persist_discovery(target, &discovery, strategy.name())
                        .await
                    {
                        Ok(_) => Ok(TargetOutcome::Discovered {
                            url: discovery.url,
                            engine: strategy.name().to_string(),
                        }),
                        Err(err) if err.is_cycle_fatal() => Err(err),
                        Err(err) => {
                            warn!(target = %target, error = %err, "Persist failed");
                            Ok(TargetOutcome::Failed(err.to_string()))
                        }
                    };
                }
                Err(failure) => {
                    warn!(
                        target = %target,
                        strategy = strategy.name(),
                        %failure,
                        "Strategy failed, trying next"
                    );
                }
            }
        }

        match self.persister.persist_default(target).await {
            Ok(url) => Ok(TargetOutcome::Defaulted { url }),
            Err(err) if err.is_cycle_fatal() => Err(err),
            Err(err) => {
                warn!(target = %target, error = %err, "Default persist failed");
                Ok(TargetOutcome::Failed(err.to_string()))
            }
        }
    }

    /// One full enumeration pass. Returns the cycle statistics, or the
    /// cycle-fatal error for the outer loop to cool down on.
    pub async fn run_cycle(&self, cycle_number: u32) -> Result<CycleStats, ImolinkError> {
        let started_at = Utc::now();

        let localities = self
            .reference
            .active_localities()
            .await
            .map_err(|e| ImolinkError::ReferenceDataUnavailable(e.to_string()))?;
        let platforms = self
            .reference
            .active_platforms()
            .await
            .map_err(|e| ImolinkError::ReferenceDataUnavailable(e.to_string()))?;
        let operations = self
            .reference
            .operation_types()
            .await
            .map_err(|e| ImolinkError::ReferenceDataUnavailable(e.to_string()))?;

        let targets = enumerate_targets(
            &localities,
            &platforms,
            &operations,
            self.tuning.max_localities_per_cycle,
        );
        info!(cycle_number, targets = targets.len(), "Cycle enumerated");

        let mut processed = 0u32;
        let mut succeeded = 0u32;
        let mut skipped = 0u32;
        let mut failed = 0u32;
        let mut prev_locality: Option<i32> = None;
        // Pauses only follow targets that actually hit the network; a
        // run of freshness skips walks through at full speed.
        let mut prev_did_work = false;

        for target in &targets {
            if self.shutdown.load(Ordering::SeqCst) {
                info!("Shutdown requested, ending cycle after current target");
                break;
            }

            if prev_did_work {
                if prev_locality != Some(target.locality.locality_id) {
                    tokio::time::sleep(self.tuning.locality_pause).await;
                } else {
                    self.inter_target_pause().await;
                }
            }
            prev_locality = Some(target.locality.locality_id);

            processed += 1;
            prev_did_work = true;
            match self.process_target(target).await {
                Ok(TargetOutcome::Skipped) => {
                    skipped += 1;
                    prev_did_work = false;
                }
                Ok(TargetOutcome::Discovered { url, engine }) => {
                    info!(target = %target, url, engine, "Target succeeded");
                    succeeded += 1;
                }
                Ok(TargetOutcome::Defaulted { url }) => {
                    warn!(target = %target, url, "All strategies failed, default persisted");
                    failed += 1;
                }
                Ok(TargetOutcome::Failed(reason)) => {
                    error!(target = %target, reason, "Target failed without a link");
                    failed += 1;
                }
                Err(fatal) => {
                    error!(target = %target, error = %fatal, "Cycle aborted");
                    return Err(fatal);
                }
            }
        }

        let stats = CycleStats {
            cycle_number,
            started_at,
            finished_at: Utc::now(),
            processed,
            succeeded,
            skipped,
            failed,
        };
        if let Err(err) = self.links.record_cycle(&stats).await {
            warn!(error = %err, "Cycle stats not recorded");
        }
        Ok(stats)
    }

    async fn inter_target_pause(&self) {
        let pause = {
            let mut rng = rand::rng();
            rng.random_range(self.tuning.inter_target_min..=self.tuning.inter_target_max)
        };
        tokio::time::sleep(pause).await;
    }
}
