//! Resolving caller-supplied names into a fully referenced target.
//! Platform names tolerate variants; locality and state matching is
//! case-insensitive. Anything unresolvable is a conflict, not a crash.

use imolink_common::types::DiscoveryTarget;
use imolink_common::urls::match_platform;
use imolink_common::ImolinkError;
use imolink_store::ReferenceStore;

pub async fn resolve_target(
    reference: &dyn ReferenceStore,
    locality_name: &str,
    state_abbr: &str,
    operation_name: &str,
    platform_name: &str,
) -> Result<DiscoveryTarget, ImolinkError> {
    let localities = reference.active_localities().await?;
    let platforms = reference.active_platforms().await?;
    let operations = reference.operation_types().await?;

    let locality = localities
        .iter()
        .find(|l| {
            l.locality_name.eq_ignore_ascii_case(locality_name.trim())
                && l.state_abbr.eq_ignore_ascii_case(state_abbr.trim())
        })
        .cloned()
        .ok_or_else(|| {
            ImolinkError::PersistenceConflict(format!(
                "unknown locality '{locality_name}/{state_abbr}'"
            ))
        })?;

    let platform = match_platform(&platforms, platform_name.trim())
        .cloned()
        .ok_or_else(|| {
            ImolinkError::PersistenceConflict(format!("unknown platform '{platform_name}'"))
        })?;

    let operation = operations
        .iter()
        .find(|o| o.name.eq_ignore_ascii_case(operation_name.trim()))
        .cloned()
        .ok_or_else(|| {
            ImolinkError::PersistenceConflict(format!(
                "unknown operation type '{operation_name}'"
            ))
        })?;

    Ok(DiscoveryTarget {
        locality,
        platform,
        operation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{locality, operation, platform, MemStore};

    fn store() -> MemStore {
        MemStore::with_reference(
            vec![locality(1, "Araucária", "PR"), locality(2, "Curitiba", "PR")],
            vec![platform(1, "VIVA-REAL"), platform(2, "ZAP")],
            vec![operation(1, "VENDA"), operation(2, "ALUGUEL")],
        )
    }

    #[tokio::test]
    async fn resolves_platform_name_variant() {
        let store = store();
        let target = resolve_target(&store, "Araucária", "pr", "venda", "VivaReal")
            .await
            .unwrap();
        assert_eq!(target.platform.name, "VIVA-REAL");
        assert_eq!(target.locality.locality_id, 1);
        assert_eq!(target.operation.id, 1);
    }

    #[tokio::test]
    async fn unknown_locality_is_a_conflict() {
        let store = store();
        let err = resolve_target(&store, "Gotham", "PR", "VENDA", "ZAP")
            .await
            .unwrap_err();
        assert!(matches!(err, ImolinkError::PersistenceConflict(_)));
    }

    #[tokio::test]
    async fn reference_outage_is_not_a_conflict() {
        let store = store();
        store.fail_reads();
        let err = resolve_target(&store, "Curitiba", "PR", "VENDA", "ZAP")
            .await
            .unwrap_err();
        assert!(err.is_cycle_fatal());
    }
}
