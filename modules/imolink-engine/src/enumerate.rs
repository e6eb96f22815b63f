//! Target enumeration: the ordered cartesian product of active reference
//! data. Locality-major so reruns walk the set in a stable, comparable
//! order and the per-locality pause has a natural boundary.

use imolink_common::types::{DiscoveryTarget, LocalityRef, OperationType, Platform};

/// Enumerate discovery targets: for each locality (capped when
/// `max_localities > 0`), every platform, every operation type. Empty
/// reference sets yield an empty vec.
pub fn enumerate_targets(
    localities: &[LocalityRef],
    platforms: &[Platform],
    operations: &[OperationType],
    max_localities: usize,
) -> Vec<DiscoveryTarget> {
    let localities = if max_localities > 0 && localities.len() > max_localities {
        &localities[..max_localities]
    } else {
        localities
    };

    let mut targets = Vec::with_capacity(localities.len() * platforms.len() * operations.len());
    for locality in localities {
        for platform in platforms {
            for operation in operations {
                targets.push(DiscoveryTarget {
                    locality: locality.clone(),
                    platform: platform.clone(),
                    operation: operation.clone(),
                });
            }
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{locality, operation, platform};

    #[test]
    fn locality_major_order() {
        let localities = vec![locality(1, "Curitiba", "PR"), locality(2, "Araucária", "PR")];
        let platforms = vec![platform(1, "VivaReal"), platform(2, "ZAP")];
        let operations = vec![operation(1, "VENDA"), operation(2, "ALUGUEL")];

        let targets = enumerate_targets(&localities, &platforms, &operations, 0);
        assert_eq!(targets.len(), 8);

        let first_four: Vec<_> = targets[..4]
            .iter()
            .map(|t| (t.locality.locality_id, t.platform.id, t.operation.id))
            .collect();
        assert_eq!(first_four, vec![(1, 1, 1), (1, 1, 2), (1, 2, 1), (1, 2, 2)]);
        assert!(targets[4..].iter().all(|t| t.locality.locality_id == 2));
    }

    #[test]
    fn empty_reference_set_enumerates_nothing() {
        let localities = vec![locality(1, "Curitiba", "PR")];
        assert!(enumerate_targets(&localities, &[], &[operation(1, "VENDA")], 0).is_empty());
        assert!(enumerate_targets(&[], &[platform(1, "ZAP")], &[operation(1, "VENDA")], 0).is_empty());
    }

    #[test]
    fn locality_cap_limits_the_cycle() {
        let localities = vec![
            locality(1, "Curitiba", "PR"),
            locality(2, "Araucária", "PR"),
            locality(3, "Pinhais", "PR"),
        ];
        let platforms = vec![platform(1, "VivaReal")];
        let operations = vec![operation(1, "VENDA")];

        let targets = enumerate_targets(&localities, &platforms, &operations, 2);
        assert_eq!(targets.len(), 2);
        assert!(targets.iter().all(|t| t.locality.locality_id < 3));
    }
}
