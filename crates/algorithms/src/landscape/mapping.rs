//! Pillar to future-climate layer mapping

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// The future-climate layer chosen for one pillar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureAssignment {
    pub layer_id: u64,
    pub matched: bool,
    pub default: bool,
}

/// Result of looking one pillar up in the future-climate library
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PillarLookup {
    pub pillar_id: u64,
    pub name: String,
    /// Layer matched by name, if any
    pub matched_layer: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FutureMappingPlan {
    /// Pillar id to assignment
    pub assignments: BTreeMap<u64, FutureAssignment>,
    /// Assignment used for current layers that belong to no pillar
    pub unassigned: Option<FutureAssignment>,
    /// Distinct future layers referenced, in first-use order
    pub layers: Vec<u64>,
}

impl FutureMappingPlan {
    /// Whether no future layer resolved at all
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// Map pillars to future-climate layers.
///
/// A pillar with a name match gets `{matched: true}`; otherwise it gets the
/// library default as `{matched: false, default: true}`. Current layers
/// without a pillar use the default as well. Pillars that resolve to
/// nothing are left out of the plan.
pub fn resolve_future_mapping(
    lookups: &[PillarLookup],
    default_layer: Option<u64>,
    has_unassigned: bool,
) -> FutureMappingPlan {
    let mut plan = FutureMappingPlan::default();
    let default_assignment = default_layer.map(|layer_id| FutureAssignment {
        layer_id,
        matched: false,
        default: true,
    });

    for lookup in lookups {
        let assignment = match (lookup.matched_layer, default_assignment) {
            (Some(layer_id), _) => FutureAssignment {
                layer_id,
                matched: true,
                default: false,
            },
            (None, Some(default)) => {
                info!("pillar '{}' has no future-climate match, using the default layer", lookup.name);
                default
            }
            (None, None) => {
                warn!("pillar '{}' has no future-climate match and no default exists", lookup.name);
                continue;
            }
        };
        record(&mut plan.layers, assignment.layer_id);
        plan.assignments.insert(lookup.pillar_id, assignment);
    }

    if has_unassigned {
        if let Some(default) = default_assignment {
            record(&mut plan.layers, default.layer_id);
            plan.unassigned = Some(default);
        }
    }

    plan
}

fn record(layers: &mut Vec<u64>, layer_id: u64) {
    if !layers.contains(&layer_id) {
        layers.push(layer_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lookup(pillar_id: u64, name: &str, matched_layer: Option<u64>) -> PillarLookup {
        PillarLookup {
            pillar_id,
            name: name.into(),
            matched_layer,
        }
    }

    #[test]
    fn test_matches_default_and_dedup() {
        let lookups = [
            lookup(1, "Fire Resistance", Some(10)),
            lookup(2, "Biodiversity", None),
            lookup(3, "Wildfire", Some(10)),
        ];
        let plan = resolve_future_mapping(&lookups, Some(99), true);

        assert_eq!(
            plan.assignments[&1],
            FutureAssignment {
                layer_id: 10,
                matched: true,
                default: false
            }
        );
        assert_eq!(
            plan.assignments[&2],
            FutureAssignment {
                layer_id: 99,
                matched: false,
                default: true
            }
        );
        assert_eq!(plan.unassigned.map(|a| a.layer_id), Some(99));
        assert_eq!(plan.layers, vec![10, 99]);
    }

    #[test]
    fn test_no_default_leaves_pillar_out() {
        let plan = resolve_future_mapping(&[lookup(1, "Water", None)], None, true);
        assert!(plan.assignments.is_empty());
        assert!(plan.unassigned.is_none());
        assert!(plan.is_empty());
    }
}
