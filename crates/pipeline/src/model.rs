//! Run, layer and pillar records exchanged with the run context

use foresight_algorithms::landscape::FutureAssignment;
use foresight_algorithms::normalization::{NormalizationBlock, Orientation};
use foresight_algorithms::rollup::{LayerWeights, WeightMethod};
use foresight_algorithms::statistics::StatisticsBlock;
use foresight_core::{PlanningArea, ReferenceGrid};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub type RunId = u64;
pub type LayerId = u64;
pub type PillarId = u64;

/// User-supplied membership settings for one layer.
///
/// `endpoints` are in raw layer units: two values for S/Z curves, four for
/// a trapezoid.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MembershipOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<Orientation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoints: Option<Vec<f64>>,
}

/// Statistics and normalization recorded on an input layer after C1
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerStatistics {
    pub original: StatisticsBlock,
    pub normalization: NormalizationBlock,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputLayer {
    pub id: LayerId,
    pub name: String,
    /// Raster store handle of the raw layer
    pub handle: String,
    #[serde(default)]
    pub favor_high: Option<bool>,
    #[serde(default)]
    pub pillar_id: Option<PillarId>,
    #[serde(default)]
    pub membership: Option<MembershipOverride>,
    #[serde(default)]
    pub statistics: Option<LayerStatistics>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pillar {
    pub id: PillarId,
    pub name: String,
}

/// Pillar id to future-climate assignment
pub type FutureMapping = BTreeMap<PillarId, FutureAssignment>;

/// Everything a stage needs to know about a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub id: RunId,
    pub planning_area: PlanningArea,
    /// Explicit grid; derived from the planning area when absent
    #[serde(default)]
    pub reference_grid: Option<ReferenceGrid>,
    #[serde(default)]
    pub created_by: String,
    pub inputs: Vec<InputLayer>,
    #[serde(default)]
    pub pillars: Vec<Pillar>,
    /// Rollup artifacts already known for this run, by pillar
    #[serde(default)]
    pub pillar_rollups: BTreeMap<PillarId, u64>,
    #[serde(default)]
    pub future_mapping_hint: Option<FutureMapping>,
}

impl RunRecord {
    pub fn input(&self, id: LayerId) -> Option<&InputLayer> {
        self.inputs.iter().find(|l| l.id == id)
    }

    pub fn pillar(&self, id: PillarId) -> Option<&Pillar> {
        self.pillars.iter().find(|p| p.id == id)
    }

    /// Inputs assigned to `pillar`, in record order
    pub fn pillar_inputs(&self, pillar: PillarId) -> impl Iterator<Item = &InputLayer> {
        self.inputs.iter().filter(move |l| l.pillar_id == Some(pillar))
    }

    /// Inputs that bypass the pillar rollup
    pub fn unassigned_inputs(&self) -> impl Iterator<Item = &InputLayer> {
        self.inputs.iter().filter(|l| l.pillar_id.is_none())
    }

    /// Pillars with at least one assigned input
    pub fn active_pillars(&self) -> impl Iterator<Item = &Pillar> {
        self.pillars
            .iter()
            .filter(|p| self.inputs.iter().any(|l| l.pillar_id == Some(p.id)))
    }
}

/// Weights persisted with a pillar rollup, keyed by input layer id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PillarWeights {
    pub weights: BTreeMap<LayerId, f64>,
    pub correlation_scores: BTreeMap<LayerId, f64>,
    pub method: WeightMethod,
}

impl PillarWeights {
    pub fn from_layer_weights(layers: &[LayerId], weights: &LayerWeights) -> Self {
        Self {
            weights: layers.iter().copied().zip(weights.weights.iter().copied()).collect(),
            correlation_scores: layers
                .iter()
                .copied()
                .zip(weights.redundancy.iter().copied())
                .collect(),
            method: weights.method,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_record_from_json() {
        let json = r#"{
            "id": 7,
            "planning_area": {"crs": 4269, "polygons": [[[[0,0],[1,0],[1,1],[0,1],[0,0]]]]},
            "inputs": [
                {"id": 1, "name": "canopy", "handle": "canopy.tif", "pillar_id": 10},
                {"id": 2, "name": "roads", "handle": "roads.tif", "favor_high": false}
            ],
            "pillars": [{"id": 10, "name": "Forest"}, {"id": 11, "name": "Water"}]
        }"#;
        let run: RunRecord = serde_json::from_str(json).unwrap();

        assert_eq!(run.pillar_inputs(10).count(), 1);
        assert_eq!(run.unassigned_inputs().map(|l| l.id).collect::<Vec<_>>(), vec![2]);
        let active: Vec<_> = run.active_pillars().map(|p| p.id).collect();
        assert_eq!(active, vec![10]);
        assert!(run.reference_grid.is_none());
        assert_eq!(run.input(2).unwrap().favor_high, Some(false));
    }

    #[test]
    fn test_pillar_weights_keyed_by_layer() {
        let lw = LayerWeights {
            weights: vec![0.25, 0.75],
            redundancy: vec![0.5, 0.1],
            method: WeightMethod::Optimized,
        };
        let pw = PillarWeights::from_layer_weights(&[4, 9], &lw);
        assert_eq!(pw.weights[&9], 0.75);
        assert_eq!(pw.correlation_scores[&4], 0.5);
    }
}
