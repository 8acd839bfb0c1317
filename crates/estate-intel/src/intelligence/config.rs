//! Tenant-scoped intelligence configuration.
//!
//! Hard-coded defaults merged, key by key, with a per-tenant override blob
//! from the module-configuration store. Resolution happens fresh on every
//! orchestrator call; there is deliberately no cache, so a tenant sees its
//! own config writes immediately.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{DealStage, TenantId};
use super::numeric::{DisciplineWeights, LeadScoreWeights};
use super::repository::{ModuleConfigStore, RepositoryError};

/// Module key under which tenant overrides are stored.
pub const MODULE_KEY: &str = "intelligence";

/// Score thresholds separating hot/warm/cold tiers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierThresholds {
    pub hot: f64,
    pub warm: f64,
}

impl Default for TierThresholds {
    fn default() -> Self {
        Self {
            hot: 80.0,
            warm: 60.0,
        }
    }
}

/// Numeric targets the aggregators normalize raw counts against.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringTargets {
    /// Decayed engagement sum corresponding to a 100 engagement score.
    pub engagement_target: f64,
    /// Calls within the trailing 14 days corresponding to a full follow-up score.
    pub follow_up_target: f64,
    /// Monthly follow-up touches (calls + tasks) for a full discipline score.
    pub monthly_follow_up_target: f64,
    /// Completed tasks per month for a full task-completion score.
    pub task_completion_target: f64,
    /// Leads must be touched within this many days to count as hygienic.
    pub hygiene_window_days: i64,
    /// First-touch latency that earns a full data-entry score.
    pub data_entry_target_hours: f64,
    /// First-touch latency beyond which the data-entry score reaches zero.
    pub data_entry_max_hours: f64,
}

impl Default for ScoringTargets {
    fn default() -> Self {
        Self {
            engagement_target: 100.0,
            follow_up_target: 6.0,
            monthly_follow_up_target: 20.0,
            task_completion_target: 10.0,
            hygiene_window_days: 7,
            data_entry_target_hours: 24.0,
            data_entry_max_hours: 72.0,
        }
    }
}

/// Per-stage base win probabilities, in `[0, 100]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageBaseProbabilities {
    pub prospecting: f64,
    pub qualification: f64,
    pub proposal: f64,
    pub negotiation: f64,
    pub contract: f64,
    pub won: f64,
    pub lost: f64,
}

impl Default for StageBaseProbabilities {
    fn default() -> Self {
        Self {
            prospecting: 10.0,
            qualification: 25.0,
            proposal: 40.0,
            negotiation: 60.0,
            contract: 80.0,
            won: 100.0,
            lost: 0.0,
        }
    }
}

impl StageBaseProbabilities {
    pub fn for_stage(&self, stage: DealStage) -> f64 {
        match stage {
            DealStage::Prospecting => self.prospecting,
            DealStage::Qualification => self.qualification,
            DealStage::Proposal => self.proposal,
            DealStage::Negotiation => self.negotiation,
            DealStage::Contract => self.contract,
            DealStage::Won => self.won,
            DealStage::Lost => self.lost,
        }
    }
}

/// Lookup tables for the demographic aggregator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassificationTables {
    pub target_property_types: Vec<String>,
    pub target_locations: Vec<String>,
    pub company_size_scores: BTreeMap<String, f64>,
    pub industry_scores: BTreeMap<String, f64>,
}

impl Default for ClassificationTables {
    fn default() -> Self {
        let company_size_scores = BTreeMap::from([
            ("startup".to_string(), 50.0),
            ("smb".to_string(), 60.0),
            ("mid_market".to_string(), 70.0),
            ("enterprise".to_string(), 85.0),
        ]);
        let industry_scores = BTreeMap::from([
            ("real_estate".to_string(), 80.0),
            ("construction".to_string(), 70.0),
            ("finance".to_string(), 75.0),
            ("technology".to_string(), 65.0),
            ("retail".to_string(), 55.0),
        ]);

        Self {
            target_property_types: vec![
                "apartment".to_string(),
                "villa".to_string(),
                "commercial".to_string(),
            ],
            target_locations: vec![
                "downtown".to_string(),
                "new_cairo".to_string(),
                "sheikh_zayed".to_string(),
            ],
            company_size_scores,
            industry_scores,
        }
    }
}

fn default_engagement_weights() -> BTreeMap<String, f64> {
    BTreeMap::from([
        ("call".to_string(), 8.0),
        ("email_open".to_string(), 2.0),
        ("email_reply".to_string(), 6.0),
        ("whatsapp_reply".to_string(), 10.0),
        ("form_submission".to_string(), 12.0),
        ("meeting_attended".to_string(), 15.0),
        ("property_view".to_string(), 5.0),
        ("site_visit".to_string(), 20.0),
    ])
}

/// Fully resolved configuration used for one scoring computation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntelligenceConfig {
    pub lead_score_weights: LeadScoreWeights,
    pub discipline_weights: DisciplineWeights,
    pub engagement_weights: BTreeMap<String, f64>,
    pub thresholds: TierThresholds,
    pub targets: ScoringTargets,
    pub stage_probabilities: StageBaseProbabilities,
    pub classification: ClassificationTables,
}

impl Default for IntelligenceConfig {
    fn default() -> Self {
        Self {
            lead_score_weights: LeadScoreWeights::default(),
            discipline_weights: DisciplineWeights::default(),
            engagement_weights: default_engagement_weights(),
            thresholds: TierThresholds::default(),
            targets: ScoringTargets::default(),
            stage_probabilities: StageBaseProbabilities::default(),
            classification: ClassificationTables::default(),
        }
    }
}

/// Partial override blob a tenant may store for the `intelligence` module.
///
/// Weight maps merge key by key: overriding a single engagement event weight
/// keeps the defaults for every other event.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntelligenceOverrides {
    pub lead_score_weights: Option<LeadWeightOverrides>,
    pub discipline_weights: Option<DisciplineWeightOverrides>,
    pub engagement_weights: Option<BTreeMap<String, f64>>,
    pub thresholds: Option<ThresholdOverrides>,
    pub targets: Option<TargetOverrides>,
    pub stage_probabilities: Option<StageProbabilityOverrides>,
    pub classification: Option<ClassificationOverrides>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LeadWeightOverrides {
    pub demographic: Option<f64>,
    pub engagement: Option<f64>,
    pub behavioral: Option<f64>,
    pub historical: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DisciplineWeightOverrides {
    pub follow_up: Option<f64>,
    pub meeting_adherence: Option<f64>,
    pub task_completion: Option<f64>,
    pub data_entry: Option<f64>,
    pub pipeline_hygiene: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ThresholdOverrides {
    pub hot: Option<f64>,
    pub warm: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TargetOverrides {
    pub engagement_target: Option<f64>,
    pub follow_up_target: Option<f64>,
    pub monthly_follow_up_target: Option<f64>,
    pub task_completion_target: Option<f64>,
    pub hygiene_window_days: Option<i64>,
    pub data_entry_target_hours: Option<f64>,
    pub data_entry_max_hours: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StageProbabilityOverrides {
    pub prospecting: Option<f64>,
    pub qualification: Option<f64>,
    pub proposal: Option<f64>,
    pub negotiation: Option<f64>,
    pub contract: Option<f64>,
    pub won: Option<f64>,
    pub lost: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassificationOverrides {
    pub target_property_types: Option<Vec<String>>,
    pub target_locations: Option<Vec<String>>,
    pub company_size_scores: Option<BTreeMap<String, f64>>,
    pub industry_scores: Option<BTreeMap<String, f64>>,
}

impl IntelligenceConfig {
    /// Merge a tenant override blob over the defaults.
    pub fn merged(overrides: IntelligenceOverrides) -> Self {
        let mut config = Self::default();

        if let Some(weights) = overrides.lead_score_weights {
            let base = &mut config.lead_score_weights;
            base.demographic = weights.demographic.unwrap_or(base.demographic);
            base.engagement = weights.engagement.unwrap_or(base.engagement);
            base.behavioral = weights.behavioral.unwrap_or(base.behavioral);
            base.historical = weights.historical.unwrap_or(base.historical);
        }

        if let Some(weights) = overrides.discipline_weights {
            let base = &mut config.discipline_weights;
            base.follow_up = weights.follow_up.unwrap_or(base.follow_up);
            base.meeting_adherence = weights.meeting_adherence.unwrap_or(base.meeting_adherence);
            base.task_completion = weights.task_completion.unwrap_or(base.task_completion);
            base.data_entry = weights.data_entry.unwrap_or(base.data_entry);
            base.pipeline_hygiene = weights.pipeline_hygiene.unwrap_or(base.pipeline_hygiene);
        }

        if let Some(weights) = overrides.engagement_weights {
            // Key-by-key merge; untouched event weights keep their defaults.
            for (event, weight) in weights {
                config.engagement_weights.insert(event, weight);
            }
        }

        if let Some(thresholds) = overrides.thresholds {
            config.thresholds.hot = thresholds.hot.unwrap_or(config.thresholds.hot);
            config.thresholds.warm = thresholds.warm.unwrap_or(config.thresholds.warm);
        }

        if let Some(targets) = overrides.targets {
            let base = &mut config.targets;
            base.engagement_target = targets.engagement_target.unwrap_or(base.engagement_target);
            base.follow_up_target = targets.follow_up_target.unwrap_or(base.follow_up_target);
            base.monthly_follow_up_target = targets
                .monthly_follow_up_target
                .unwrap_or(base.monthly_follow_up_target);
            base.task_completion_target = targets
                .task_completion_target
                .unwrap_or(base.task_completion_target);
            base.hygiene_window_days = targets
                .hygiene_window_days
                .unwrap_or(base.hygiene_window_days);
            base.data_entry_target_hours = targets
                .data_entry_target_hours
                .unwrap_or(base.data_entry_target_hours);
            base.data_entry_max_hours = targets
                .data_entry_max_hours
                .unwrap_or(base.data_entry_max_hours);
        }

        if let Some(stages) = overrides.stage_probabilities {
            let base = &mut config.stage_probabilities;
            base.prospecting = stages.prospecting.unwrap_or(base.prospecting);
            base.qualification = stages.qualification.unwrap_or(base.qualification);
            base.proposal = stages.proposal.unwrap_or(base.proposal);
            base.negotiation = stages.negotiation.unwrap_or(base.negotiation);
            base.contract = stages.contract.unwrap_or(base.contract);
            base.won = stages.won.unwrap_or(base.won);
            base.lost = stages.lost.unwrap_or(base.lost);
        }

        if let Some(classification) = overrides.classification {
            let base = &mut config.classification;
            if let Some(types) = classification.target_property_types {
                base.target_property_types = types;
            }
            if let Some(locations) = classification.target_locations {
                base.target_locations = locations;
            }
            if let Some(scores) = classification.company_size_scores {
                for (key, value) in scores {
                    base.company_size_scores.insert(key, value);
                }
            }
            if let Some(scores) = classification.industry_scores {
                for (key, value) in scores {
                    base.industry_scores.insert(key, value);
                }
            }
        }

        config
    }
}

/// Resolve the effective configuration for one tenant.
///
/// An unparseable override blob degrades to the defaults with a warning; a
/// broken tenant config must never take scoring offline.
pub fn resolve_config(
    store: &dyn ModuleConfigStore,
    tenant: &TenantId,
) -> Result<IntelligenceConfig, RepositoryError> {
    let blob = store.get_config(tenant, MODULE_KEY)?;

    let overrides = match blob {
        None => IntelligenceOverrides::default(),
        Some(value) => match serde_json::from_value::<IntelligenceOverrides>(value) {
            Ok(overrides) => overrides,
            Err(err) => {
                warn!(tenant = %tenant.0, %err, "invalid intelligence config override, using defaults");
                IntelligenceOverrides::default()
            }
        },
    };

    Ok(IntelligenceConfig::merged(overrides))
}
