//! Revenue forecast builder.
//!
//! A walk-forward projection over the open pipeline: per-stage win rates and
//! cycle times are measured from closed deals, open deals are projected to
//! an expected close month, and expected/probability-weighted revenue is
//! bucketed by month, quarter, and year. This is deliberately not a trained
//! model; seasonality is a simple month-over-month ratio against the
//! historical monthly average.

use std::collections::BTreeMap;

use chrono::{Datelike, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use super::domain::{DealStatus, TenantId};
use super::repository::{AuditSink, CrmRepository, ModuleConfigStore, SnapshotRepository};
use super::scoring::{IntelligenceError, IntelligenceService};
use super::snapshot::{RankingKind, RankingSnapshot};

/// Cycle time assumed for stages with no closed history.
const DEFAULT_CYCLE_HOURS: f64 = 720.0;

/// Empirical statistics for one pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct StageStats {
    pub closed: u64,
    pub won: u64,
    pub avg_value: f64,
    pub avg_cycle_hours: f64,
    pub win_rate: f64,
}

/// Expected and probability-weighted revenue for one bucket.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct ForecastBucket {
    pub expected: f64,
    pub weighted: f64,
    pub deals: u64,
}

/// Full forecast payload persisted inside the ranking snapshot.
///
/// Carries no timestamps so repeated runs over unchanged data serialize to
/// identical payloads.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RevenueForecast {
    pub monthly: BTreeMap<String, ForecastBucket>,
    pub quarterly: BTreeMap<String, ForecastBucket>,
    pub annual: BTreeMap<String, ForecastBucket>,
    pub stage_stats: BTreeMap<String, StageStats>,
    pub seasonality: BTreeMap<u32, f64>,
    pub open_deals: u64,
}

impl<R, S, C, A> IntelligenceService<R, S, C, A>
where
    R: CrmRepository + 'static,
    S: SnapshotRepository + 'static,
    C: ModuleConfigStore + 'static,
    A: AuditSink + 'static,
{
    /// Build the tenant revenue forecast and append a `revenue_forecast`
    /// ranking snapshot.
    pub fn compute_revenue_forecast(
        &self,
        tenant: &TenantId,
    ) -> Result<RankingSnapshot, IntelligenceError> {
        let now = Utc::now();
        let config = self.resolve_config(tenant)?;
        let deals = self.crm.deals(tenant)?;

        let closed: Vec<_> = deals
            .iter()
            .filter(|deal| deal.closed_at.is_some())
            .collect();

        // Per-stage empirical stats from closed deals.
        let mut stage_stats: BTreeMap<String, StageStats> = BTreeMap::new();
        let mut cycle_hours: BTreeMap<String, (f64, u64)> = BTreeMap::new();
        for deal in &closed {
            let key = deal.stage.label().to_string();
            let stats = stage_stats.entry(key.clone()).or_default();
            stats.closed += 1;
            stats.avg_value += deal.value;
            if deal.status == DealStatus::Won {
                stats.won += 1;
            }
            if let Some(closed_at) = deal.closed_at {
                let hours = (closed_at - deal.opened_at).num_seconds() as f64 / 3600.0;
                let entry = cycle_hours.entry(key).or_default();
                entry.0 += hours;
                entry.1 += 1;
            }
        }
        for (key, stats) in stage_stats.iter_mut() {
            if stats.closed > 0 {
                stats.avg_value /= stats.closed as f64;
                stats.win_rate = stats.won as f64 / stats.closed as f64;
            }
            if let Some((total, samples)) = cycle_hours.get(key) {
                if *samples > 0 {
                    stats.avg_cycle_hours = total / *samples as f64;
                }
            }
        }

        // Month-over-month seasonality from won revenue.
        let mut month_totals: BTreeMap<u32, f64> = BTreeMap::new();
        for deal in &closed {
            if deal.status != DealStatus::Won {
                continue;
            }
            if let Some(closed_at) = deal.closed_at {
                *month_totals.entry(closed_at.month()).or_default() += deal.value;
            }
        }
        let monthly_average = if month_totals.is_empty() {
            0.0
        } else {
            month_totals.values().sum::<f64>() / month_totals.len() as f64
        };
        let seasonality: BTreeMap<u32, f64> = (1..=12)
            .map(|month| {
                let index = match month_totals.get(&month) {
                    Some(total) if monthly_average > 0.0 => total / monthly_average,
                    _ => 1.0,
                };
                (month, index)
            })
            .collect();

        // Walk each open deal forward to its expected close month.
        let mut forecast = RevenueForecast {
            seasonality: seasonality.clone(),
            stage_stats: stage_stats.clone(),
            ..RevenueForecast::default()
        };

        for deal in deals.iter().filter(|deal| deal.status == DealStatus::Open) {
            forecast.open_deals += 1;

            let stage_key = deal.stage.label();
            let stats = stage_stats.get(stage_key);

            let cycle = stats
                .filter(|stats| stats.avg_cycle_hours > 0.0)
                .map(|stats| stats.avg_cycle_hours)
                .unwrap_or(DEFAULT_CYCLE_HOURS);
            let win_rate = stats
                .filter(|stats| stats.closed > 0)
                .map(|stats| stats.win_rate)
                .unwrap_or_else(|| config.stage_probabilities.for_stage(deal.stage) / 100.0);

            let mut projected = deal.opened_at + Duration::hours(cycle.round() as i64);
            if projected < now {
                // Overdue against its cohort; assume it closes this month.
                projected = now;
            }

            let month = projected.month();
            let season = seasonality.get(&month).copied().unwrap_or(1.0);
            let weighted = deal.value * win_rate * season;

            let month_key = format!("{:04}-{:02}", projected.year(), month);
            let quarter_key = format!("{:04}-Q{}", projected.year(), (month - 1) / 3 + 1);
            let year_key = format!("{:04}", projected.year());

            for (bucket_map, key) in [
                (&mut forecast.monthly, month_key),
                (&mut forecast.quarterly, quarter_key),
                (&mut forecast.annual, year_key),
            ] {
                let bucket = bucket_map.entry(key).or_default();
                bucket.expected += deal.value;
                bucket.weighted += weighted;
                bucket.deals += 1;
            }
        }

        let payload = serde_json::to_value(&forecast).unwrap_or_else(|err| {
            warn!(%err, "forecast payload serialization failed");
            json!({})
        });

        let snapshot = RankingSnapshot {
            tenant: tenant.clone(),
            snapshot_date: now.date_naive(),
            kind: RankingKind::RevenueForecast,
            payload,
            created_at: now,
        };
        let stored = self.snapshots.append_ranking(snapshot)?;

        self.emit_audit(
            tenant,
            "revenue_forecasted",
            "tenant",
            None,
            json!({ "open_deals": forecast.open_deals }),
        );

        Ok(stored)
    }
}
