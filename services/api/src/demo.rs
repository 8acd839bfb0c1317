//! Console walkthrough of every engine computation over a seeded tenant.

use std::sync::Arc;

use clap::Args;

use estate_intel::error::AppError;
use estate_intel::intelligence::forecast::RevenueForecast;
use estate_intel::intelligence::{
    DealStage, IntelligenceService, PerformanceEntry, ReminderEngine, ReminderPriority, TenantId,
};

use crate::infra::{
    seed_demo_data, ConsoleNotificationSender, InMemoryCrmStore, InMemoryModuleConfig,
    InMemorySnapshotStore, TracingAuditSink,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Tenant identifier for the seeded dataset.
    #[arg(long, default_value = "demo-tenant")]
    pub(crate) tenant: String,
    /// Include generated call scripts in the output.
    #[arg(long)]
    pub(crate) include_scripts: bool,
}

#[derive(Args, Debug)]
pub(crate) struct SweepArgs {
    /// Tenant identifier for the seeded dataset.
    #[arg(long, default_value = "demo-tenant")]
    pub(crate) tenant: String,
}

type DemoService = IntelligenceService<
    InMemoryCrmStore,
    InMemorySnapshotStore,
    InMemoryModuleConfig,
    TracingAuditSink,
>;

fn seeded_service(tenant: &TenantId) -> (Arc<DemoService>, Arc<InMemoryCrmStore>) {
    let crm = Arc::new(InMemoryCrmStore::default());
    seed_demo_data(&crm, tenant);
    let service = Arc::new(IntelligenceService::new(
        crm.clone(),
        Arc::new(InMemorySnapshotStore::default()),
        Arc::new(InMemoryModuleConfig::default()),
        Arc::new(TracingAuditSink),
    ));
    (service, crm)
}

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let tenant = TenantId(args.tenant.clone());
    let (service, crm) = seeded_service(&tenant);

    println!("Intelligence engine demo for tenant '{}'", tenant.0);

    println!("\nLead scores:");
    for lead in crm.lead_ids() {
        let snapshot = service.score_lead(&tenant, &lead)?;
        println!(
            "- {}: {:.1} ({}) | demographic {:.0}, engagement {:.0}, behavioral {:.0}, historical {:.0}",
            lead.0,
            snapshot.score,
            snapshot.tier.label(),
            snapshot.reasons.factors.demographic,
            snapshot.reasons.factors.engagement,
            snapshot.reasons.factors.behavioral,
            snapshot.reasons.factors.historical,
        );
    }

    println!("\nDiscipline indexes (trailing 30 days):");
    for user in crm.user_ids() {
        let snapshot = service.compute_discipline_index(&tenant, &user)?;
        println!(
            "- {}: {:.1} | follow-up {:.0}, meetings {:.0}, tasks {:.0}, data entry {:.0}, hygiene {:.0}",
            user.0,
            snapshot.score,
            snapshot.factors.follow_up,
            snapshot.factors.meeting_adherence,
            snapshot.factors.task_completion,
            snapshot.factors.data_entry,
            snapshot.factors.pipeline_hygiene,
        );
    }

    println!("\nDeal probabilities:");
    for deal in crm.open_deal_ids() {
        let outcome = service.compute_deal_probability(&tenant, &deal)?;
        println!(
            "- {}: {:.1}% win probability | 95% bounds [{:.1}, {:.1}] over {} closed peers",
            deal.0,
            outcome.probability,
            outcome.confidence_low,
            outcome.confidence_high,
            outcome.risk_score.factors.sample_size,
        );
    }

    let forecast_snapshot = service.compute_revenue_forecast(&tenant)?;
    if let Ok(forecast) =
        serde_json::from_value::<RevenueForecast>(forecast_snapshot.payload.clone())
    {
        println!(
            "\nRevenue forecast ({} open deals):",
            forecast.open_deals
        );
        for (month, bucket) in &forecast.monthly {
            println!(
                "- {month}: expected {:.0}, probability-weighted {:.0} ({} deals)",
                bucket.expected, bucket.weighted, bucket.deals
            );
        }
    }

    let reminders = service.compute_reminder_priorities(&tenant, None)?;
    if let Ok(items) =
        serde_json::from_value::<Vec<ReminderPriority>>(reminders.payload["items"].clone())
    {
        println!("\nReminder priorities:");
        for item in items.iter().take(5) {
            println!(
                "- {} (due {}): priority {:.1} | urgency {:.0}, impact {:.0}",
                item.title,
                item.due_at.format("%Y-%m-%d %H:%M"),
                item.priority,
                item.urgency,
                item.impact,
            );
        }
    }

    let ranking = service.compute_performance_ranking(&tenant)?;
    if let Ok(entries) =
        serde_json::from_value::<Vec<PerformanceEntry>>(ranking.payload["entries"].clone())
    {
        println!("\nPerformance ranking:");
        for (position, entry) in entries.iter().enumerate() {
            println!(
                "{}. {} ({:.1}) | revenue {:.0}, pipeline {:.0}, activity {}",
                position + 1,
                entry.name,
                entry.score,
                entry.revenue,
                entry.pipeline_value,
                entry.activity_count,
            );
        }
    }

    if args.include_scripts {
        let leads = crm.lead_ids();
        if let Some(lead) = leads.first() {
            let snapshot =
                service.generate_scripts(&tenant, lead, Some(DealStage::Negotiation))?;
            println!("\nCall scripts for {}:", lead.0);
            if let Some(scripts) = snapshot.payload["scripts"].as_array() {
                for script in scripts {
                    println!(
                        "- [{}] {}",
                        script["title"].as_str().unwrap_or("script"),
                        script["body"].as_str().unwrap_or(""),
                    );
                }
            }
        }
    }

    Ok(())
}

pub(crate) fn run_sweep(args: SweepArgs) -> Result<(), AppError> {
    let tenant = TenantId(args.tenant.clone());
    let crm = Arc::new(InMemoryCrmStore::default());
    seed_demo_data(&crm, &tenant);

    let engine = ReminderEngine::new(
        crm,
        Arc::new(ConsoleNotificationSender::default()),
        Arc::new(TracingAuditSink),
    );

    let summary = engine
        .run_reminder_sweep(&tenant)
        .map_err(estate_intel::intelligence::IntelligenceError::from)?;

    println!(
        "Sweep finished: {} reminders, {} warnings, {} deduplicated, {} delivery failures",
        summary.reminders_sent,
        summary.warnings_sent,
        summary.deduplicated,
        summary.delivery_failures,
    );

    Ok(())
}
