//! Reminder and escalation sweep.
//!
//! Scans leads and open tasks for imminent follow-ups and sends
//! notifications through the delivery collaborator. Reminders that were
//! already sent inside the dedup window are skipped, so repeated sweeps stay
//! quiet. Delivery failures are logged and do not abort the sweep.

use std::sync::Arc;

use chrono::{Duration, Utc};
use serde_json::json;
use tracing::{debug, warn};

use super::domain::TenantId;
use super::repository::{
    AuditEntry, AuditSink, CrmRepository, NotificationKind, NotificationRequest,
    NotificationSender, RepositoryError,
};

/// Arabic marker prefixed to every reminder title.
pub const REMINDER_MARKER: &str = "تذكير";

/// Arabic marker prefixed to every escalation warning title.
pub const WARNING_MARKER: &str = "تحذير";

/// Follow-ups due inside this window get a reminder.
const DUE_SOON_HOURS: i64 = 1;

/// One notification per dedup key inside this window.
const DEDUP_HOURS: i64 = 24;

/// Tasks overdue between these bounds escalate to their creator.
const WARNING_MIN_OVERDUE_HOURS: i64 = 24;
const WARNING_MAX_OVERDUE_HOURS: i64 = 48;

/// Counters describing one sweep run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepSummary {
    pub reminders_sent: u64,
    pub warnings_sent: u64,
    pub deduplicated: u64,
    pub delivery_failures: u64,
}

/// Sweeper composing the read repository, the notification collaborator,
/// and the audit sink.
pub struct ReminderEngine<R, N, A> {
    crm: Arc<R>,
    notifications: Arc<N>,
    audit: Arc<A>,
}

impl<R, N, A> ReminderEngine<R, N, A>
where
    R: CrmRepository + 'static,
    N: NotificationSender + 'static,
    A: AuditSink + 'static,
{
    pub fn new(crm: Arc<R>, notifications: Arc<N>, audit: Arc<A>) -> Self {
        Self {
            crm,
            notifications,
            audit,
        }
    }

    /// Run one sweep for the tenant.
    pub fn run_reminder_sweep(&self, tenant: &TenantId) -> Result<SweepSummary, RepositoryError> {
        let now = Utc::now();
        let due_soon = now + Duration::hours(DUE_SOON_HOURS);
        let mut summary = SweepSummary::default();

        for lead in self.crm.leads(tenant)? {
            let Some(due_at) = lead.next_follow_up_at else {
                continue;
            };
            if due_at > due_soon {
                continue;
            }
            let Some(recipient) = lead.assigned_user.clone() else {
                continue;
            };

            let dedup_key = format!("{}:reminder:lead:{}", tenant.0, lead.id.0);
            self.deliver(
                tenant,
                &mut summary,
                NotificationRequest {
                    tenant: tenant.clone(),
                    recipient,
                    kind: NotificationKind::Reminder,
                    title: format!("{REMINDER_MARKER}: متابعة {}", lead.contact_name),
                    body: format!(
                        "Follow-up with {} is due at {}.",
                        lead.contact_name,
                        due_at.format("%Y-%m-%d %H:%M")
                    ),
                    dedup_key,
                },
            );
        }

        for task in self.crm.open_tasks(tenant, None)? {
            let Some(due_at) = task.due_at else { continue };
            let overdue_hours = (now - due_at).num_hours();

            if due_at <= due_soon && overdue_hours < WARNING_MIN_OVERDUE_HOURS {
                // Imminent or freshly overdue: remind the assignee.
                let Some(recipient) = task.assignee.clone() else {
                    continue;
                };
                let dedup_key = format!("{}:reminder:task:{}", tenant.0, task.id.0);
                self.deliver(
                    tenant,
                    &mut summary,
                    NotificationRequest {
                        tenant: tenant.clone(),
                        recipient,
                        kind: NotificationKind::Reminder,
                        title: format!("{REMINDER_MARKER}: {}", task.title),
                        body: format!("Task due at {}.", due_at.format("%Y-%m-%d %H:%M")),
                        dedup_key,
                    },
                );
            } else if (WARNING_MIN_OVERDUE_HOURS..WARNING_MAX_OVERDUE_HOURS)
                .contains(&overdue_hours)
            {
                // A day late: escalate to whoever created the task, not the
                // assignee.
                let Some(recipient) = task.created_by.clone() else {
                    continue;
                };
                let dedup_key = format!("{}:warning:task:{}", tenant.0, task.id.0);
                self.deliver(
                    tenant,
                    &mut summary,
                    NotificationRequest {
                        tenant: tenant.clone(),
                        recipient,
                        kind: NotificationKind::Warning,
                        title: format!("{WARNING_MARKER}: {}", task.title),
                        body: format!(
                            "Task assigned to {} is {} hours overdue.",
                            task.assignee
                                .as_ref()
                                .map(|user| user.0.as_str())
                                .unwrap_or("nobody"),
                            overdue_hours
                        ),
                        dedup_key,
                    },
                );
            }
        }

        let entry = AuditEntry {
            tenant: tenant.clone(),
            action: "reminder_sweep".to_string(),
            entity_type: "tenant".to_string(),
            entity_id: None,
            metadata: json!({
                "reminders_sent": summary.reminders_sent,
                "warnings_sent": summary.warnings_sent,
                "deduplicated": summary.deduplicated,
                "delivery_failures": summary.delivery_failures,
            }),
        };
        if let Err(err) = self.audit.record(entry) {
            debug!(%err, "audit sink rejected sweep entry");
        }

        Ok(summary)
    }

    fn deliver(
        &self,
        tenant: &TenantId,
        summary: &mut SweepSummary,
        notification: NotificationRequest,
    ) {
        let window = Duration::hours(DEDUP_HOURS);
        match self
            .notifications
            .recently_sent(tenant, &notification.dedup_key, window)
        {
            Ok(true) => {
                summary.deduplicated += 1;
                return;
            }
            Ok(false) => {}
            Err(err) => {
                warn!(%err, dedup_key = %notification.dedup_key, "dedup lookup failed, sending anyway");
            }
        }

        let kind = notification.kind;
        match self.notifications.send(notification) {
            Ok(()) => match kind {
                NotificationKind::Reminder => summary.reminders_sent += 1,
                NotificationKind::Warning => summary.warnings_sent += 1,
            },
            Err(err) => {
                summary.delivery_failures += 1;
                warn!(%err, "notification delivery failed");
            }
        }
    }
}
