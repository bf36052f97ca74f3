//! Debt collection follow-up reminders.
//!
//! Debt records may carry a `scheduledFollowUp` object (`dateTime`, `method`, `notes`,
//! `reminderEnabled`, `completed`). A follow-up is *overdue* once its time has passed and
//! *upcoming* while it falls within the lookahead window. The background scanner notifies each
//! record once per process lifetime; nothing is persisted, so a follow-up missed while the
//! server was down is never announced.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};
use utoipa::ToSchema;

use crate::{
    config::RemindersConfig,
    currency::{find_or_usd, format_currency},
    db::{
        Store,
        handlers::{Activities, Records, Repository, Users},
        models::{
            activities::{ActivityCreateDBRequest, Priority},
            records::{Collection, Record, field_text, record_id},
            users::UserFilter,
        },
    },
    types::UserId,
    utils::dates::{format_date_time, parse_date},
};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FollowUp {
    date_time: String,
    #[serde(default)]
    method: String,
    #[serde(default)]
    notes: Option<String>,
    #[serde(default)]
    reminder_enabled: bool,
    #[serde(default)]
    completed: bool,
}

/// The active follow-up of a record, if it should be watched.
fn active_follow_up(record: &Record) -> Option<(FollowUp, DateTime<Utc>)> {
    let follow_up: FollowUp = serde_json::from_value(record.get("scheduledFollowUp")?.clone()).ok()?;
    if !follow_up.reminder_enabled || follow_up.completed {
        return None;
    }
    let at = parse_date(&follow_up.date_time)?;
    Some((follow_up, at))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ReminderKind {
    Overdue,
    Upcoming,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ReminderNotification {
    pub record_id: i64,
    pub customer: String,
    pub amount: f64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    pub scheduled_at: DateTime<Utc>,
    pub kind: ReminderKind,
    /// Rounded minutes until an upcoming follow-up
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minutes_until: Option<i64>,
}

impl ReminderNotification {
    pub fn title(&self) -> &'static str {
        match self.kind {
            ReminderKind::Overdue => "Overdue Follow-up!",
            ReminderKind::Upcoming => "Follow-up Reminder",
        }
    }

    pub fn details(&self) -> String {
        let amount = format_currency(self.amount, find_or_usd("USD"));
        match self.kind {
            ReminderKind::Overdue => format!(
                "{} - {}\nScheduled: {}\nMethod: {}",
                self.customer,
                amount,
                format_date_time(self.scheduled_at),
                self.method
            ),
            ReminderKind::Upcoming => {
                let minutes_until = self.minutes_until.unwrap_or(0);
                let plural = if minutes_until == 1 { "" } else { "s" };
                let notes = self.notes.as_deref().map(|n| format!("\n\"{n}\"")).unwrap_or_default();
                format!(
                    "{} - {}\nIn {} minute{}\nMethod: {}{}",
                    self.customer, amount, minutes_until, plural, self.method, notes
                )
            }
        }
    }

    fn priority(&self) -> Priority {
        match self.kind {
            ReminderKind::Overdue => Priority::High,
            ReminderKind::Upcoming => Priority::Medium,
        }
    }
}

fn notification(
    record: &Record,
    id: i64,
    follow_up: FollowUp,
    at: DateTime<Utc>,
    kind: ReminderKind,
    minutes_until: Option<i64>,
) -> ReminderNotification {
    ReminderNotification {
        record_id: id,
        customer: field_text(record, "customer").unwrap_or_default(),
        amount: record.get("amount").and_then(serde_json::Value::as_f64).unwrap_or(0.0),
        method: follow_up.method,
        notes: follow_up.notes.filter(|n| !n.is_empty()),
        scheduled_at: at,
        kind,
        minutes_until,
    }
}

/// Watches one user's debt records and announces each follow-up once.
#[derive(Debug, Clone)]
pub struct DebtReminderChecker {
    lookahead: chrono::Duration,
    notified: HashSet<i64>,
}

impl DebtReminderChecker {
    pub fn new(lookahead: std::time::Duration) -> Self {
        Self {
            lookahead: chrono::Duration::from_std(lookahead).unwrap_or(chrono::Duration::minutes(15)),
            notified: HashSet::new(),
        }
    }

    /// Notifications due at `now`. Forgets records that no longer exist, so a re-created record
    /// with the same id is announced again.
    pub fn check(&mut self, records: &[Record], now: DateTime<Utc>) -> Vec<ReminderNotification> {
        let current: HashSet<i64> = records.iter().filter_map(record_id).collect();
        self.notified.retain(|id| current.contains(id));

        let window_end = now + self.lookahead;
        let mut due = Vec::new();
        for record in records {
            let Some(id) = record_id(record) else { continue };
            if self.notified.contains(&id) {
                continue;
            }
            let Some((follow_up, at)) = active_follow_up(record) else {
                continue;
            };

            let (kind, minutes_until) = if at < now {
                (ReminderKind::Overdue, None)
            } else if at <= window_end {
                let minutes = ((at - now).num_milliseconds() as f64 / 60_000.0).round() as i64;
                (ReminderKind::Upcoming, Some(minutes))
            } else {
                continue;
            };
            self.notified.insert(id);
            due.push(notification(record, id, follow_up, at, kind, minutes_until));
        }
        due
    }

    /// Follow-ups due after `now` but within the lookahead window.
    pub fn upcoming(&self, records: &[Record], now: DateTime<Utc>) -> Vec<Record> {
        let window_end = now + self.lookahead;
        records
            .iter()
            .filter(|r| active_follow_up(r).is_some_and(|(_, at)| at > now && at <= window_end))
            .cloned()
            .collect()
    }

    pub fn overdue(&self, records: &[Record], now: DateTime<Utc>) -> Vec<Record> {
        records
            .iter()
            .filter(|r| active_follow_up(r).is_some_and(|(_, at)| at < now))
            .cloned()
            .collect()
    }
}

/// One pass over every user's debt records. Returns how many notifications were written.
#[instrument(skip_all, err)]
pub async fn scan_once(
    store: &Store,
    checkers: &mut HashMap<UserId, DebtReminderChecker>,
    lookahead: std::time::Duration,
    now: DateTime<Utc>,
) -> crate::db::errors::Result<usize> {
    let users = Users::new(store).list(&UserFilter::default()).await?;
    let live: HashSet<UserId> = users.iter().map(|u| u.id).collect();
    checkers.retain(|id, _| live.contains(id));

    let mut written = 0;
    for user in users {
        let records = Records::new(store).list(Collection::Debt, &user.id).await?;
        let checker = checkers
            .entry(user.id)
            .or_insert_with(|| DebtReminderChecker::new(lookahead));

        for note in checker.check(&records, now) {
            info!(user_id = %user.id, record_id = note.record_id, kind = ?note.kind, "{}", note.title());
            Activities::new(store)
                .log(
                    &user.id,
                    ActivityCreateDBRequest::new("Debt Collection", note.title(), note.details(), note.priority()),
                )
                .await;
            written += 1;
        }
    }
    Ok(written)
}

/// Run [`scan_once`] every `check_interval` until `shutdown` fires.
pub fn spawn_reminder_scanner(store: Store, config: RemindersConfig, shutdown: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut checkers = HashMap::new();
        let mut ticker = tokio::time::interval(config.check_interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!(interval = ?config.check_interval, lookahead = ?config.lookahead, "Debt reminder scanner started");

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Debt reminder scanner stopped");
                    break;
                }
                _ = ticker.tick() => {
                    match scan_once(&store, &mut checkers, config.lookahead, Utc::now()).await {
                        Ok(0) => {}
                        Ok(written) => debug!(written, "Follow-up reminders recorded"),
                        Err(e) => warn!(error = %e, "Debt reminder scan failed"),
                    }
                }
            }
        }
    })
}
