//! Dashboard statistics.
//!
//! [`aggregate`] is a pure function of the raw rows and a reference instant,
//! so every windowing rule can be tested with a fixed clock and time zone.
//! [`AnalyticsService`] gathers the rows in parallel and fails as a whole if
//! any read fails.
//!
//! Window rules:
//! - 24-hour figures cover `[now - 24h, now]`; 7-day figures `[now - 7d, now]`.
//! - `activity_timeline_7d` has one bucket per local calendar day, today and
//!   the six days before it, oldest first.
//! - `activity_timeline_24h` has 24 hourly buckets anchored at request time:
//!   bucket `k` starts at the local hour truncation of `now - k hours`.
//! - Agent percentages are `round(100 * count / sum_of_top_5)` and are not
//!   adjusted to add up to 100.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Timelike, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use super::{Actor, AuthorizationGate, ServiceError};
use crate::database::models::{AgentSession, AuditEvent};
use crate::database::AdminStore;
use crate::security::Clock;
use crate::types::AuditAction;

pub const TOP_USERS: usize = 5;
pub const TOP_AGENTS: usize = 5;
pub const TOP_ACTIONS: usize = 8;
pub const TOP_RESOURCES: usize = 6;
pub const TIMELINE_DAYS: i64 = 7;
pub const TIMELINE_HOURS: i64 = 24;

/// Label for events that carry no resource type
pub const SYSTEM_RESOURCE: &str = "system";

/// Raw rows the aggregation works from
#[derive(Debug, Clone, Default)]
pub struct StatsInput {
    pub total_users: i64,
    pub total_sessions: i64,
    /// Audit events from (at least) the trailing 7 days
    pub events: Vec<AuditEvent>,
    /// Agent sessions created in (at least) the trailing 7 days
    pub sessions: Vec<AgentSession>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserActivity {
    pub email: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentCount {
    pub agent_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentShare {
    pub agent_type: String,
    pub count: u64,
    pub percentage: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionCount {
    pub action: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResourceCount {
    pub resource_type: String,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineBucket {
    /// `YYYY-MM-DD` for day buckets, `HH:00` for hour buckets (local time)
    pub label: String,
    pub start: DateTime<Utc>,
    pub actions: u64,
    pub sessions: u64,
    pub logins: u64,
    pub logouts: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_sessions: i64,
    pub recent_activity_24h: u64,
    pub total_logins_24h: u64,
    pub total_logouts_24h: u64,
    pub total_events_7d: u64,
    pub most_active_users: Vec<UserActivity>,
    pub most_used_agents: Vec<AgentCount>,
    pub agent_usage_distribution: Vec<AgentShare>,
    pub action_breakdown_7d: Vec<ActionCount>,
    pub resource_breakdown_7d: Vec<ResourceCount>,
    pub activity_timeline_7d: Vec<TimelineBucket>,
    pub activity_timeline_24h: Vec<TimelineBucket>,
    pub generated_at: DateTime<Utc>,
}

/// Counts keyed by first appearance, so equal counts keep encounter order
struct Tally<K> {
    order: Vec<(K, u64)>,
    index: HashMap<K, usize>,
}

impl<K: Clone + Eq + Hash> Tally<K> {
    fn new() -> Self {
        Self {
            order: Vec::new(),
            index: HashMap::new(),
        }
    }

    fn add(&mut self, key: K) {
        match self.index.get(&key) {
            Some(&i) => self.order[i].1 += 1,
            None => {
                self.index.insert(key.clone(), self.order.len());
                self.order.push((key, 1));
            }
        }
    }

    /// Descending by count; `sort_by` is stable so ties stay in encounter order
    fn top(mut self, n: usize) -> Vec<(K, u64)> {
        self.order.sort_by(|a, b| b.1.cmp(&a.1));
        self.order.truncate(n);
        self.order
    }
}

fn is_action(event: &AuditEvent, action: AuditAction) -> bool {
    event.action == action.as_str()
}

/// Local hour truncation; subtracting the local minute/second fields keeps
/// this total across DST transitions.
fn truncate_to_hour<Tz: TimeZone>(t: &DateTime<Tz>) -> DateTime<Tz> {
    t.clone()
        - Duration::seconds(i64::from(t.minute()) * 60 + i64::from(t.second()))
        - Duration::nanoseconds(i64::from(t.nanosecond()))
}

fn local_date<Tz: TimeZone>(t: &DateTime<Utc>, tz: &Tz) -> NaiveDate {
    t.with_timezone(tz).date_naive()
}

/// Start of `day` in `tz`. Where midnight falls in a DST gap, the naive
/// midnight is read as UTC instead.
fn local_midnight<Tz: TimeZone>(day: NaiveDate, tz: &Tz) -> Option<DateTime<Utc>> {
    let naive = day.and_hms_opt(0, 0, 0)?;
    Some(
        tz.from_local_datetime(&naive)
            .earliest()
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
    )
}

fn bucket_counts<'a>(
    events: impl Iterator<Item = &'a AuditEvent>,
    sessions: usize,
    label: String,
    start: DateTime<Utc>,
) -> TimelineBucket {
    let mut bucket = TimelineBucket {
        label,
        start,
        actions: 0,
        sessions: sessions as u64,
        logins: 0,
        logouts: 0,
    };
    for event in events {
        bucket.actions += 1;
        if is_action(event, AuditAction::UserLogin) {
            bucket.logins += 1;
        } else if is_action(event, AuditAction::UserLogout) {
            bucket.logouts += 1;
        }
    }
    bucket
}

/// Derive dashboard statistics from raw rows as of `now`.
///
/// Rows outside the 7-day window, or later than `now`, are ignored.
pub fn aggregate<Tz: TimeZone>(input: &StatsInput, now: DateTime<Tz>) -> AdminStats {
    let tz = now.timezone();
    let now_utc = now.with_timezone(&Utc);
    let since_24h = now_utc - Duration::hours(24);
    let since_7d = now_utc - Duration::days(TIMELINE_DAYS);

    let events_7d: Vec<&AuditEvent> = input
        .events
        .iter()
        .filter(|e| e.created_at >= since_7d && e.created_at <= now_utc)
        .collect();
    let sessions_7d: Vec<&AgentSession> = input
        .sessions
        .iter()
        .filter(|s| s.created_at >= since_7d && s.created_at <= now_utc)
        .collect();
    let events_24h: Vec<&AuditEvent> = events_7d.iter().copied().filter(|e| e.created_at >= since_24h).collect();

    // 24-hour counters and most active users
    let mut users = Tally::new();
    let mut logins = 0;
    let mut logouts = 0;
    for event in &events_24h {
        if is_action(event, AuditAction::UserLogin) {
            logins += 1;
        } else if is_action(event, AuditAction::UserLogout) {
            logouts += 1;
        }
        // only events carrying an email are ranked
        if let Some(email) = event.user_email.as_deref().filter(|e| !e.is_empty()) {
            users.add(email.to_string());
        }
    }

    // Agents
    let mut agents = Tally::new();
    for session in &sessions_7d {
        agents.add(session.agent_type.clone());
    }
    let top_agents = agents.top(TOP_AGENTS);
    let agent_total: u64 = top_agents.iter().map(|(_, c)| c).sum();
    let agent_usage_distribution = top_agents
        .iter()
        .map(|(agent_type, count)| AgentShare {
            agent_type: agent_type.clone(),
            count: *count,
            percentage: if agent_total == 0 {
                0
            } else {
                (100.0 * *count as f64 / agent_total as f64).round() as u64
            },
        })
        .collect();

    // 7-day breakdowns
    let mut actions = Tally::new();
    let mut resources = Tally::new();
    for event in &events_7d {
        actions.add(event.action.clone());
        let resource = event
            .resource_type
            .as_deref()
            .filter(|r| !r.is_empty())
            .unwrap_or(SYSTEM_RESOURCE)
            .to_string();
        resources.add(resource);
    }

    // Day timeline: today and the six days before, by local calendar date
    let today = now.date_naive();
    let activity_timeline_7d = (0..TIMELINE_DAYS)
        .rev()
        .map(|k| {
            let day = today - Duration::days(k);
            let start = local_midnight(day, &tz).unwrap_or(now_utc);
            let sessions = sessions_7d.iter().filter(|s| local_date(&s.created_at, &tz) == day).count();
            bucket_counts(
                events_7d.iter().copied().filter(|e| local_date(&e.created_at, &tz) == day),
                sessions,
                day.format("%Y-%m-%d").to_string(),
                start,
            )
        })
        .collect();

    // Hour timeline: buckets anchored at request time
    let activity_timeline_24h = (0..TIMELINE_HOURS)
        .rev()
        .map(|k| {
            let start_local = truncate_to_hour(&(now.clone() - Duration::hours(k)));
            let start = start_local.with_timezone(&Utc);
            let end = start + Duration::hours(1);
            let in_bucket = |t: &DateTime<Utc>| *t >= start && *t < end;
            let sessions = sessions_7d.iter().filter(|s| in_bucket(&s.created_at)).count();
            bucket_counts(
                events_7d.iter().copied().filter(|e| in_bucket(&e.created_at)),
                sessions,
                start_local.naive_local().format("%H:00").to_string(),
                start,
            )
        })
        .collect();

    AdminStats {
        total_users: input.total_users,
        total_sessions: input.total_sessions,
        recent_activity_24h: events_24h.len() as u64,
        total_logins_24h: logins,
        total_logouts_24h: logouts,
        total_events_7d: events_7d.len() as u64,
        most_active_users: users
            .top(TOP_USERS)
            .into_iter()
            .map(|(email, count)| UserActivity { email, count })
            .collect(),
        most_used_agents: top_agents
            .into_iter()
            .map(|(agent_type, count)| AgentCount { agent_type, count })
            .collect(),
        agent_usage_distribution,
        action_breakdown_7d: actions
            .top(TOP_ACTIONS)
            .into_iter()
            .map(|(action, count)| ActionCount { action, count })
            .collect(),
        resource_breakdown_7d: resources
            .top(TOP_RESOURCES)
            .into_iter()
            .map(|(resource_type, count)| ResourceCount { resource_type, count })
            .collect(),
        activity_timeline_7d,
        activity_timeline_24h,
        generated_at: now_utc,
    }
}

pub struct AnalyticsService {
    store: Arc<dyn AdminStore>,
    gate: Arc<AuthorizationGate>,
    clock: Arc<dyn Clock>,
}

impl AnalyticsService {
    pub fn new(store: Arc<dyn AdminStore>, gate: Arc<AuthorizationGate>, clock: Arc<dyn Clock>) -> Self {
        Self { store, gate, clock }
    }

    /// Read the raw rows for the trailing 7 days. All reads run concurrently;
    /// the first failure aborts the lot.
    pub async fn load(&self, now: DateTime<Utc>) -> Result<StatsInput, ServiceError> {
        let since = now - Duration::days(TIMELINE_DAYS);
        let (total_users, total_sessions, events, sessions) = futures::try_join!(
            self.store.count_users(),
            self.store.count_sessions(),
            self.store.audit_events_since(since),
            self.store.sessions_since(since),
        )?;
        Ok(StatsInput {
            total_users,
            total_sessions,
            events,
            sessions,
        })
    }

    /// Statistics for the dashboard, bucketed in the time zone `tz`
    pub async fn stats<Tz: TimeZone>(&self, actor: &Actor, tz: &Tz) -> Result<AdminStats, ServiceError> {
        self.gate.require_moderator(actor).await?;

        let now = self.clock.now();
        let input = self.load(now).await?;
        Ok(aggregate(&input, now.with_timezone(tz)))
    }
}
