//! AI usage analytics for the admin view

use crate::db::{AiEvent, Database, DbResult};
use chrono::{DateTime, NaiveTime, Utc};
use serde::Serialize;

/// Events listed in the admin view
pub const RECENT_EVENT_LIMIT: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct Analytics {
    pub total: i64,
    /// Events since the start of the current UTC day
    pub today: i64,
    /// Newest first
    pub events: Vec<AiEvent>,
}

pub fn analytics(db: &Database) -> DbResult<Analytics> {
    analytics_at(db, Utc::now())
}

fn analytics_at(db: &Database, now: DateTime<Utc>) -> DbResult<Analytics> {
    let midnight = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    Ok(Analytics {
        total: db.count_ai_events()?,
        today: db.count_ai_events_since(midnight)?,
        events: db.recent_ai_events(RECENT_EVENT_LIMIT)?,
    })
}
