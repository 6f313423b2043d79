use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Summary of a persisted conversation session, as listed by the backend.
/// Summaries are never mutated client-side; a directory refresh after a
/// successful exchange is how title/recency/count updates arrive.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub title: String,
    pub last_activity: DateTime<Utc>,
    pub message_count: u32,
}
