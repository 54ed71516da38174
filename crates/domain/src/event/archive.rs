use super::{AlarmRecord, AlarmSummary, EventRecord};
use crate::error::BoxError;
use async_trait::async_trait;

/// Append-only archival port used by the alarm engine.
///
/// Implementations should return quickly: alarm ticks await these calls.
#[async_trait]
pub trait EventArchive: Send + Sync {
    async fn write_event(&self, event: EventRecord) -> Result<EventRecord, BoxError>;

    async fn write_alarm(&self, record: AlarmRecord) -> Result<AlarmRecord, BoxError>;

    /// Inserts or replaces the summary row keyed by alarm name.
    async fn upsert_summary(&self, summary: AlarmSummary) -> Result<(), BoxError>;
}
