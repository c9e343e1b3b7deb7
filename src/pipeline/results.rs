use super::orchestrator::CaptureTrigger;
use crate::analysis::AnalysisOutcome;
use crate::quality::QualityReport;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// One completed analysis, published as a whole
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisRecord {
    pub id: Uuid,
    /// Strictly increasing across publications
    pub version: u64,
    pub trigger: CaptureTrigger,
    pub quality: QualityReport,
    pub outcome: AnalysisOutcome,
    pub frame_sequence: u64,
    pub captured_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

/// Everything about a result except the fields the store assigns
#[derive(Debug, Clone)]
pub struct CompletedAnalysis {
    pub trigger: CaptureTrigger,
    pub quality: QualityReport,
    pub outcome: AnalysisOutcome,
    pub frame_sequence: u64,
    pub captured_at: DateTime<Utc>,
}

#[derive(Default)]
struct Latest {
    record: Option<Arc<AnalysisRecord>>,
    published: u64,
}

/// Latest-result cell.
///
/// Writers replace the whole record under the lock, readers get an `Arc`
/// snapshot, so a reader never sees a half-written result.
#[derive(Default)]
pub struct ResultStore {
    latest: RwLock<Latest>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp and publish a completed analysis
    pub fn publish(&self, completed: CompletedAnalysis) -> Arc<AnalysisRecord> {
        let mut latest = self.latest.write();
        latest.published += 1;

        let record = Arc::new(AnalysisRecord {
            id: Uuid::new_v4(),
            version: latest.published,
            trigger: completed.trigger,
            quality: completed.quality,
            outcome: completed.outcome,
            frame_sequence: completed.frame_sequence,
            captured_at: completed.captured_at,
            completed_at: Utc::now(),
        });
        latest.record = Some(record.clone());
        record
    }

    pub fn latest(&self) -> Option<Arc<AnalysisRecord>> {
        self.latest.read().record.clone()
    }

    /// Number of records published so far
    pub fn version(&self) -> u64 {
        self.latest.read().published
    }
}
