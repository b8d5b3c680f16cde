//! Occurrence rows for the two large fact tables.

use crate::categories::DETECTION_SOURCES;
use crate::generator::Generator;
use crate::ids::IdPool;
use crate::rows::OccurrenceRow;
use crate::schema::TableId;
use crate::GenerateError;
use rand::Rng;
use serde_json::{json, Value};

/// Max length of free-text fields inside details payloads
const DETAILS_TEXT_CHARS: usize = 100;

/// Which occurrence table a stream feeds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OccurrenceKind {
    Event,
    Incident,
}

impl OccurrenceKind {
    pub fn table(self) -> TableId {
        match self {
            OccurrenceKind::Event => TableId::EventOccurrences,
            OccurrenceKind::Incident => TableId::IncidentOccurrences,
        }
    }

    /// Table the parent ids come from
    pub fn parent_table(self) -> TableId {
        match self {
            OccurrenceKind::Event => TableId::Events,
            OccurrenceKind::Incident => TableId::Incidents,
        }
    }

    /// How far back `occurred_at` may reach, in days
    pub fn lookback_days(self) -> i64 {
        match self {
            OccurrenceKind::Event => 90,
            OccurrenceKind::Incident => 180,
        }
    }
}

impl<R: Rng> Generator<R> {
    /// One occurrence row of `kind`, attached to a uniformly chosen parent
    pub fn occurrence(
        &mut self,
        kind: OccurrenceKind,
        batch: usize,
        parents: &IdPool,
    ) -> Result<OccurrenceRow, GenerateError> {
        let id = self.fake.uuid();
        let parent_id = parents.pick(self.fake.rng())?;
        let occurred_at = self.fake.backdated(self.now(), kind.lookback_days());

        let (details, status) = match kind {
            OccurrenceKind::Event => (self.event_details(batch), self.event_occurrence_status()),
            OccurrenceKind::Incident => (
                self.incident_details(batch),
                self.incident_occurrence_status(),
            ),
        };

        Ok(OccurrenceRow {
            id,
            parent_id,
            occurred_at,
            details,
            status,
            created_at: occurred_at,
            updated_at: occurred_at,
        })
    }

    pub fn event_occurrence(
        &mut self,
        batch: usize,
        events: &IdPool,
    ) -> Result<OccurrenceRow, GenerateError> {
        self.occurrence(OccurrenceKind::Event, batch, events)
    }

    pub fn incident_occurrence(
        &mut self,
        batch: usize,
        incidents: &IdPool,
    ) -> Result<OccurrenceRow, GenerateError> {
        self.occurrence(OccurrenceKind::Incident, batch, incidents)
    }

    fn event_details(&mut self, batch: usize) -> Value {
        json!({
            "batch": batch,
            "correlation_id": self.fake.uuid().to_string(),
            "raw_log": self.fake.text(DETAILS_TEXT_CHARS),
            "matched_rules": self.fake.int_range(1, 5),
            "score": self.fake.float_range(0.5, 1.0),
        })
    }

    fn incident_details(&mut self, batch: usize) -> Value {
        json!({
            "batch": batch,
            "correlation_id": self.fake.uuid().to_string(),
            "reporter": self.fake.name(),
            "detection_source": self.fake.pick(DETECTION_SOURCES),
            "notes": self.fake.text(DETAILS_TEXT_CHARS),
            "response_time_minutes": self.fake.int_range(1, 480),
            "affected_systems": self.fake.int_range(1, 50),
            "confidence_score": self.fake.float_range(0.5, 1.0),
        })
    }
}
