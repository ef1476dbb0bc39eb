use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use larder_core::AggregateId;

use crate::event::Event;

/// A published event plus the metadata a consumer needs to order and dedupe it.
///
/// Type, schema version and timestamp are copied from the payload when the
/// envelope is sealed, so they survive serialization even for consumers that
/// cannot decode `E`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventEnvelope<E> {
    event_id: Uuid,
    event_type: String,
    schema_version: u32,
    occurred_at: DateTime<Utc>,
    stream_id: AggregateId,
    stream_type: String,
    sequence_number: u64,
    payload: E,
}

impl<E: Event> EventEnvelope<E> {
    /// Wrap `payload` as entry `sequence_number` of the stream `stream_id`.
    pub fn seal(
        payload: E,
        stream_id: AggregateId,
        stream_type: impl Into<String>,
        sequence_number: u64,
    ) -> Self {
        Self {
            event_id: Uuid::now_v7(),
            event_type: payload.event_type().to_string(),
            schema_version: payload.version(),
            occurred_at: payload.occurred_at(),
            stream_id,
            stream_type: stream_type.into(),
            sequence_number,
            payload,
        }
    }
}

impl<E> EventEnvelope<E> {
    pub fn event_id(&self) -> Uuid {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn schema_version(&self) -> u32 {
        self.schema_version
    }

    pub fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }

    /// The aggregate the event belongs to.
    pub fn aggregate_id(&self) -> AggregateId {
        self.stream_id
    }

    pub fn aggregate_type(&self) -> &str {
        &self.stream_type
    }

    /// Position in publication order; starts at 1 and has no gaps per publisher.
    pub fn sequence_number(&self) -> u64 {
        self.sequence_number
    }

    pub fn payload(&self) -> &E {
        &self.payload
    }

    pub fn into_payload(self) -> E {
        self.payload
    }

    /// Swap the payload for a derived one, keeping the metadata.
    pub fn map_payload<F, T>(self, f: F) -> EventEnvelope<T>
    where
        F: FnOnce(E) -> T,
    {
        EventEnvelope {
            event_id: self.event_id,
            event_type: self.event_type,
            schema_version: self.schema_version,
            occurred_at: self.occurred_at,
            stream_id: self.stream_id,
            stream_type: self.stream_type,
            sequence_number: self.sequence_number,
            payload: f(self.payload),
        }
    }
}
