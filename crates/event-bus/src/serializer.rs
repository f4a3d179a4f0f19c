//! # Envelope Serializer
//!
//! Wire contract for envelopes: one JSON object per event, camelCase keys.
//!
//! - `encode` is total: an in-memory envelope always has a wire form.
//! - `decode` checks the envelope fields and that `data` is present and
//!   non-empty. The shape of `data` is trusted; consumers interpret it
//!   through [`EventEnvelope::payload`].
//! - `build_envelope` is the only place ids and timestamps are assigned.

use crate::error::{BusError, BusResult};
use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use event_types::{EnvelopeOptions, EventData, EventEnvelope, Topic, DEFAULT_VERSION};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Render an envelope as wire text. Absent optional fields are omitted.
#[must_use]
pub fn encode(envelope: &EventEnvelope) -> String {
    let mut object = Map::new();
    object.insert("eventId".into(), envelope.event_id().to_string().into());
    object.insert("topic".into(), envelope.topic().as_str().into());
    object.insert("version".into(), envelope.version().into());
    object.insert(
        "timestamp".into(),
        envelope
            .timestamp()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
            .into(),
    );
    object.insert("source".into(), envelope.source().into());
    if let Some(correlation_id) = envelope.correlation_id() {
        object.insert("correlationId".into(), correlation_id.into());
    }
    if let Some(causation_id) = envelope.causation_id() {
        object.insert("causationId".into(), causation_id.into());
    }
    if let Some(metadata) = envelope.metadata() {
        object.insert("metadata".into(), Value::Object(metadata.clone()));
    }
    object.insert("data".into(), envelope.data().clone());

    Value::Object(object).to_string()
}

/// Parse wire text into an envelope.
///
/// # Errors
///
/// `BusError::MalformedEvent` when the text is not a JSON object, when
/// `eventId`, `topic`, `timestamp` or `source` is missing, blank or unusable,
/// or when `data` is missing or empty.
pub fn decode(raw: &str) -> BusResult<EventEnvelope> {
    let value: Value = serde_json::from_str(raw)
        .map_err(|e| BusError::malformed(format!("invalid JSON: {e}")))?;
    let Value::Object(mut object) = value else {
        return Err(BusError::malformed("envelope is not a JSON object"));
    };

    let event_id = required_str(&object, "eventId")?;
    let event_id = Uuid::parse_str(event_id)
        .map_err(|e| BusError::malformed(format!("eventId is not a UUID: {e}")))?;

    let topic: Topic = required_str(&object, "topic")?
        .parse()
        .map_err(|e| BusError::malformed(format!("{e}")))?;

    let timestamp = DateTime::parse_from_rfc3339(required_str(&object, "timestamp")?)
        .map_err(|e| BusError::malformed(format!("timestamp is not RFC 3339: {e}")))?
        .with_timezone(&Utc);

    let source = required_str(&object, "source")?.to_string();

    let version = optional_str(&object, "version")?
        .unwrap_or(DEFAULT_VERSION)
        .to_string();
    let correlation_id = optional_str(&object, "correlationId")?.map(str::to_string);
    let causation_id = optional_str(&object, "causationId")?.map(str::to_string);

    let metadata = match object.remove("metadata") {
        None | Some(Value::Null) => None,
        Some(Value::Object(metadata)) => Some(metadata),
        Some(_) => return Err(BusError::malformed("metadata is not an object")),
    };
    let data = object
        .remove("data")
        .ok_or_else(|| BusError::malformed("missing data"))?;

    let envelope = EventEnvelope::from_parts(
        event_id,
        topic,
        version,
        timestamp,
        source,
        correlation_id,
        causation_id,
        metadata,
        data,
    );
    if !envelope.has_data() {
        return Err(BusError::malformed("data is empty"));
    }
    Ok(envelope)
}

/// Wrap `data` in a fresh envelope from `source`.
///
/// Assigns a new event id and the current time (millisecond precision, the
/// wire resolution). Optional fields are copied only when supplied.
pub fn build_envelope(
    data: EventData,
    source: &str,
    options: &EnvelopeOptions,
) -> BusResult<EventEnvelope> {
    let topic = data.topic();
    let data = data.to_value()?;

    Ok(EventEnvelope::from_parts(
        Uuid::new_v4(),
        topic,
        options
            .version
            .clone()
            .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
        Utc::now().trunc_subsecs(3),
        source.to_string(),
        options.correlation_id.clone(),
        options.causation_id.clone(),
        options.metadata.clone(),
        data,
    ))
}

fn required_str<'a>(object: &'a Map<String, Value>, field: &str) -> BusResult<&'a str> {
    match object.get(field) {
        Some(Value::String(value)) if value.trim().is_empty() => {
            Err(BusError::malformed(format!("{field} is empty")))
        }
        Some(Value::String(value)) => Ok(value),
        Some(_) => Err(BusError::malformed(format!("{field} is not a string"))),
        None => Err(BusError::malformed(format!("missing {field}"))),
    }
}

fn optional_str<'a>(object: &'a Map<String, Value>, field: &str) -> BusResult<Option<&'a str>> {
    match object.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(value)) => Ok(Some(value)),
        Some(_) => Err(BusError::malformed(format!("{field} is not a string"))),
    }
}
