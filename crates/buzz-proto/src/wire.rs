// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! JSON text framing for the real-time channel.
//!
//! Every frame is one WebSocket text message holding an [`Envelope`]:
//!
//! ``{"event": NAME, "data": PAYLOAD}``
//!
//! * server → observer: `new-buzz`, `buzz-cleared`, `snapshot`, `resync`
//! * observer → server: `snapshot` (no data)

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::{BuzzRecord, ClearedPayload, ClientRequest, HubEvent};

/// Envelope carried by every text frame.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Envelope<P> {
    /// Event name (see [`HubEvent::event_name`]).
    pub event: String,
    /// Event-specific body; `null` when the event has none.
    #[serde(default)]
    pub data: P,
}

/// Framing errors.
#[derive(Debug, Error)]
pub enum WireError {
    /// Frame was not valid JSON or the payload had the wrong shape.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    /// Event name not recognised in this direction.
    #[error("unknown event {0:?}")]
    UnknownEvent(String),
}

/// Encode a hub event as a text frame.
pub fn encode_event(event: &HubEvent) -> Result<String, WireError> {
    let name = event.event_name();
    match event {
        HubEvent::NewBuzz(record) => frame(name, record),
        HubEvent::Cleared(payload) => frame(name, payload),
        HubEvent::Snapshot(records) => frame(name, records),
        HubEvent::Resync => frame(name, Value::Null),
    }
}

fn frame<P: Serialize>(event: &str, data: P) -> Result<String, WireError> {
    Ok(serde_json::to_string(&Envelope {
        event: event.to_string(),
        data,
    })?)
}

/// Decode a server → observer frame.
pub fn decode_event(text: &str) -> Result<HubEvent, WireError> {
    let env: Envelope<Value> = serde_json::from_str(text)?;
    match env.event.as_str() {
        "new-buzz" => Ok(HubEvent::NewBuzz(serde_json::from_value::<BuzzRecord>(
            env.data,
        )?)),
        "buzz-cleared" => Ok(HubEvent::Cleared(serde_json::from_value::<ClearedPayload>(
            env.data,
        )?)),
        "snapshot" => Ok(HubEvent::Snapshot(serde_json::from_value::<Vec<BuzzRecord>>(
            env.data,
        )?)),
        "resync" => Ok(HubEvent::Resync),
        _ => Err(WireError::UnknownEvent(env.event)),
    }
}

/// Encode an observer → server request.
pub fn encode_request(request: ClientRequest) -> Result<String, WireError> {
    let name = match request {
        ClientRequest::Snapshot => "snapshot",
    };
    Ok(serde_json::to_string(&Envelope {
        event: name.to_string(),
        data: Value::Null,
    })?)
}

/// Decode an observer → server request.
pub fn decode_request(text: &str) -> Result<ClientRequest, WireError> {
    let env: Envelope<Value> = serde_json::from_str(text)?;
    match env.event.as_str() {
        "snapshot" => Ok(ClientRequest::Snapshot),
        _ => Err(WireError::UnknownEvent(env.event)),
    }
}
