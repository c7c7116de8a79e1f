use serde_json::{Map, Value};

/// Value of the `type` field that marks a room-join control message.
pub const JOIN_TYPE: &str = "join";

const TYPE_FIELD: &str = "type";
const MEETING_ID_FIELD: &str = "meetingId";
const FROM_FIELD: &str = "from";

/// The relay's view of an inbound envelope.
///
/// Only `type`, `meetingId` and `from` are read; every other field stays in the raw
/// text and is never re-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignalingMessage {
    /// Control message adding the sender to `meeting_id`. Never forwarded.
    Join {
        meeting_id: String,
        from: Option<String>,
    },
    /// Anything else. Forwarded to the room named by the message itself.
    Relay { meeting_id: Option<String> },
}

impl SignalingMessage {
    /// Parses a raw frame. Fails only if the text is not JSON at all.
    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        let value: Value = serde_json::from_str(raw)?;
        Ok(Self::classify(value.as_object()))
    }

    fn classify(fields: Option<&Map<String, Value>>) -> Self {
        let field = |name: &str| {
            fields
                .and_then(|f| f.get(name))
                .and_then(Value::as_str)
                .map(str::to_owned)
        };

        let meeting_id = field(MEETING_ID_FIELD);
        let is_join = field(TYPE_FIELD).as_deref() == Some(JOIN_TYPE);

        match meeting_id {
            Some(meeting_id) if is_join && !meeting_id.is_empty() => SignalingMessage::Join {
                meeting_id,
                from: field(FROM_FIELD).filter(|from| !from.is_empty()),
            },
            meeting_id => SignalingMessage::Relay { meeting_id },
        }
    }
}
