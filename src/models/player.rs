use serde::Serialize;
use serde_json::Value as JsonValue;

/// Lifecycle events emitted by the media player and forwarded to dashboard
/// subscribers as JSON frames, e.g. `{"event":"paused"}` or
/// `{"event":"status","data":{"property":"volume","value":55.0}}`.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum PlayerEvent {
    Status { property: String, value: JsonValue },
    Started,
    Paused,
    Resumed,
    Stopped,
    Seek,
    TimePosition(f64),
    Crashed,
    Quit,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn events_serialize_with_tagged_shape() {
        let frame = serde_json::to_value(&PlayerEvent::Paused).unwrap();
        assert_eq!(frame, serde_json::json!({"event": "paused"}));

        let frame = serde_json::to_value(&PlayerEvent::Status {
            property: "volume".to_string(),
            value: serde_json::json!(55.0),
        })
        .unwrap();
        assert_eq!(
            frame,
            serde_json::json!({"event": "status", "data": {"property": "volume", "value": 55.0}})
        );

        let frame = serde_json::to_value(&PlayerEvent::TimePosition(12.5)).unwrap();
        assert_eq!(frame, serde_json::json!({"event": "timePosition", "data": 12.5}));
    }
}
