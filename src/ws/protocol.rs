use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ingest::SENSOR_EVENT;
use crate::reading::Reading;

/// Messages sent from client to server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    Ping,
}

/// Messages sent from server to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    Event {
        event: String,
        data: Value,
    },
    Pong {
        timestamp: String,
    },
    Error {
        message: String,
        code: String,
    },
}

impl ServerMessage {
    pub fn reading(reading: &Reading) -> Result<Self, serde_json::Error> {
        Ok(ServerMessage::Event {
            event: SENSOR_EVENT.to_string(),
            data: serde_json::to_value(reading)?,
        })
    }

    pub fn pong() -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        ServerMessage::Pong { timestamp: now }
    }

    pub fn error(message: impl Into<String>, code: impl Into<String>) -> Self {
        ServerMessage::Error {
            message: message.into(),
            code: code.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    #[test]
    fn test_client_message_ping_deserialization() {
        let json = r#"{"type": "ping"}"#;
        let msg: ClientMessage = serde_json::from_str(json).unwrap();

        assert!(matches!(msg, ClientMessage::Ping));
    }

    #[test]
    fn test_unknown_client_message_is_rejected() {
        let json = r#"{"type": "subscribe", "streams": ["energy"]}"#;
        assert!(serde_json::from_str::<ClientMessage>(json).is_err());
    }

    #[test]
    fn test_server_message_reading_serialization() {
        let ts = Utc.with_ymd_and_hms(2025, 6, 1, 8, 0, 0).unwrap();
        let fields = serde_json::from_value(json!({ "ds18b20_temp": 31.0 })).unwrap();
        let reading = Reading::from_fields(fields, ts);

        let msg = ServerMessage::reading(&reading).unwrap();
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["type"], "event");
        assert_eq!(value["event"], "sensor-data");
        assert_eq!(value["data"]["ds18b20_temp"], 31.0);
        assert_eq!(value["data"]["receivedAt"], "2025-06-01T08:00:00.000Z");
        assert_eq!(value["data"]["status"]["tempLevel"], "hot");
    }

    #[test]
    fn test_server_message_pong_serialization() {
        let msg = ServerMessage::pong();

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"pong"#));
        assert!(json.contains(r#""timestamp""#));
    }

    #[test]
    fn test_server_message_error_serialization() {
        let msg = ServerMessage::error("Test error", "TEST_ERROR");

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains(r#""type":"error"#));
        assert!(json.contains(r#""message":"Test error"#));
        assert!(json.contains(r#""code":"TEST_ERROR"#));
    }
}
