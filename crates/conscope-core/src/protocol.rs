//! DevTools protocol wire types
//!
//! Outbound calls are `{id, method, params}`. Inbound text is either a
//! response (`{id, result}` / `{id, error}`) or an event (`{method, params}`,
//! no id).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::SessionError;

/// Method name of the console API event
pub const CONSOLE_API_CALLED: &str = "Runtime.consoleAPICalled";

/// Method name of the uncaught exception event
pub const EXCEPTION_THROWN: &str = "Runtime.exceptionThrown";

/// A method call sent to the browser
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboundCall {
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl OutboundCall {
    /// Serialize to the wire form. `null` params become `{}`.
    pub fn to_wire(&self) -> Result<String, SessionError> {
        if self.params.is_null() {
            let call = OutboundCall {
                params: Value::Object(Map::new()),
                ..self.clone()
            };
            return Ok(serde_json::to_string(&call)?);
        }
        Ok(serde_json::to_string(self)?)
    }
}

/// Error object carried by a failed response
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteError {
    #[serde(default)]
    pub code: i64,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl fmt::Display for RemoteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "remote error {}: {}", self.code, self.message)?;
        if let Some(data) = &self.data {
            match data {
                Value::String(s) => write!(f, " ({s})")?,
                other => write!(f, " ({other})")?,
            }
        }
        Ok(())
    }
}

/// A classified inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Reply to an earlier call
    Response {
        id: u64,
        outcome: Result<Value, RemoteError>,
    },
    /// Unsolicited notification
    Event { method: String, params: Value },
}

impl InboundMessage {
    /// Parse and classify one inbound text frame
    pub fn parse(text: &str) -> Result<Self, SessionError> {
        let json: Value = serde_json::from_str(text)
            .map_err(|e| SessionError::protocol(format!("inbound message is not JSON: {e}")))?;
        Self::classify(&json)
    }

    /// Classify an already-decoded message
    pub fn classify(json: &Value) -> Result<Self, SessionError> {
        if !json.is_object() {
            return Err(SessionError::protocol("inbound message is not an object"));
        }

        if let Some(id) = json.get("id") {
            let id = id
                .as_u64()
                .ok_or_else(|| SessionError::protocol(format!("invalid response id {id}")))?;

            let outcome = match json.get("error") {
                Some(err) => Err(serde_json::from_value(err.clone()).unwrap_or_else(|_| {
                    RemoteError {
                        code: 0,
                        message: err.to_string(),
                        data: None,
                    }
                })),
                None => Ok(json.get("result").cloned().unwrap_or(Value::Null)),
            };
            return Ok(InboundMessage::Response { id, outcome });
        }

        match json.get("method").and_then(Value::as_str) {
            Some(method) => Ok(InboundMessage::Event {
                method: method.to_string(),
                params: json
                    .get("params")
                    .cloned()
                    .unwrap_or_else(|| Value::Object(Map::new())),
            }),
            None => Err(SessionError::protocol(
                "inbound message has neither an id nor a method",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_outbound_call_wire_form() {
        let call = OutboundCall {
            id: 7,
            method: "Runtime.evaluate".to_string(),
            params: json!({"expression": "1 + 1"}),
        };
        let wire: Value = serde_json::from_str(&call.to_wire().unwrap()).unwrap();
        assert_eq!(wire["id"], 7);
        assert_eq!(wire["method"], "Runtime.evaluate");
        assert_eq!(wire["params"]["expression"], "1 + 1");
    }

    #[test]
    fn test_outbound_null_params_become_empty_object() {
        let call = OutboundCall {
            id: 1,
            method: "Runtime.enable".to_string(),
            params: Value::Null,
        };
        let wire: Value = serde_json::from_str(&call.to_wire().unwrap()).unwrap();
        assert_eq!(wire["params"], json!({}));
    }

    #[test]
    fn test_parse_success_response() {
        let msg = InboundMessage::parse(r#"{"id": 3, "result": {"frameId": "abc"}}"#).unwrap();
        match msg {
            InboundMessage::Response { id, outcome } => {
                assert_eq!(id, 3);
                assert_eq!(outcome.unwrap()["frameId"], "abc");
            }
            other => panic!("expected response, got {other:?}"),
        }
    }

    #[test]
    fn test_parse_error_response() {
        let msg = InboundMessage::parse(
            r#"{"id": 2, "error": {"code": -32601, "message": "'Foo.bar' wasn't found"}}"#,
        )
        .unwrap();
        let InboundMessage::Response { id, outcome } = msg else {
            panic!("expected response");
        };
        assert_eq!(id, 2);
        let err = outcome.unwrap_err();
        assert_eq!(err.code, -32601);
        assert!(err.to_string().contains("wasn't found"));
    }

    #[test]
    fn test_parse_event_without_params() {
        let msg = InboundMessage::parse(r#"{"method": "Page.domContentEventFired"}"#).unwrap();
        assert_eq!(
            msg,
            InboundMessage::Event {
                method: "Page.domContentEventFired".to_string(),
                params: json!({}),
            }
        );
    }

    #[test]
    fn test_message_with_id_is_a_response_even_with_method() {
        let msg = InboundMessage::parse(r#"{"id": 1, "method": "Page.navigate", "result": {}}"#)
            .unwrap();
        assert!(matches!(msg, InboundMessage::Response { id: 1, .. }));
    }

    #[test]
    fn test_rejects_malformed_messages() {
        assert!(matches!(
            InboundMessage::parse("not json"),
            Err(SessionError::Protocol { .. })
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"params": {"foo": "bar"}}"#),
            Err(SessionError::Protocol { .. })
        ));
        assert!(matches!(
            InboundMessage::parse(r#"{"id": "seven", "result": {}}"#),
            Err(SessionError::Protocol { .. })
        ));
        assert!(matches!(
            InboundMessage::parse("[1, 2]"),
            Err(SessionError::Protocol { .. })
        ));
    }

    #[test]
    fn test_remote_error_display_with_data() {
        let err = RemoteError {
            code: -32000,
            message: "Server error".to_string(),
            data: Some(json!("something broke")),
        };
        assert_eq!(
            err.to_string(),
            "remote error -32000: Server error (something broke)"
        );
    }
}
