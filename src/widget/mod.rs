//! Messages posted by the embedded bank-connection widget.
//!
//! Every message is checked against the allowed origins before its payload
//! is read. Message types this client does not know are ignored.

use serde_json::Value;
use tracing::{debug, warn};
use url::{Origin, Url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WidgetEvent {
    ItemCreated { item_id: String },
    Success { item_id: String },
    Error { message: String },
    Close,
    UpdateMfa { item_id: String },
}

impl WidgetEvent {
    /// Connection whose sync should be followed after this event
    pub fn connection_to_poll(&self) -> Option<&str> {
        match self {
            WidgetEvent::ItemCreated { item_id }
            | WidgetEvent::Success { item_id }
            | WidgetEvent::UpdateMfa { item_id } => Some(item_id),
            WidgetEvent::Error { .. } | WidgetEvent::Close => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct WidgetGate {
    allowed: Vec<Origin>,
}

impl WidgetGate {
    /// Origins that fail to parse are skipped with a warning
    pub fn new<I, S>(allowed_origins: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = allowed_origins
            .into_iter()
            .filter_map(|origin| match Url::parse(origin.as_ref()) {
                Ok(url) => Some(url.origin()),
                Err(e) => {
                    warn!("Ignoring invalid widget origin '{}': {}", origin.as_ref(), e);
                    None
                }
            })
            .filter(Origin::is_tuple)
            .collect();
        Self { allowed }
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        match Url::parse(origin) {
            Ok(url) => {
                let origin = url.origin();
                origin.is_tuple() && self.allowed.contains(&origin)
            }
            Err(_) => false,
        }
    }

    /// Validate and parse one posted message. `None` means "do nothing".
    pub fn accept(&self, origin: &str, data: &Value) -> Option<WidgetEvent> {
        if !self.is_allowed(origin) {
            warn!("Rejected widget message from untrusted origin '{}'", origin);
            return None;
        }
        parse_event(data)
    }
}

fn parse_event(data: &Value) -> Option<WidgetEvent> {
    let event_type = data.get("type").and_then(Value::as_str)?;

    let event = match event_type {
        "item/created" => WidgetEvent::ItemCreated { item_id: item_id(data)? },
        "success" => WidgetEvent::Success { item_id: item_id(data)? },
        "item/update-mfa" => WidgetEvent::UpdateMfa { item_id: item_id(data)? },
        "error" => WidgetEvent::Error {
            message: error_message(data),
        },
        "close" => WidgetEvent::Close,
        other => {
            debug!("Ignoring widget message type '{}'", other);
            return None;
        }
    };
    Some(event)
}

fn item_id(data: &Value) -> Option<String> {
    let candidates = [
        data.get("itemId"),
        data.get("item").and_then(|item| item.get("id")),
        data.get("data").and_then(|inner| inner.get("id")),
        data.get("data").and_then(|inner| inner.get("item")).and_then(|item| item.get("id")),
    ];

    let id = candidates.into_iter().flatten().find_map(|value| match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    if id.is_none() {
        warn!("Widget message without an item id: {}", data);
    }
    id
}

fn error_message(data: &Value) -> String {
    data.get("message")
        .or_else(|| data.get("error").and_then(|e| e.get("message")))
        .or_else(|| data.get("data").and_then(|d| d.get("message")))
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| "Could not connect to the bank".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gate() -> WidgetGate {
        WidgetGate::new(["https://connect.pluggy.ai", "http://localhost:3000"])
    }

    #[test]
    fn origin_must_match_scheme_host_and_port() {
        let gate = gate();
        assert!(gate.is_allowed("https://connect.pluggy.ai"));
        assert!(gate.is_allowed("https://connect.pluggy.ai/some/path"));
        assert!(gate.is_allowed("http://localhost:3000"));
        assert!(!gate.is_allowed("http://connect.pluggy.ai"));
        assert!(!gate.is_allowed("https://connect.pluggy.ai.evil.com"));
        assert!(!gate.is_allowed("http://localhost:3001"));
        assert!(!gate.is_allowed("null"));
    }

    #[test]
    fn untrusted_origin_is_a_no_op() {
        let data = json!({"type": "success", "itemId": "item_1"});
        assert_eq!(gate().accept("https://evil.example", &data), None);
    }

    #[test]
    fn success_reads_item_id_from_any_known_place() {
        let gate = gate();
        let origin = "https://connect.pluggy.ai";

        for data in [
            json!({"type": "success", "itemId": "item_1"}),
            json!({"type": "success", "item": {"id": "item_1"}}),
            json!({"type": "success", "data": {"id": "item_1"}}),
            json!({"type": "success", "data": {"item": {"id": "item_1"}}}),
        ] {
            assert_eq!(
                gate.accept(origin, &data),
                Some(WidgetEvent::Success { item_id: "item_1".into() })
            );
        }
    }

    #[test]
    fn event_variants() {
        let gate = gate();
        let origin = "https://connect.pluggy.ai";

        let created = gate.accept(origin, &json!({"type": "item/created", "itemId": "item_9"}));
        assert_eq!(created.as_ref().and_then(WidgetEvent::connection_to_poll), Some("item_9"));

        let mfa = gate.accept(origin, &json!({"type": "item/update-mfa", "data": {"id": "item_9"}}));
        assert_eq!(mfa, Some(WidgetEvent::UpdateMfa { item_id: "item_9".into() }));

        let error = gate.accept(origin, &json!({"type": "error", "error": {"message": "Invalid token"}}));
        assert_eq!(error, Some(WidgetEvent::Error { message: "Invalid token".into() }));
        assert_eq!(error.as_ref().and_then(WidgetEvent::connection_to_poll), None);

        assert_eq!(gate.accept(origin, &json!({"type": "close"})), Some(WidgetEvent::Close));
    }

    #[test]
    fn unknown_or_malformed_messages_are_ignored() {
        let gate = gate();
        let origin = "https://connect.pluggy.ai";
        assert_eq!(gate.accept(origin, &json!({"type": "item/login-succeeded"})), None);
        assert_eq!(gate.accept(origin, &json!({"itemId": "item_1"})), None);
        assert_eq!(gate.accept(origin, &json!({"type": "success"})), None);
        assert_eq!(gate.accept(origin, &json!("success")), None);
    }
}
