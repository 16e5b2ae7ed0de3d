use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

// ---------------------------------------------------------------------------
// Alias chains: first present, usable value wins. Dotted entries walk into
// nested objects (Suricata EVE puts the user agent under `http`).
// ---------------------------------------------------------------------------

pub const SOURCE_ADDRESS_ALIASES: &[&str] = &["source_address", "src_ip", "source_ip", "src_addr", "src"];
pub const DESTINATION_ADDRESS_ALIASES: &[&str] = &[
    "destination_address", "dst_ip", "dest_ip", "destination_ip", "dst_addr", "dst",
];
pub const SOURCE_PORT_ALIASES: &[&str] = &["source_port", "src_port", "sport"];
pub const DESTINATION_PORT_ALIASES: &[&str] = &["destination_port", "dst_port", "dest_port", "dport"];
pub const PROTOCOL_ALIASES: &[&str] = &["protocol", "proto", "app_proto"];
pub const PAYLOAD_ALIASES: &[&str] = &["payload", "payload_printable", "data", "http.http_request_body"];
// EVE logs `payload` base64-encoded next to a `payload_printable` rendering.
pub const EVE_PAYLOAD_ALIASES: &[&str] = &["payload_printable", "data", "http.http_request_body"];
const EVE_MARKERS: &[&str] = &["event_type", "payload_printable"];
pub const USER_AGENT_ALIASES: &[&str] = &["user_agent", "http_user_agent", "http.http_user_agent", "ua"];
pub const TIMESTAMP_ALIASES: &[&str] = &["timestamp", "ts", "@timestamp"];
pub const SIGNATURE_ALIASES: &[&str] = &["signature", "alert.signature", "msg"];
pub const CLASSIFICATION_ALIASES: &[&str] = &["classification", "alert.category", "category"];
pub const PRIORITY_ALIASES: &[&str] = &["priority", "alert.severity", "severity"];

/// One flow/event record with every field optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Map<String, Value>")]
pub struct EventRecord {
    pub source_address: Option<String>,
    pub destination_address: Option<String>,
    pub source_port: Option<u16>,
    pub destination_port: Option<u16>,
    pub protocol: Option<String>,
    pub payload: Option<String>,
    pub user_agent: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub signature: Option<String>,
    pub classification: Option<String>,
    pub priority: Option<u8>,
}

impl EventRecord {
    /// Build a record from a loosely-shaped JSON object, resolving every
    /// alias chain exactly once. Never fails: unusable values become `None`.
    pub fn from_fields(fields: &Map<String, Value>) -> Self {
        Self {
            source_address: resolve(fields, SOURCE_ADDRESS_ALIASES, non_empty_text),
            destination_address: resolve(fields, DESTINATION_ADDRESS_ALIASES, non_empty_text),
            source_port: resolve(fields, SOURCE_PORT_ALIASES, coerce_port),
            destination_port: resolve(fields, DESTINATION_PORT_ALIASES, coerce_port),
            protocol: resolve(fields, PROTOCOL_ALIASES, non_empty_text),
            payload: resolve_payload(fields),
            user_agent: resolve(fields, USER_AGENT_ALIASES, non_empty_text),
            timestamp: resolve(fields, TIMESTAMP_ALIASES, coerce_timestamp),
            signature: resolve(fields, SIGNATURE_ALIASES, non_empty_text),
            classification: resolve(fields, CLASSIFICATION_ALIASES, non_empty_text),
            priority: resolve(fields, PRIORITY_ALIASES, coerce_priority),
        }
    }

    pub fn resolved(&self) -> ResolvedEvent<'_> {
        ResolvedEvent {
            source_address: self.source_address.as_deref(),
            destination_address: self.destination_address.as_deref(),
            source_port: self.source_port,
            destination_port: self.destination_port,
            protocol: self.protocol.as_deref().map(|p| p.trim().to_ascii_uppercase()),
            payload: self.payload.as_deref().unwrap_or(""),
            user_agent: self.user_agent.as_deref().unwrap_or(""),
        }
    }
}

impl From<Map<String, Value>> for EventRecord {
    fn from(fields: Map<String, Value>) -> Self {
        Self::from_fields(&fields)
    }
}

/// The per-record view the rules evaluate: protocol normalized to upper
/// case, payload and user agent defaulted to the empty string.
#[derive(Debug, Clone)]
pub struct ResolvedEvent<'a> {
    pub source_address: Option<&'a str>,
    pub destination_address: Option<&'a str>,
    pub source_port: Option<u16>,
    pub destination_port: Option<u16>,
    pub protocol: Option<String>,
    pub payload: &'a str,
    pub user_agent: &'a str,
}

fn resolve<T>(fields: &Map<String, Value>, aliases: &[&str], coerce: fn(&Value) -> Option<T>) -> Option<T> {
    aliases
        .iter()
        .filter_map(|alias| lookup(fields, alias))
        .find_map(coerce)
}

fn resolve_payload(fields: &Map<String, Value>) -> Option<String> {
    if !EVE_MARKERS.iter().any(|key| fields.contains_key(*key)) {
        return resolve(fields, PAYLOAD_ALIASES, non_empty_text);
    }
    let printable = resolve(fields, &EVE_PAYLOAD_ALIASES[..1], non_empty_text);
    printable
        .or_else(|| lookup(fields, "payload").and_then(decode_eve_payload))
        .or_else(|| resolve(fields, &EVE_PAYLOAD_ALIASES[1..], non_empty_text))
}

/// Base64 `payload` from EVE. A value that does not decode is taken as text.
fn decode_eve_payload(v: &Value) -> Option<String> {
    use base64::Engine;
    let raw = non_empty_text(v)?;
    match base64::engine::general_purpose::STANDARD.decode(raw.trim()) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()).filter(|s| !s.is_empty()),
        Err(_) => Some(raw),
    }
}

fn lookup<'a>(fields: &'a Map<String, Value>, path: &str) -> Option<&'a Value> {
    if let Some(v) = fields.get(path) {
        return Some(v);
    }
    let (head, rest) = path.split_once('.')?;
    match fields.get(head)? {
        Value::Object(inner) => lookup(inner, rest),
        _ => None,
    }
}

fn any_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn non_empty_text(v: &Value) -> Option<String> {
    any_text(v).filter(|s| !s.trim().is_empty())
}

/// Integers or numeric strings in 0..=65535. Anything else is unset, not 0.
pub fn coerce_port(v: &Value) -> Option<u16> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => s.trim().parse::<u16>().ok(),
        _ => None,
    }
}

fn coerce_priority(v: &Value) -> Option<u8> {
    match v {
        Value::Number(n) => n.as_u64().and_then(|p| u8::try_from(p).ok()),
        Value::String(s) => s.trim().parse::<u8>().ok(),
        _ => None,
    }
}

fn coerce_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    let s = v.as_str()?.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    // EVE writes offsets without a colon: 2024-03-16T12:30:00.090000+0000
    if let Ok(ts) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: Value) -> EventRecord {
        serde_json::from_value(v).unwrap()
    }

    #[test]
    fn test_alias_order() {
        let r = record(json!({"src": "10.0.0.9", "src_ip": "10.0.0.1", "dest_ip": "8.8.8.8"}));
        assert_eq!(r.source_address.as_deref(), Some("10.0.0.1"));
        assert_eq!(r.destination_address.as_deref(), Some("8.8.8.8"));
    }

    #[test]
    fn test_null_alias_falls_through() {
        let r = record(json!({"source_address": null, "src_ip": "192.168.1.4"}));
        assert_eq!(r.source_address.as_deref(), Some("192.168.1.4"));
    }

    #[test]
    fn test_port_coercion() {
        let r = record(json!({"src_port": "5050", "dst_port": " 23 "}));
        assert_eq!(r.source_port, Some(5050));
        assert_eq!(r.destination_port, Some(23));

        let r = record(json!({"dst_port": "http", "src_port": -1}));
        assert_eq!(r.destination_port, None);
        assert_eq!(r.source_port, None);

        let r = record(json!({"dst_port": 70000}));
        assert_eq!(r.destination_port, None);

        // a bad first alias does not hide a usable later one
        let r = record(json!({"dst_port": "x", "dest_port": 445}));
        assert_eq!(r.destination_port, Some(445));
    }

    #[test]
    fn test_nested_user_agent() {
        let r = record(json!({
            "http": {"http_user_agent": "Mozilla/4.0 (compatible; MSIE 6.0)"},
            "payload_printable": "GET / HTTP/1.0",
        }));
        assert_eq!(r.user_agent.as_deref(), Some("Mozilla/4.0 (compatible; MSIE 6.0)"));
        assert_eq!(r.payload.as_deref(), Some("GET / HTTP/1.0"));
    }

    #[test]
    fn test_resolved_defaults() {
        let r = record(json!({"proto": "tcp"}));
        let view = r.resolved();
        assert_eq!(view.protocol.as_deref(), Some("TCP"));
        assert_eq!(view.payload, "");
        assert_eq!(view.user_agent, "");
        assert!(view.source_address.is_none());
    }

    #[test]
    fn test_empty_object() {
        assert_eq!(record(json!({})), EventRecord::default());
    }

    #[test]
    fn test_eve_prefers_printable_payload() {
        let r = record(json!({
            "event_type": "alert",
            "payload": "R0VUIC9sb2dpbj9wYXNzd29yZD1hYmMxMjMgSFRUUC8xLjENCg==",
            "payload_printable": "GET /login?password=abc123 HTTP/1.1\r\nAuthorization: Basic dXNlcjpwYXNz\r\n",
        }));
        assert_eq!(
            r.payload.as_deref(),
            Some("GET /login?password=abc123 HTTP/1.1\r\nAuthorization: Basic dXNlcjpwYXNz\r\n")
        );
    }

    #[test]
    fn test_eve_payload_decoded_without_printable() {
        let r = record(json!({
            "event_type": "alert",
            "payload": "R0VUIC9sb2dpbj9wYXNzd29yZD1hYmMxMjMgSFRUUC8xLjENCg==",
        }));
        assert_eq!(r.payload.as_deref(), Some("GET /login?password=abc123 HTTP/1.1\r\n"));
    }

    #[test]
    fn test_empty_payload_falls_through() {
        let r = record(json!({"payload": "", "data": "community public"}));
        assert_eq!(r.payload.as_deref(), Some("community public"));

        let r = record(json!({"event_type": "alert", "payload_printable": "", "payload": "U1NMdjM="}));
        assert_eq!(r.payload.as_deref(), Some("SSLv3"));
    }

    #[test]
    fn test_eve_timestamp() {
        let r = record(json!({"timestamp": "2024-03-16T12:30:00.090000+0000", "alert": {"signature": "ET SCAN", "severity": 2}}));
        assert!(r.timestamp.is_some());
        assert_eq!(r.signature.as_deref(), Some("ET SCAN"));
        assert_eq!(r.priority, Some(2));
    }
}
