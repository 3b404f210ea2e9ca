//! Control messages consumed by the control channel and notifications
//! produced for attached clients.
//!
//! Both are JSON objects tagged on `"type"`.

use serde::{Deserialize, Serialize};

/// Inbound control message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ControlMessage {
    /// Enable caching, persist consent, precache.
    Enable,
    /// Cache one URL, into versioned-core unless a namespace is named.
    CacheUrl {
        url: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        namespace: Option<String>,
    },
    /// Delete one namespace.
    DeleteNamespace { namespace: String },
    /// Disable caching and delete every namespace.
    Disable,
    /// Any kind this build does not know; ignored.
    #[serde(other)]
    Unknown,
}

impl ControlMessage {
    /// Decode a raw message. Malformed input yields `None`.
    pub fn parse(raw: &str) -> Option<Self> {
        match serde_json::from_str(raw) {
            Ok(msg) => Some(msg),
            Err(e) => {
                tracing::debug!(error = %e, "ignoring malformed control message");
                None
            }
        }
    }
}

/// Outbound notification broadcast to attached clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Notification {
    UpdateStarted,
    UpdateComplete,
    CachingStarted,
    CachingProgress { category: String, current: usize, total: usize },
    CachingComplete { namespace: String },
    NamespaceDeleted { namespace: String },
    CacheCleared,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_kinds() {
        assert_eq!(ControlMessage::parse(r#"{"type":"enable"}"#), Some(ControlMessage::Enable));
        assert_eq!(ControlMessage::parse(r#"{"type":"disable"}"#), Some(ControlMessage::Disable));
        assert_eq!(
            ControlMessage::parse(r#"{"type":"cache-url","url":"/about"}"#),
            Some(ControlMessage::CacheUrl { url: "/about".into(), namespace: None })
        );
        assert_eq!(
            ControlMessage::parse(r#"{"type":"delete-namespace","namespace":"lantern-morphology-data"}"#),
            Some(ControlMessage::DeleteNamespace { namespace: "lantern-morphology-data".into() })
        );
    }

    #[test]
    fn test_parse_unknown_kind() {
        assert_eq!(ControlMessage::parse(r#"{"type":"reticulate-splines"}"#), Some(ControlMessage::Unknown));
    }

    #[test]
    fn test_parse_malformed() {
        assert_eq!(ControlMessage::parse("not json"), None);
        assert_eq!(ControlMessage::parse(r#"{"type":"cache-url"}"#), None);
        assert_eq!(ControlMessage::parse(r#"{"url":"/about"}"#), None);
    }

    #[test]
    fn test_notification_wire_format() {
        let progress = Notification::CachingProgress { category: "routes".into(), current: 1, total: 3 };
        assert_eq!(
            serde_json::to_string(&progress).unwrap(),
            r#"{"type":"caching-progress","category":"routes","current":1,"total":3}"#
        );
        assert_eq!(serde_json::to_string(&Notification::CacheCleared).unwrap(), r#"{"type":"cache-cleared"}"#);
        assert_eq!(
            serde_json::to_string(&Notification::NamespaceDeleted { namespace: "x".into() }).unwrap(),
            r#"{"type":"namespace-deleted","namespace":"x"}"#
        );
    }
}
