//! Notification message schema.

use serde::{Deserialize, Serialize};

/// Notification sent to connected clients.
///
/// Serialized as `{"type": "...", "path": "..."}` with `path` omitted when
/// absent. The well-known types are [`Message::CHANGE`] and
/// [`Message::RELOAD`]; any other string is passed through untouched.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    path: Option<String>,
}

impl Message {
    /// A file changed; clients may hot-swap it instead of reloading.
    pub const CHANGE: &'static str = "change";
    /// Clients should reload the page.
    pub const RELOAD: &'static str = "reload";

    /// Create a message of the given type without a path.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            path: None,
        }
    }

    /// Create a `change` message for a directory-relative path.
    pub fn change(path: impl Into<String>) -> Self {
        Self::new(Self::CHANGE).with_path(path)
    }

    /// Create a `reload` message.
    pub fn reload() -> Self {
        Self::new(Self::RELOAD)
    }

    /// Attach a path to the message.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Message type.
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Path the message refers to, if any.
    pub fn path(&self) -> Option<&str> {
        self.path.as_deref()
    }

    /// Encode as a compact JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_change_serialization() {
        let json = Message::change("css/site.css").to_json().unwrap();
        assert_eq!(json, r#"{"type":"change","path":"css/site.css"}"#);
    }

    #[test]
    fn test_path_omitted_when_absent() {
        assert_eq!(Message::reload().to_json().unwrap(), r#"{"type":"reload"}"#);
        assert_eq!(
            Message::new("change").to_json().unwrap(),
            r#"{"type":"change"}"#
        );
    }

    #[test]
    fn test_deserialize_custom_type() {
        let msg: Message = serde_json::from_str(r#"{"type":"rebuild"}"#).unwrap();
        assert_eq!(msg.kind(), "rebuild");
        assert_eq!(msg.path(), None);
    }

    #[test]
    fn test_deserialize_ignores_unknown_fields() {
        let msg: Message =
            serde_json::from_str(r#"{"type":"change","path":"a.js","extra":1}"#).unwrap();
        assert_eq!(msg, Message::change("a.js"));
    }

    #[test]
    fn test_deserialize_requires_type() {
        let result = serde_json::from_str::<Message>(r#"{"path":"a.js"}"#);
        assert!(result.is_err());
    }
}
