//! Messages exchanged between the page and the interception layer.

use serde::{Deserialize, Serialize};

use crate::version::Version;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    /// Page to layer: activate the waiting instance now
    SkipWaiting,
    /// Layer to every open page: activation finished
    #[serde(rename = "SW_ACTIVATED")]
    Activated { version: Version },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_format() {
        assert_eq!(
            serde_json::to_string(&Message::SkipWaiting).unwrap(),
            r#"{"type":"SKIP_WAITING"}"#
        );

        let activated = Message::Activated {
            version: Version::parse("v1-20251002").unwrap(),
        };
        assert_eq!(
            serde_json::to_string(&activated).unwrap(),
            r#"{"type":"SW_ACTIVATED","version":"v1-20251002"}"#
        );
    }

    #[test]
    fn test_parse_from_page() {
        let parsed: Message = serde_json::from_str(r#"{"type":"SKIP_WAITING"}"#).unwrap();
        assert_eq!(parsed, Message::SkipWaiting);

        assert!(serde_json::from_str::<Message>(r#"{"type":"RELOAD"}"#).is_err());
        assert!(
            serde_json::from_str::<Message>(r#"{"type":"SW_ACTIVATED","version":"a/b"}"#).is_err()
        );
    }
}
