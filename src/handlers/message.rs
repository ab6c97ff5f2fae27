//! # Message Handlers
//!
//! `POST {prefix}/message` accepts a [`Message`] and echoes it back. Nothing
//! is stored.
//!
//! ## Request:
//! ```json
//! { "content": "hello", "sender": "alice" }
//! ```
//! `sender` may be omitted or `null`; it is echoed as `null` in that case.
//! A body without a string `content` is rejected with 422 by the JSON
//! extractor before this handler runs.

use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub content: String,
    #[serde(default)]
    pub sender: Option<String>,
}

pub async fn create_message(body: web::Json<Message>) -> HttpResponse {
    let message = body.into_inner();
    info!(
        sender = message.sender.as_deref().unwrap_or("anonymous"),
        content_length = message.content.len(),
        "Message received"
    );
    HttpResponse::Ok().json(message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_defaults_to_none() {
        let message: Message = serde_json::from_str(r#"{"content": "hello"}"#).unwrap();
        assert_eq!(message.content, "hello");
        assert_eq!(message.sender, None);

        let echoed = serde_json::to_value(&message).unwrap();
        assert!(echoed["sender"].is_null());
        assert!(echoed.as_object().unwrap().contains_key("sender"));
    }

    #[test]
    fn test_content_is_required() {
        assert!(serde_json::from_str::<Message>("{}").is_err());
        assert!(serde_json::from_str::<Message>(r#"{"sender": "alice"}"#).is_err());
        assert!(serde_json::from_str::<Message>(r#"{"content": 42}"#).is_err());
    }
}
