use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

use crate::config::TelegramConfig;
use crate::error::{Error, ErrorDetails};
use crate::membership::{MembershipSource, MembershipStatus};
use crate::transport::{
    ChoiceSet, EventPayload, InboundEvent, InlineAction, MediaAttachment, MediaKind, MediaSource,
    Photo, Reply, Transport,
};
use crate::types::{ChatId, GroupId, UserId};

/// Chat member statuses that count as membership
const MEMBER_STATUSES: [&str; 3] = ["member", "administrator", "creator"];

/// Headroom on top of the long-poll timeout before the HTTP client gives up
const POLL_GRACE: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct TelegramResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    callback_query: Option<CallbackQuery>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    #[serde(default)]
    from: Option<User>,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    photo: Option<Vec<PhotoSize>>,
    #[serde(default)]
    caption: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct User {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct PhotoSize {
    file_id: String,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
    id: String,
    from: User,
    #[serde(default)]
    message: Option<Message>,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatMember {
    status: String,
}

#[derive(Debug, Serialize)]
struct GetUpdatesRequest<'a> {
    offset: i64,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

/// Bot API client over long polling. Serves as both the chat transport and
/// the membership source.
pub struct TelegramClient {
    http: Client,
    api_base: String,
    token: SecretString,
    poll_timeout_secs: u64,
    offset: AtomicI64,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig, token: SecretString) -> Result<Self, Error> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.poll_timeout_secs) + POLL_GRACE)
            .build()
            .map_err(|e| {
                Error::new(ErrorDetails::AppState {
                    message: format!("Failed to build Telegram HTTP client: {e}"),
                })
            })?;

        let mut api_base = config.api_base.to_string();
        if !api_base.ends_with('/') {
            api_base.push('/');
        }

        Ok(Self {
            http,
            api_base,
            token,
            poll_timeout_secs: config.poll_timeout_secs,
            offset: AtomicI64::new(0),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}bot{}/{method}", self.api_base, self.token.expose_secret())
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, body: &impl Serialize) -> Result<T, Error> {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                Error::new(ErrorDetails::Transport {
                    message: format!("Failed to send `{method}` request: {}", e.without_url()),
                })
            })?;
        self.parse_response(method, response).await
    }

    async fn call_multipart<T: DeserializeOwned>(&self, method: &str, form: Form) -> Result<T, Error> {
        let response = self
            .http
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| {
                Error::new(ErrorDetails::Transport {
                    message: format!("Failed to send `{method}` request: {}", e.without_url()),
                })
            })?;
        self.parse_response(method, response).await
    }

    async fn parse_response<T: DeserializeOwned>(
        &self,
        method: &str,
        response: reqwest::Response,
    ) -> Result<T, Error> {
        let raw_response = response.text().await.map_err(|e| {
            Error::new(ErrorDetails::Transport {
                message: format!("Failed to read `{method}` response: {}", e.without_url()),
            })
        })?;

        let envelope: TelegramResponse<T> = serde_json::from_str(&raw_response).map_err(|e| {
            Error::new(ErrorDetails::Serialization {
                message: format!("Failed to parse `{method}` response: {e}"),
            })
        })?;

        match envelope {
            TelegramResponse {
                ok: true,
                result: Some(result),
                ..
            } => Ok(result),
            TelegramResponse { description, .. } => Err(Error::new(ErrorDetails::TelegramApi {
                method: method.to_string(),
                description: description.unwrap_or_else(|| "no description".to_string()),
            })),
        }
    }

    /// Switches the bot to long polling and discards updates queued while it was offline
    pub async fn delete_webhook(&self) -> Result<(), Error> {
        let _: bool = self
            .call("deleteWebhook", &json!({ "drop_pending_updates": true }))
            .await?;
        info!("Telegram webhook removed, pending updates dropped");
        Ok(())
    }

    async fn send_media(
        &self,
        chat_id: ChatId,
        reply: &Reply,
        media: &MediaAttachment,
    ) -> Result<(), Error> {
        let (method, field) = match media.kind {
            MediaKind::Photo => ("sendPhoto", "photo"),
            MediaKind::Audio => ("sendAudio", "audio"),
            MediaKind::Video => ("sendVideo", "video"),
        };
        let markup = reply.choices.as_ref().map(reply_markup);

        match &media.source {
            MediaSource::Url(url) => {
                let mut body = json!({
                    "chat_id": chat_id.0,
                    "caption": reply.text,
                });
                body[field] = json!(url.as_str());
                if let Some(markup) = markup {
                    body["reply_markup"] = markup;
                }
                let _: Value = self.call(method, &body).await?;
            }
            MediaSource::Bytes { file_name, data } => {
                let mut form = Form::new()
                    .text("chat_id", chat_id.0.to_string())
                    .text("caption", reply.text.clone())
                    .part(field, Part::bytes(data.clone()).file_name(file_name.clone()));
                if let Some(markup) = markup {
                    form = form.text("reply_markup", markup.to_string());
                }
                let _: Value = self.call_multipart(method, form).await?;
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Transport for TelegramClient {
    async fn poll(&self) -> Result<Vec<InboundEvent>, Error> {
        let request = GetUpdatesRequest {
            offset: self.offset.load(Ordering::Acquire),
            timeout: self.poll_timeout_secs,
            allowed_updates: &["message", "callback_query"],
        };
        let updates: Vec<Update> = self.call("getUpdates", &request).await?;

        if let Some(last) = updates.iter().map(|update| update.update_id).max() {
            self.offset.store(last + 1, Ordering::Release);
        }

        let events: Vec<InboundEvent> = updates.into_iter().filter_map(into_event).collect();
        if !events.is_empty() {
            debug!("Received {} events from Telegram", events.len());
        }
        Ok(events)
    }

    async fn send(&self, chat_id: ChatId, reply: &Reply) -> Result<(), Error> {
        if let Some(media) = &reply.media {
            return self.send_media(chat_id, reply, media).await;
        }

        let mut body = json!({
            "chat_id": chat_id.0,
            "text": reply.text,
        });
        if let Some(choices) = &reply.choices {
            body["reply_markup"] = reply_markup(choices);
        }
        let _: Value = self.call("sendMessage", &body).await?;
        Ok(())
    }

    async fn acknowledge(&self, callback_id: &str) -> Result<(), Error> {
        let _: bool = self
            .call(
                "answerCallbackQuery",
                &json!({ "callback_query_id": callback_id }),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl MembershipSource for TelegramClient {
    async fn check_membership(
        &self,
        user_id: UserId,
        group_id: &GroupId,
    ) -> Result<MembershipStatus, Error> {
        let member: ChatMember = self
            .call(
                "getChatMember",
                &json!({ "chat_id": group_id.as_str(), "user_id": user_id.0 }),
            )
            .await?;
        Ok(membership_status(&member.status))
    }
}

fn membership_status(status: &str) -> MembershipStatus {
    if MEMBER_STATUSES.contains(&status) {
        MembershipStatus::Member
    } else {
        MembershipStatus::NotMember
    }
}

fn into_event(update: Update) -> Option<InboundEvent> {
    if let Some(callback) = update.callback_query {
        let chat_id = callback
            .message
            .as_ref()
            .map(|message| message.chat.id)
            .unwrap_or(callback.from.id);
        return Some(InboundEvent {
            user_id: UserId(callback.from.id),
            chat_id: ChatId(chat_id),
            payload: EventPayload::Callback {
                id: callback.id,
                data: callback.data.unwrap_or_default(),
            },
        });
    }

    let message = update.message?;
    let user_id = UserId(message.from.as_ref()?.id);
    let chat_id = ChatId(message.chat.id);

    let payload = if let Some(sizes) = message.photo {
        // Sizes are ordered smallest first
        let largest = sizes.into_iter().last()?;
        EventPayload::Photo(Photo {
            file_id: largest.file_id,
            caption: message.caption,
        })
    } else {
        let text = message.text?;
        match text.strip_prefix('/') {
            Some(command) => {
                let name = command
                    .split_whitespace()
                    .next()
                    .unwrap_or_default()
                    .split('@')
                    .next()
                    .unwrap_or_default();
                EventPayload::Command(format!("/{name}"))
            }
            None => EventPayload::Text(text),
        }
    };

    Some(InboundEvent {
        user_id,
        chat_id,
        payload,
    })
}

fn reply_markup(choices: &ChoiceSet) -> Value {
    match choices {
        ChoiceSet::Keyboard(rows) => json!({
            "keyboard": rows
                .iter()
                .map(|row| row.iter().map(|label| json!({ "text": label })).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
            "resize_keyboard": true,
        }),
        ChoiceSet::Inline(rows) => json!({
            "inline_keyboard": rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|choice| match &choice.action {
                            InlineAction::Url(url) => {
                                json!({ "text": choice.label, "url": url.as_str() })
                            }
                            InlineAction::Callback(data) => {
                                json!({ "text": choice.label, "callback_data": data })
                            }
                        })
                        .collect::<Vec<_>>()
                })
                .collect::<Vec<_>>(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::InlineChoice;
    use url::Url;

    fn parse(raw: &str) -> Option<InboundEvent> {
        into_event(serde_json::from_str(raw).unwrap())
    }

    #[test]
    fn test_text_and_command_messages() {
        let event = parse(
            r#"{"update_id": 1, "message": {"chat": {"id": 10}, "from": {"id": 20}, "text": "hello"}}"#,
        )
        .unwrap();
        assert_eq!(event.user_id, UserId(20));
        assert_eq!(event.chat_id, ChatId(10));
        assert_eq!(event.payload, EventPayload::Text("hello".to_string()));

        let event = parse(
            r#"{"update_id": 2, "message": {"chat": {"id": 10}, "from": {"id": 20}, "text": "/start@artemius_bot ref"}}"#,
        )
        .unwrap();
        assert_eq!(event.payload, EventPayload::Command("/start".to_string()));
    }

    #[test]
    fn test_photo_takes_largest_size() {
        let event = parse(
            r#"{"update_id": 3, "message": {"chat": {"id": 10}, "from": {"id": 20},
                "photo": [{"file_id": "small"}, {"file_id": "large"}], "caption": "scan"}}"#,
        )
        .unwrap();
        assert_eq!(
            event.payload,
            EventPayload::Photo(Photo {
                file_id: "large".to_string(),
                caption: Some("scan".to_string()),
            })
        );
    }

    #[test]
    fn test_callback_query() {
        let event = parse(
            r#"{"update_id": 4, "callback_query": {"id": "cb1", "from": {"id": 20},
                "message": {"chat": {"id": 10}}, "data": "check_subscriptions"}}"#,
        )
        .unwrap();
        assert_eq!(event.chat_id, ChatId(10));
        assert_eq!(event.callback_id(), Some("cb1"));
    }

    #[test]
    fn test_unsupported_updates_are_skipped() {
        // Stickers and anonymous channel posts carry nothing we route on
        assert!(parse(r#"{"update_id": 5, "message": {"chat": {"id": 10}, "from": {"id": 20}}}"#).is_none());
        assert!(parse(r#"{"update_id": 6, "message": {"chat": {"id": 10}, "text": "hi"}}"#).is_none());
        assert!(parse(r#"{"update_id": 7}"#).is_none());
    }

    #[test]
    fn test_membership_statuses() {
        assert_eq!(membership_status("creator"), MembershipStatus::Member);
        assert_eq!(membership_status("administrator"), MembershipStatus::Member);
        assert_eq!(membership_status("member"), MembershipStatus::Member);
        assert_eq!(membership_status("restricted"), MembershipStatus::NotMember);
        assert_eq!(membership_status("left"), MembershipStatus::NotMember);
        assert_eq!(membership_status("kicked"), MembershipStatus::NotMember);
    }

    #[test]
    fn test_reply_markup_shapes() {
        let keyboard = reply_markup(&ChoiceSet::Keyboard(vec![vec!["A".to_string(), "B".to_string()]]));
        assert_eq!(
            keyboard,
            json!({"keyboard": [[{"text": "A"}, {"text": "B"}]], "resize_keyboard": true})
        );

        let inline = reply_markup(&ChoiceSet::Inline(vec![vec![
            InlineChoice::url("Join", Url::parse("https://t.me/news").unwrap()),
            InlineChoice::callback("Check", "check_subscriptions"),
        ]]));
        assert_eq!(
            inline,
            json!({"inline_keyboard": [[
                {"text": "Join", "url": "https://t.me/news"},
                {"text": "Check", "callback_data": "check_subscriptions"}
            ]]})
        );
    }

    #[test]
    fn test_method_url_embeds_token() {
        let config = TelegramConfig {
            api_base: Url::parse("http://localhost:8081").unwrap(),
            poll_timeout_secs: 1,
        };
        let client = TelegramClient::new(&config, SecretString::from("123:abc")).unwrap();
        assert_eq!(
            client.method_url("getMe"),
            "http://localhost:8081/bot123:abc/getMe"
        );
    }
}
