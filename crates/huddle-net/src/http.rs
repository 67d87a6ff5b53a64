//! [`ChatApi`] over the backend's REST endpoints.
//!
//! - `GET  {base}/chats/{chatId}/messages?limit=&offset=` returns a page
//! - `POST {base}/chats/{chatId}/messages` creates a message

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response};
use tracing::debug;

use huddle_shared::protocol::{ChatMessage, OutgoingMessage};
use huddle_shared::types::ChatId;

use crate::api::ChatApi;
use crate::error::{NetError, Result};

#[derive(Debug, Clone)]
pub struct HttpChatApi {
    http: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpChatApi {
    /// Build a client for `base_url` (e.g. `https://coach.example/api`).
    pub fn new(base_url: &str, api_token: Option<String>, timeout: Duration) -> Result<Self> {
        let base_url = base_url.trim().trim_end_matches('/').to_string();
        if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
            return Err(NetError::InvalidEndpoint(base_url));
        }

        let http = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url,
            api_token,
        })
    }

    fn messages_url(&self, chat_id: ChatId) -> String {
        format!("{}/chats/{}/messages", self.base_url, chat_id)
    }

    fn authorize(&self, rb: RequestBuilder) -> RequestBuilder {
        match &self.api_token {
            Some(token) => rb.bearer_auth(token),
            None => rb,
        }
    }
}

/// Fail on non-success statuses, then decode the JSON body.
async fn decode<T: serde::de::DeserializeOwned>(resp: Response) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(NetError::Status {
            status: status.as_u16(),
            body,
        });
    }
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[async_trait]
impl ChatApi for HttpChatApi {
    async fn fetch_page(
        &self,
        chat_id: ChatId,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<ChatMessage>> {
        let rb = self
            .http
            .get(self.messages_url(chat_id))
            .query(&[("limit", limit), ("offset", offset)]);

        let resp = self.authorize(rb).send().await?;
        let page: Vec<ChatMessage> = decode(resp).await?;

        debug!(chat = %chat_id, offset, limit, count = page.len(), "Fetched message page");
        Ok(page)
    }

    async fn send_message(&self, message: &OutgoingMessage) -> Result<ChatMessage> {
        let rb = self
            .http
            .post(self.messages_url(message.chat_id))
            .json(message);

        let resp = self.authorize(rb).send().await?;
        let created: ChatMessage = decode(resp).await?;

        debug!(chat = %created.chat_id, msg_id = %created.id, "Message created");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::{Arc, Mutex};

    use axum::extract::{Path, Query, State};
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::get;
    use axum::{Json, Router};
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};
    use serde::Deserialize;
    use uuid::Uuid;

    use huddle_shared::protocol::MessageKind;
    use huddle_shared::types::{MessageId, UserId};

    #[derive(Clone, Default)]
    struct Backend {
        history: Arc<Mutex<Vec<ChatMessage>>>,
        auth_headers: Arc<Mutex<Vec<String>>>,
    }

    #[derive(Deserialize)]
    struct PageQuery {
        limit: usize,
        offset: usize,
    }

    async fn list(
        State(backend): State<Backend>,
        Path(_chat_id): Path<Uuid>,
        Query(q): Query<PageQuery>,
        headers: HeaderMap,
    ) -> Json<Vec<ChatMessage>> {
        if let Some(auth) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
            backend.auth_headers.lock().unwrap().push(auth.to_string());
        }
        let all = backend.history.lock().unwrap().clone();
        let end = all.len().saturating_sub(q.offset);
        let start = end.saturating_sub(q.limit);
        Json(all[start..end].to_vec())
    }

    async fn create(
        State(backend): State<Backend>,
        Path(chat_id): Path<Uuid>,
        Json(body): Json<OutgoingMessage>,
    ) -> (StatusCode, Json<ChatMessage>) {
        let created = ChatMessage {
            id: MessageId::new(),
            chat_id: ChatId(chat_id),
            sender_id: UserId(Uuid::nil()),
            sender_name: "Athlete".into(),
            content: body.content,
            kind: body.kind,
            created_at: Utc::now(),
        };
        backend.history.lock().unwrap().push(created.clone());
        (StatusCode::CREATED, Json(created))
    }

    async fn spawn_backend(backend: Backend) -> String {
        let app = Router::new()
            .route("/api/chats/{chat_id}/messages", get(list).post(create))
            .route(
                "/broken/chats/{chat_id}/messages",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "database unavailable") }),
            )
            .with_state(backend);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn seeded(chat: ChatId, count: i64) -> Vec<ChatMessage> {
        let start = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        (0..count)
            .map(|i| ChatMessage {
                id: MessageId::new(),
                chat_id: chat,
                sender_id: UserId(Uuid::nil()),
                sender_name: "Coach".into(),
                content: format!("#{i}"),
                kind: MessageKind::Text,
                created_at: start + ChronoDuration::minutes(i),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_fetch_page_offsets() {
        let chat = ChatId::new();
        let backend = Backend::default();
        *backend.history.lock().unwrap() = seeded(chat, 25);
        let url = spawn_backend(backend.clone()).await;

        let api = HttpChatApi::new(
            &format!("{url}/api/"),
            Some("secret".into()),
            Duration::from_secs(5),
        )
        .unwrap();

        let newest = api.fetch_page(chat, 0, 20).await.unwrap();
        assert_eq!(newest.len(), 20);
        assert_eq!(newest.first().unwrap().content, "#5");
        assert_eq!(newest.last().unwrap().content, "#24");

        let older = api.fetch_page(chat, 20, 20).await.unwrap();
        assert_eq!(older.len(), 5);
        assert_eq!(older.last().unwrap().content, "#4");

        let latest = api.fetch_latest(chat).await.unwrap().unwrap();
        assert_eq!(latest.content, "#24");

        let auth = backend.auth_headers.lock().unwrap().clone();
        assert_eq!(auth.len(), 3);
        assert!(auth.iter().all(|h| h == "Bearer secret"));
    }

    #[tokio::test]
    async fn test_send_message() {
        let chat = ChatId::new();
        let backend = Backend::default();
        let url = spawn_backend(backend.clone()).await;
        let api = HttpChatApi::new(&format!("{url}/api"), None, Duration::from_secs(5)).unwrap();

        let created = api
            .send_message(&OutgoingMessage {
                chat_id: chat,
                content: "Practice moved to 6pm".into(),
                kind: MessageKind::Text,
            })
            .await
            .unwrap();

        assert_eq!(created.chat_id, chat);
        assert_eq!(created.content, "Practice moved to 6pm");
        assert_eq!(backend.history.lock().unwrap().len(), 1);
        assert!(backend.auth_headers.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_error_status() {
        let url = spawn_backend(Backend::default()).await;
        let api =
            HttpChatApi::new(&format!("{url}/broken"), None, Duration::from_secs(5)).unwrap();

        match api.fetch_page(ChatId::new(), 0, 20).await {
            Err(NetError::Status { status, body }) => {
                assert_eq!(status, 500);
                assert_eq!(body, "database unavailable");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_rejects_bad_base_url() {
        assert!(HttpChatApi::new("ftp://nope", None, Duration::from_secs(1)).is_err());
        let api = HttpChatApi::new(
            " http://localhost:8080/api/ ",
            None,
            Duration::from_secs(1),
        )
        .unwrap();
        let chat = ChatId::new();
        assert_eq!(
            api.messages_url(chat),
            format!("http://localhost:8080/api/chats/{chat}/messages")
        );
    }
}
