//! Async driver for [`ChatFeed`].
//!
//! [`FeedRuntime`] performs each [`FeedRequest`] on its own tokio task and
//! posts the outcome to an event channel. [`FeedController`] owns the feed
//! and the receiving end, so every state mutation happens on the one task
//! that polls [`FeedController::next_event`], whatever order the network
//! answers in.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use huddle_net::{spawn_push_listener, stream_client, ChatApi, HttpChatApi, PushHub, PushListener};
use huddle_shared::protocol::MessageKind;
use huddle_shared::types::ChatId;

use crate::anchor::{ScrollAction, Viewport};
use crate::bridge::LiveBridge;
use crate::config::FeedConfig;
use crate::error::Result;
use crate::feed::{ChatFeed, FeedCompletion, FeedEvent, FeedRequest, FeedSettings};

/// Execute one request against the API.
pub async fn perform(api: &dyn ChatApi, request: FeedRequest) -> FeedCompletion {
    match request {
        FeedRequest::LoadPage {
            token,
            kind,
            window,
        } => FeedCompletion::Page {
            token,
            kind,
            result: api
                .fetch_page(token.chat_id(), window.offset, window.limit)
                .await,
        },
        FeedRequest::FetchLatest { token } => FeedCompletion::Latest {
            token,
            result: api.fetch_latest(token.chat_id()).await,
        },
        FeedRequest::Send { token, message } => FeedCompletion::Sent {
            token,
            result: api.send_message(&message).await,
        },
    }
}

#[derive(Clone)]
pub struct FeedRuntime {
    api: Arc<dyn ChatApi>,
    tx: mpsc::UnboundedSender<FeedEvent>,
}

impl FeedRuntime {
    pub fn new(api: Arc<dyn ChatApi>, tx: mpsc::UnboundedSender<FeedEvent>) -> Self {
        Self { api, tx }
    }

    /// Spawn `request`. The completion arrives on the event channel.
    pub fn execute(&self, request: FeedRequest) -> JoinHandle<()> {
        let api = self.api.clone();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let completion = perform(api.as_ref(), request).await;
            if tx.send(FeedEvent::Completion(completion)).is_err() {
                debug!("Feed gone before request completed");
            }
        })
    }
}

/// A [`ChatFeed`] wired to the API and the push hub.
pub struct FeedController {
    feed: ChatFeed,
    runtime: FeedRuntime,
    hub: PushHub,
    bridge: Option<LiveBridge>,
    tx: mpsc::UnboundedSender<FeedEvent>,
    rx: mpsc::UnboundedReceiver<FeedEvent>,
}

impl FeedController {
    pub fn new(api: Arc<dyn ChatApi>, hub: PushHub, settings: FeedSettings) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        Self {
            feed: ChatFeed::new(settings),
            runtime: FeedRuntime::new(api, tx.clone()),
            hub,
            bridge: None,
            tx,
            rx,
        }
    }

    /// Build the HTTP client, the push hub and its listener from `config`.
    ///
    /// The listener keeps the push stream alive until it is dropped.
    pub fn connect(config: &FeedConfig) -> Result<(Self, PushListener)> {
        let api = HttpChatApi::new(&config.api_url, config.api_token.clone(), config.http_timeout)?;
        let hub = PushHub::new();
        let listener = spawn_push_listener(
            stream_client(config.http_timeout)?,
            config.push_url.clone(),
            config.api_token.clone(),
            hub.clone(),
            config.push_reconnect_delay,
        );
        info!(api = %config.api_url, push = %config.push_url, "Feed controller connected");

        let controller = Self::new(Arc::new(api), hub, config.feed_settings());
        Ok((controller, listener))
    }

    pub fn feed(&self) -> &ChatFeed {
        &self.feed
    }

    pub fn hub(&self) -> &PushHub {
        &self.hub
    }

    /// Open a chat. The push subscription is in place before the first page
    /// is requested, so no arrival can fall between the two.
    pub fn open(&mut self, chat_id: ChatId) {
        self.bridge = None;
        let request = self.feed.open(chat_id);
        self.bridge = Some(LiveBridge::attach(&self.hub, request.token(), self.tx.clone()));
        self.dispatch(request);
    }

    pub fn reload(&mut self) {
        if let Some(chat_id) = self.feed.chat_id() {
            self.open(chat_id);
        }
    }

    pub fn close(&mut self) {
        self.bridge = None;
        self.feed.close();
    }

    /// Returns `true` when an older page was requested.
    pub fn on_scroll(&mut self, viewport: &dyn Viewport) -> bool {
        match self.feed.on_scroll(viewport) {
            Some(request) => {
                self.dispatch(request);
                true
            }
            None => false,
        }
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        self.feed.set_draft(text);
    }

    pub fn set_message_kind(&mut self, kind: MessageKind) {
        self.feed.set_message_kind(kind);
    }

    /// Returns `true` when a send was started.
    pub fn submit(&mut self) -> bool {
        match self.feed.submit() {
            Some(request) => {
                self.dispatch(request);
                true
            }
            None => false,
        }
    }

    pub fn send(&mut self, content: &str) -> bool {
        self.feed.set_draft(content);
        self.submit()
    }

    /// Wait for the next completion or push signal.
    pub async fn next_event(&mut self) -> Option<FeedEvent> {
        self.rx.recv().await
    }

    /// Apply an event and start whatever it asks for.
    pub fn handle(&mut self, event: FeedEvent) {
        for request in self.feed.handle(event) {
            self.dispatch(request);
        }
    }

    /// [`next_event`](Self::next_event) followed by [`handle`](Self::handle).
    pub async fn process_next(&mut self) -> bool {
        match self.next_event().await {
            Some(event) => {
                self.handle(event);
                true
            }
            None => false,
        }
    }

    pub fn after_layout(&mut self, viewport: &mut dyn Viewport) -> ScrollAction {
        self.feed.after_layout(viewport)
    }

    fn dispatch(&self, request: FeedRequest) {
        self.runtime.execute(request);
    }
}
