//! Per-session chat feed state machine.
//!
//! [`ChatFeed`] owns the message store, the history pager, the scroll anchor
//! and the composer of the one open chat. It performs no I/O itself: every
//! operation returns the [`FeedRequest`]s to execute, and the caller feeds
//! the outcomes back through [`ChatFeed::on_completion`]. All methods take
//! `&mut self`, so mutations from the three sources (history, push, send)
//! are serialized by whoever owns the feed, while the I/O between them can
//! interleave freely.
//!
//! Session lifecycle: `Closed → LoadingInitial → Ready ⇄ LoadingHistory`.
//! Each [`open`](ChatFeed::open) mints a fresh [`SessionToken`]; completions
//! and push signals carrying any other token are discarded, so a response
//! for an abandoned chat can never leak into the next one.

use tracing::{debug, info, warn};

use huddle_net::NetError;
use huddle_shared::constants::{DEFAULT_BOTTOM_THRESHOLD_PX, DEFAULT_PAGE_SIZE};
use huddle_shared::protocol::{ChatMessage, MessageKind, OutgoingMessage};
use huddle_shared::types::ChatId;
use huddle_store::MessageStore;

use crate::anchor::{ScrollAction, ScrollAnchor, Viewport};
use crate::composer::Composer;
use crate::pagination::{HistoryPager, PageWindow};

/// Identifies one opening of one chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionToken {
    chat_id: ChatId,
    generation: u64,
}

impl SessionToken {
    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FeedPhase {
    Closed,
    /// Newest page requested, nothing rendered yet.
    LoadingInitial,
    Ready,
    /// An older page is in flight. Live merges and sends still proceed.
    LoadingHistory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageKind {
    Initial,
    History,
}

/// I/O the owner must perform on behalf of the feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedRequest {
    LoadPage {
        token: SessionToken,
        kind: PageKind,
        window: PageWindow,
    },
    /// Refetch the newest message after a push signal.
    FetchLatest { token: SessionToken },
    Send {
        token: SessionToken,
        message: OutgoingMessage,
    },
}

impl FeedRequest {
    pub fn token(&self) -> SessionToken {
        match self {
            FeedRequest::LoadPage { token, .. }
            | FeedRequest::FetchLatest { token }
            | FeedRequest::Send { token, .. } => *token,
        }
    }
}

/// Outcome of a [`FeedRequest`].
#[derive(Debug)]
pub enum FeedCompletion {
    Page {
        token: SessionToken,
        kind: PageKind,
        result: Result<Vec<ChatMessage>, NetError>,
    },
    Latest {
        token: SessionToken,
        result: Result<Option<ChatMessage>, NetError>,
    },
    Sent {
        token: SessionToken,
        result: Result<ChatMessage, NetError>,
    },
}

impl FeedCompletion {
    pub fn token(&self) -> SessionToken {
        match self {
            FeedCompletion::Page { token, .. }
            | FeedCompletion::Latest { token, .. }
            | FeedCompletion::Sent { token, .. } => *token,
        }
    }
}

/// Everything that can wake the feed's owner.
#[derive(Debug)]
pub enum FeedEvent {
    Completion(FeedCompletion),
    /// The push channel announced a new message for this session.
    Push(SessionToken),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeedSettings {
    pub page_size: usize,
    pub bottom_threshold: f64,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            bottom_threshold: DEFAULT_BOTTOM_THRESHOLD_PX,
        }
    }
}

struct ActiveSession {
    token: SessionToken,
    store: MessageStore,
    pager: HistoryPager,
    anchor: ScrollAnchor,
    composer: Composer,
    /// A push arrived before the first page; refetch once it lands.
    latest_deferred: bool,
}

pub struct ChatFeed {
    settings: FeedSettings,
    generation: u64,
    phase: FeedPhase,
    session: Option<ActiveSession>,
}

impl ChatFeed {
    pub fn new(settings: FeedSettings) -> Self {
        Self {
            settings,
            generation: 0,
            phase: FeedPhase::Closed,
            session: None,
        }
    }

    pub fn settings(&self) -> FeedSettings {
        self.settings
    }

    // -----------------------------------------------------------------------
    // Session lifecycle
    // -----------------------------------------------------------------------

    /// Open `chat_id`, discarding any previous session, and request its newest page.
    pub fn open(&mut self, chat_id: ChatId) -> FeedRequest {
        self.generation += 1;
        let token = SessionToken {
            chat_id,
            generation: self.generation,
        };

        if let Some(previous) = self.session.take() {
            info!(from = %previous.token.chat_id, to = %chat_id, "Switching chat session");
        } else {
            info!(chat = %chat_id, "Opening chat session");
        }

        let pager = HistoryPager::new(self.settings.page_size);
        let window = pager.first_page();
        self.session = Some(ActiveSession {
            token,
            store: MessageStore::new(chat_id),
            pager,
            anchor: ScrollAnchor::new(self.settings.bottom_threshold),
            composer: Composer::new(),
            latest_deferred: false,
        });
        self.phase = FeedPhase::LoadingInitial;

        FeedRequest::LoadPage {
            token,
            kind: PageKind::Initial,
            window,
        }
    }

    /// Reopen the current chat from scratch, e.g. after the first page failed.
    pub fn reload(&mut self) -> Option<FeedRequest> {
        let chat_id = self.chat_id()?;
        Some(self.open(chat_id))
    }

    pub fn close(&mut self) {
        if let Some(session) = self.session.take() {
            info!(chat = %session.token.chat_id, loaded = session.store.len(), "Closing chat session");
        }
        self.phase = FeedPhase::Closed;
    }

    // -----------------------------------------------------------------------
    // Read view
    // -----------------------------------------------------------------------

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn token(&self) -> Option<SessionToken> {
        self.session.as_ref().map(|s| s.token)
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        self.token().map(|t| t.chat_id)
    }

    pub fn is_current(&self, token: &SessionToken) -> bool {
        self.session.as_ref().is_some_and(|s| s.token == *token)
    }

    pub fn store(&self) -> Option<&MessageStore> {
        self.session.as_ref().map(|s| &s.store)
    }

    /// Messages to render, oldest first.
    pub fn messages(&self) -> &[ChatMessage] {
        self.session
            .as_ref()
            .map(|s| s.store.messages())
            .unwrap_or(&[])
    }

    pub fn has_more(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.pager.has_more())
    }

    pub fn anchor(&self) -> Option<&ScrollAnchor> {
        self.session.as_ref().map(|s| &s.anchor)
    }

    pub fn draft(&self) -> &str {
        self.session
            .as_ref()
            .map(|s| s.composer.draft())
            .unwrap_or("")
    }

    pub fn is_sending(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.composer.is_sending())
    }

    // -----------------------------------------------------------------------
    // View events
    // -----------------------------------------------------------------------

    /// Scroll event from the container. Requests older history when the top
    /// edge is reached with a full page loaded and more history available.
    pub fn on_scroll(&mut self, viewport: &dyn Viewport) -> Option<FeedRequest> {
        let session = self.session.as_mut()?;
        session.anchor.observe(viewport);

        if self.phase != FeedPhase::Ready || !viewport.is_at_top() {
            return None;
        }
        let window = session.pager.next_page(session.store.len())?;

        session.anchor.capture_before_prepend(viewport);
        self.phase = FeedPhase::LoadingHistory;
        debug!(
            chat = %session.token.chat_id,
            offset = window.offset,
            limit = window.limit,
            "Requesting older history"
        );

        Some(FeedRequest::LoadPage {
            token: session.token,
            kind: PageKind::History,
            window,
        })
    }

    /// The "after layout, before paint" hook.
    pub fn after_layout(&mut self, viewport: &mut dyn Viewport) -> ScrollAction {
        match self.session.as_mut() {
            Some(session) => session.anchor.after_layout(viewport),
            None => ScrollAction::Unchanged,
        }
    }

    pub fn set_draft(&mut self, text: impl Into<String>) {
        if let Some(session) = self.session.as_mut() {
            session.composer.set_draft(text);
        }
    }

    pub fn set_message_kind(&mut self, kind: MessageKind) {
        if let Some(session) = self.session.as_mut() {
            session.composer.set_kind(kind);
        }
    }

    /// Replace the draft with `content` and submit it.
    pub fn send(&mut self, content: &str) -> Option<FeedRequest> {
        self.set_draft(content);
        self.submit()
    }

    /// Submit the current draft. Blank drafts, a pending send and a session
    /// still waiting for its first page are no-ops.
    pub fn submit(&mut self) -> Option<FeedRequest> {
        if !matches!(self.phase, FeedPhase::Ready | FeedPhase::LoadingHistory) {
            return None;
        }
        let session = self.session.as_mut()?;
        let message = session.composer.submit(session.token.chat_id)?;
        debug!(chat = %message.chat_id, kind = ?message.kind, "Sending message");
        Some(FeedRequest::Send {
            token: session.token,
            message,
        })
    }

    // -----------------------------------------------------------------------
    // Push and completions
    // -----------------------------------------------------------------------

    /// A push signal for `token`'s chat. The payload is never trusted: the
    /// newest message is refetched instead.
    pub fn on_push(&mut self, token: SessionToken) -> Option<FeedRequest> {
        let session = self.session.as_mut().filter(|s| s.token == token);
        let Some(session) = session else {
            debug!(chat = %token.chat_id, "Ignoring push for inactive session");
            return None;
        };

        if self.phase == FeedPhase::LoadingInitial {
            session.latest_deferred = true;
            return None;
        }
        Some(FeedRequest::FetchLatest { token })
    }

    pub fn handle(&mut self, event: FeedEvent) -> Vec<FeedRequest> {
        match event {
            FeedEvent::Push(token) => self.on_push(token).into_iter().collect(),
            FeedEvent::Completion(completion) => self.on_completion(completion),
        }
    }

    /// Apply the outcome of a request. Returns follow-up requests.
    pub fn on_completion(&mut self, completion: FeedCompletion) -> Vec<FeedRequest> {
        let token = completion.token();
        let Some(session) = self.session.as_mut().filter(|s| s.token == token) else {
            debug!(
                chat = %token.chat_id,
                generation = token.generation,
                "Discarding completion for stale session"
            );
            return Vec::new();
        };
        let chat = token.chat_id;

        match completion {
            FeedCompletion::Page {
                kind: PageKind::Initial,
                result,
                ..
            } => {
                self.phase = FeedPhase::Ready;
                let deferred = std::mem::take(&mut session.latest_deferred);
                match result {
                    Ok(page) => {
                        let len = page.len();
                        session.store.initialize(page);
                        session.pager.record_page(len);
                        session.anchor.on_initial_page();
                        info!(chat = %chat, count = len, has_more = session.pager.has_more(), "Initial page loaded");
                        if deferred {
                            return vec![FeedRequest::FetchLatest { token }];
                        }
                    }
                    Err(e) => {
                        warn!(chat = %chat, error = %e, "Failed to load initial page");
                    }
                }
            }

            FeedCompletion::Page {
                kind: PageKind::History,
                result,
                ..
            } => {
                self.phase = FeedPhase::Ready;
                match result {
                    Ok(page) => {
                        let len = page.len();
                        let added = session.store.prepend(page);
                        session.pager.record_page(len);
                        session.anchor.on_prepended(added);
                        debug!(
                            chat = %chat,
                            received = len,
                            added,
                            total = session.store.len(),
                            has_more = session.pager.has_more(),
                            "History page merged"
                        );
                    }
                    Err(e) => {
                        session.anchor.cancel_prepend();
                        warn!(chat = %chat, error = %e, "Failed to load history page");
                    }
                }
            }

            FeedCompletion::Latest { result, .. } => match result {
                Ok(Some(message)) => {
                    let msg_id = message.id;
                    if session.store.insert_if_absent(message) {
                        session.anchor.on_live_arrival();
                        debug!(chat = %chat, msg_id = %msg_id, "Live message merged");
                    }
                }
                Ok(None) => debug!(chat = %chat, "Push refetch returned no message"),
                Err(e) => warn!(chat = %chat, error = %e, "Failed to fetch pushed message"),
            },

            FeedCompletion::Sent { result, .. } => match result {
                Ok(message) => {
                    let msg_id = message.id;
                    let appended = session.store.insert_if_absent(message);
                    session.composer.on_sent();
                    session.anchor.on_sent(appended);
                    info!(chat = %chat, msg_id = %msg_id, "Message sent");
                }
                Err(e) => {
                    session.composer.on_failed();
                    warn!(chat = %chat, error = %e, "Failed to send message");
                }
            },
        }
        Vec::new()
    }
}

impl Default for ChatFeed {
    fn default() -> Self {
        Self::new(FeedSettings::default())
    }
}
