//! Scroll anchoring for the message list.
//!
//! Three behaviours compete for the scroll position:
//!
//! - the first page pins the viewport to the bottom, once per session;
//! - a prepended history page must leave the previously visible rows exactly
//!   where they were, so the added height is added to the scroll offset;
//! - a live arrival only follows the bottom when the user was already near it.
//!
//! Mutations record a [`PendingScroll`] intent. The view calls
//! [`ScrollAnchor::after_layout`] once the new rows are laid out and before
//! they are painted, which is the only point where the grown
//! `scroll_height` can be measured without the user seeing a jump.

use tracing::debug;

/// The scroll container as seen by the anchor.
pub trait Viewport {
    /// Current scroll offset from the top edge.
    fn scroll_top(&self) -> f64;
    /// Total laid-out content height.
    fn scroll_height(&self) -> f64;
    /// Visible height of the container.
    fn client_height(&self) -> f64;
    /// Jump to an offset without animation.
    fn set_scroll_top(&mut self, top: f64);
    /// Laid-out height of the last `rows` rows.
    fn tail_height(&self, rows: usize) -> f64;

    /// Animate to an offset. Views without animation jump.
    fn smooth_scroll_to(&mut self, top: f64) {
        self.set_scroll_top(top);
    }

    fn max_scroll_top(&self) -> f64 {
        (self.scroll_height() - self.client_height()).max(0.0)
    }

    fn distance_from_bottom(&self) -> f64 {
        (self.scroll_height() - self.scroll_top() - self.client_height()).max(0.0)
    }

    fn is_at_top(&self) -> bool {
        self.scroll_top() <= 0.0
    }
}

/// Scroll adjustment waiting for the next layout.
///
/// When several mutations land before one layout, the strongest intent wins
/// (declaration order, weakest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum PendingScroll {
    None,
    /// A live message arrived: follow only if the user was near the bottom.
    FollowIfNear,
    /// An older page was prepended: keep the visible rows stationary.
    RestoreAfterPrepend,
    /// The user sent a message: always show it.
    ForceBottom,
    /// The first page of the session rendered.
    PinBottom,
}

/// Whether the one-shot bottom pin of the session has happened yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnchorPhase {
    FirstLoad,
    Steady,
}

/// What [`ScrollAnchor::after_layout`] did to the viewport.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScrollAction {
    /// Nothing was pending, or a live arrival found the user scrolled away.
    Unchanged,
    PinnedToBottom,
    ScrolledToBottom,
    /// Offset moved by the height of the prepended rows.
    Restored { scroll_top: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum HistoryCapture {
    Idle,
    /// Request in flight; measurements refreshed on every layout until it lands.
    /// `tail_rows` counts rows appended at the bottom since the last measurement.
    Awaiting {
        height_before: f64,
        top_before: f64,
        tail_rows: usize,
    },
    /// Page merged into the store; the next layout restores.
    Landed {
        height_before: f64,
        top_before: f64,
        tail_rows: usize,
    },
}

#[derive(Debug, Clone)]
pub struct ScrollAnchor {
    phase: AnchorPhase,
    pending: PendingScroll,
    history: HistoryCapture,
    /// Distance from the bottom at the last observation, i.e. before any
    /// not-yet-laid-out arrival.
    last_distance: f64,
    bottom_threshold: f64,
}

impl ScrollAnchor {
    pub fn new(bottom_threshold: f64) -> Self {
        Self {
            phase: AnchorPhase::FirstLoad,
            pending: PendingScroll::None,
            history: HistoryCapture::Idle,
            last_distance: 0.0,
            bottom_threshold,
        }
    }

    pub fn phase(&self) -> AnchorPhase {
        self.phase
    }

    pub fn pending(&self) -> PendingScroll {
        self.pending
    }

    pub fn bottom_threshold(&self) -> f64 {
        self.bottom_threshold
    }

    /// Whether the last observed position was close enough to follow arrivals.
    pub fn is_near_bottom(&self) -> bool {
        self.last_distance < self.bottom_threshold
    }

    /// Remember where the user is. Called on every scroll event.
    pub fn observe(&mut self, viewport: &dyn Viewport) {
        self.last_distance = viewport.distance_from_bottom();
    }

    /// Snapshot the content height right before an older page is requested.
    pub fn capture_before_prepend(&mut self, viewport: &dyn Viewport) {
        self.history = HistoryCapture::Awaiting {
            height_before: viewport.scroll_height(),
            top_before: viewport.scroll_top(),
            tail_rows: 0,
        };
    }

    /// The history request failed or was abandoned.
    pub fn cancel_prepend(&mut self) {
        self.history = HistoryCapture::Idle;
    }

    pub fn on_initial_page(&mut self) {
        if self.phase == AnchorPhase::FirstLoad {
            self.request(PendingScroll::PinBottom);
        }
    }

    /// An older page landed in the store with `added` new rows.
    pub fn on_prepended(&mut self, added: usize) {
        match self.history {
            HistoryCapture::Awaiting {
                height_before,
                top_before,
                tail_rows,
            } if added > 0 => {
                self.history = HistoryCapture::Landed {
                    height_before,
                    top_before,
                    tail_rows,
                };
                self.request(PendingScroll::RestoreAfterPrepend);
            }
            _ => self.history = HistoryCapture::Idle,
        }
    }

    /// A live message was appended at the bottom.
    pub fn on_live_arrival(&mut self) {
        self.grow_tail();
        self.request(PendingScroll::FollowIfNear);
    }

    /// The user's message was confirmed. `appended` is false when a push
    /// already merged it.
    pub fn on_sent(&mut self, appended: bool) {
        if appended {
            self.grow_tail();
        }
        self.request(PendingScroll::ForceBottom);
    }

    fn grow_tail(&mut self) {
        match &mut self.history {
            HistoryCapture::Awaiting { tail_rows, .. } | HistoryCapture::Landed { tail_rows, .. } => {
                *tail_rows += 1;
            }
            HistoryCapture::Idle => {}
        }
    }

    fn request(&mut self, intent: PendingScroll) {
        if intent > self.pending {
            self.pending = intent;
        }
    }

    /// Apply the pending intent against the freshly laid-out viewport.
    ///
    /// Must run after layout and before paint.
    pub fn after_layout(&mut self, viewport: &mut dyn Viewport) -> ScrollAction {
        let intent = std::mem::replace(&mut self.pending, PendingScroll::None);

        let action = match intent {
            PendingScroll::None => ScrollAction::Unchanged,
            PendingScroll::PinBottom => {
                viewport.set_scroll_top(viewport.max_scroll_top());
                self.phase = AnchorPhase::Steady;
                ScrollAction::PinnedToBottom
            }
            PendingScroll::ForceBottom => {
                viewport.smooth_scroll_to(viewport.max_scroll_top());
                ScrollAction::ScrolledToBottom
            }
            PendingScroll::RestoreAfterPrepend => match self.history {
                HistoryCapture::Landed {
                    height_before,
                    top_before,
                    tail_rows,
                } => {
                    // Rows appended at the bottom in the same frame are not prepended height.
                    let grown = viewport.scroll_height() - viewport.tail_height(tail_rows);
                    let added = (grown - height_before).max(0.0);
                    let target = top_before + added;
                    viewport.set_scroll_top(target);
                    ScrollAction::Restored { scroll_top: target }
                }
                _ => ScrollAction::Unchanged,
            },
            PendingScroll::FollowIfNear => {
                if self.is_near_bottom() {
                    viewport.smooth_scroll_to(viewport.max_scroll_top());
                    ScrollAction::ScrolledToBottom
                } else {
                    ScrollAction::Unchanged
                }
            }
        };

        self.history = match self.history {
            // Landed pages are consumed by this layout, restored or overridden.
            HistoryCapture::Landed { .. } | HistoryCapture::Idle => HistoryCapture::Idle,
            // Rows laid out below while the page is in flight would otherwise be
            // counted as prepended height.
            HistoryCapture::Awaiting { .. } => HistoryCapture::Awaiting {
                height_before: viewport.scroll_height(),
                top_before: viewport.scroll_top(),
                tail_rows: 0,
            },
        };

        self.observe(viewport);
        if action != ScrollAction::Unchanged {
            debug!(?intent, ?action, "Scroll adjusted after layout");
        }
        action
    }
}

/// A viewport over uniformly tall rows, for terminals and tests.
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualViewport {
    row_height: f64,
    rows: usize,
    client_height: f64,
    scroll_top: f64,
}

impl VirtualViewport {
    pub fn new(row_height: f64, client_height: f64) -> Self {
        Self {
            row_height,
            rows: 0,
            client_height,
            scroll_top: 0.0,
        }
    }

    /// Lay out `rows` rows. Growth keeps the offset; shrinking clamps it.
    pub fn layout(&mut self, rows: usize) {
        self.rows = rows;
        self.scroll_top = self.scroll_top.min(self.max_scroll_top());
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn row_height(&self) -> f64 {
        self.row_height
    }

    /// Index of the first visible row.
    pub fn first_visible_row(&self) -> usize {
        if self.row_height <= 0.0 {
            return 0;
        }
        (self.scroll_top / self.row_height).floor() as usize
    }
}

impl Viewport for VirtualViewport {
    fn scroll_top(&self) -> f64 {
        self.scroll_top
    }

    fn scroll_height(&self) -> f64 {
        self.rows as f64 * self.row_height
    }

    fn client_height(&self) -> f64 {
        self.client_height
    }

    fn set_scroll_top(&mut self, top: f64) {
        self.scroll_top = top.clamp(0.0, self.max_scroll_top());
    }

    fn tail_height(&self, rows: usize) -> f64 {
        rows.min(self.rows) as f64 * self.row_height
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn viewport(rows: usize) -> VirtualViewport {
        let mut vp = VirtualViewport::new(10.0, 100.0);
        vp.layout(rows);
        vp
    }

    fn steady_anchor(vp: &mut VirtualViewport) -> ScrollAnchor {
        let mut anchor = ScrollAnchor::new(100.0);
        anchor.on_initial_page();
        anchor.after_layout(vp);
        anchor
    }

    #[test]
    fn test_initial_pin_happens_once() {
        let mut vp = viewport(20);
        let mut anchor = ScrollAnchor::new(100.0);

        anchor.on_initial_page();
        assert_eq!(anchor.after_layout(&mut vp), ScrollAction::PinnedToBottom);
        assert_eq!(vp.scroll_top(), 100.0);
        assert_eq!(anchor.phase(), AnchorPhase::Steady);

        vp.set_scroll_top(0.0);
        anchor.on_initial_page();
        assert_eq!(anchor.after_layout(&mut vp), ScrollAction::Unchanged);
        assert_eq!(vp.scroll_top(), 0.0);
    }

    #[test]
    fn test_prepend_keeps_content_stationary() {
        let mut vp = viewport(20);
        let mut anchor = steady_anchor(&mut vp);

        vp.set_scroll_top(0.0);
        anchor.capture_before_prepend(&vp);
        vp.layout(40);
        anchor.on_prepended(20);

        assert_eq!(
            anchor.after_layout(&mut vp),
            ScrollAction::Restored { scroll_top: 200.0 }
        );
        assert_eq!(vp.first_visible_row(), 20);
    }

    #[test]
    fn test_prepend_from_nonzero_offset() {
        let mut vp = viewport(30);
        let mut anchor = steady_anchor(&mut vp);

        vp.set_scroll_top(15.0);
        anchor.capture_before_prepend(&vp);
        vp.layout(37);
        anchor.on_prepended(7);
        anchor.after_layout(&mut vp);

        assert_eq!(vp.scroll_top(), 15.0 + 70.0);
    }

    #[test]
    fn test_arrival_during_history_fetch_not_counted() {
        let mut vp = viewport(30);
        let mut anchor = steady_anchor(&mut vp);

        vp.set_scroll_top(0.0);
        anchor.observe(&vp);
        anchor.capture_before_prepend(&vp);

        // A live message renders at the bottom while the page is in flight.
        vp.layout(31);
        anchor.on_live_arrival();
        assert_eq!(anchor.after_layout(&mut vp), ScrollAction::Unchanged);

        vp.layout(51);
        anchor.on_prepended(20);
        anchor.after_layout(&mut vp);
        assert_eq!(vp.scroll_top(), 200.0);
    }

    #[test]
    fn test_follow_only_near_bottom() {
        let mut vp = viewport(50);
        let mut anchor = steady_anchor(&mut vp);
        assert_eq!(vp.scroll_top(), 400.0);

        vp.layout(51);
        anchor.on_live_arrival();
        assert_eq!(anchor.after_layout(&mut vp), ScrollAction::ScrolledToBottom);
        assert_eq!(vp.scroll_top(), 410.0);

        vp.set_scroll_top(200.0);
        anchor.observe(&vp);
        vp.layout(52);
        anchor.on_live_arrival();
        assert_eq!(anchor.after_layout(&mut vp), ScrollAction::Unchanged);
        assert_eq!(vp.scroll_top(), 200.0);
    }

    #[test]
    fn test_threshold_boundary() {
        let mut vp = viewport(50);
        let mut anchor = steady_anchor(&mut vp);

        vp.set_scroll_top(301.0);
        anchor.observe(&vp);
        assert!(anchor.is_near_bottom());

        // Exactly at the threshold is not "below" it.
        vp.set_scroll_top(300.0);
        anchor.observe(&vp);
        assert!(!anchor.is_near_bottom());
    }

    #[test]
    fn test_send_forces_bottom() {
        let mut vp = viewport(50);
        let mut anchor = steady_anchor(&mut vp);

        vp.set_scroll_top(0.0);
        anchor.observe(&vp);
        vp.layout(51);
        anchor.on_live_arrival();
        anchor.on_sent(true);
        assert_eq!(anchor.pending(), PendingScroll::ForceBottom);

        assert_eq!(anchor.after_layout(&mut vp), ScrollAction::ScrolledToBottom);
        assert_eq!(vp.scroll_top(), 410.0);
    }

    #[test]
    fn test_arrival_and_prepend_in_one_frame() {
        let mut vp = viewport(30);
        let mut anchor = steady_anchor(&mut vp);

        vp.set_scroll_top(0.0);
        anchor.observe(&vp);
        anchor.capture_before_prepend(&vp);

        // Both merges land before the view lays out again.
        anchor.on_live_arrival();
        anchor.on_prepended(10);
        anchor.on_sent(true);
        vp.layout(42);

        assert_eq!(
            anchor.after_layout(&mut vp),
            ScrollAction::ScrolledToBottom
        );

        vp.set_scroll_top(0.0);
        anchor.observe(&vp);
        anchor.capture_before_prepend(&vp);
        anchor.on_live_arrival();
        anchor.on_prepended(7);
        vp.layout(50);

        assert_eq!(
            anchor.after_layout(&mut vp),
            ScrollAction::Restored { scroll_top: 70.0 }
        );
        assert_eq!(vp.first_visible_row(), 7);
    }

    #[test]
    fn test_empty_history_page_clears_capture() {
        let mut vp = viewport(20);
        let mut anchor = steady_anchor(&mut vp);

        vp.set_scroll_top(0.0);
        anchor.capture_before_prepend(&vp);
        anchor.on_prepended(0);
        assert_eq!(anchor.pending(), PendingScroll::None);
        assert_eq!(anchor.after_layout(&mut vp), ScrollAction::Unchanged);
    }

    #[test]
    fn test_intent_priority() {
        assert!(PendingScroll::PinBottom > PendingScroll::ForceBottom);
        assert!(PendingScroll::ForceBottom > PendingScroll::RestoreAfterPrepend);
        assert!(PendingScroll::RestoreAfterPrepend > PendingScroll::FollowIfNear);
        assert!(PendingScroll::FollowIfNear > PendingScroll::None);
    }
}
