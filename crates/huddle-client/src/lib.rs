pub mod anchor;
pub mod bridge;
pub mod composer;
pub mod config;
pub mod error;
pub mod feed;
pub mod pagination;
pub mod runtime;

pub use anchor::{ScrollAction, ScrollAnchor, Viewport, VirtualViewport};
pub use config::FeedConfig;
pub use error::{ClientError, Result};
pub use feed::{ChatFeed, FeedEvent, FeedPhase, FeedRequest, FeedSettings, SessionToken};
pub use runtime::FeedController;

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global tracing subscriber. `RUST_LOG` overrides the default filter.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("huddle_client_lib=debug,huddle_net=debug,huddle_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}
