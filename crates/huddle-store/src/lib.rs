//! # huddle-store
//!
//! In-memory message store backing one open chat feed.
//!
//! The backend owns persistence. This crate only keeps the slice of a chat's
//! history the user has loaded so far, ordered by `created_at` and free of
//! duplicate ids, so the view can render it directly.

pub mod store;

pub use store::MessageStore;
