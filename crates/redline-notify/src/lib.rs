//! Notifications sent when a review completes.

pub mod slack;

pub use slack::{ReviewNotice, review_blocks};

#[cfg(feature = "http")]
pub mod http;

#[cfg(feature = "http")]
pub use http::{NotifyError, SlackNotifier};
