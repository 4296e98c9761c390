//! Notification boundary
//!
//! The delivery worker talks to chat transports only through [`Notifier`].

mod format;
mod terminal;

pub use format::MessageFormatter;
pub use terminal::TerminalNotifier;

use crate::domain::ChannelId;
use crate::error::SendError;

/// Notification channel trait
///
/// Implementations map transport failures onto [`SendError`] so the worker
/// can choose between rescheduling, retrying and giving up.
pub trait Notifier: Send + Sync {
    /// Send text to the named channel
    fn send(&self, channel: &ChannelId, text: &str) -> Result<(), SendError>;

    /// Transport name for identification
    fn name(&self) -> &str;
}
