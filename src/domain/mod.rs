//! Domain models for herald
//!
//! This module contains the event model shared by every pipeline stage.
//! Types are validated on construction (fail-fast pattern).

pub mod channel;
pub mod event;
pub mod metadata;
pub mod severity;

pub use channel::ChannelId;
pub use event::{dedupe_key, Event, EventBuilder, EventId, EventSource};
pub use metadata::{Metadata, MetadataValue};
pub use severity::Severity;
