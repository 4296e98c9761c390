//! External report ingress
//!
//! Report schemas, the authentication boundary and normalization into events.

mod normalize;
mod report;
mod validator;

pub use normalize::{
    default_identity_fields, status_severity, truncate, Normalizer, MAX_MESSAGE_CHARS,
    MAX_TITLE_CHARS, NEWS_CATEGORY, STATUS_CATEGORY,
};
pub use report::{EventReport, NewsUpdate, RawReport, ReportKind, StatusReport};
pub use validator::{ApiKeyValidator, IngressValidator};
