pub mod document;
pub mod patient;
pub mod summary;

pub use document::*;
pub use patient::*;
pub use summary::*;

/// Storage format for timestamps. Kept to whole seconds so stored values
/// roundtrip exactly.
pub(crate) const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

pub(crate) fn parse_timestamp(s: &str) -> chrono::NaiveDateTime {
    chrono::NaiveDateTime::parse_from_str(s, TIMESTAMP_FORMAT)
        .or_else(|_| chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S"))
        .unwrap_or_default()
}
