/// Server-assigned row identifiers are opaque strings (UUIDs on the hosted store).
pub type RecordId = String;

/// Identifier of the authenticated account that owns a row.
pub type UserId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
