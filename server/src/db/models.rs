/// Database row types.
/// These correspond 1:1 to the SQLite schema defined in migrations.rs.

/// Metadata for one stored version of a user's domain settings, without
/// the payload. `created_at` is microseconds since the Unix epoch (UTC).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRow {
    pub id: i64,
    pub created_at: i64,
    pub size: i64,
}
