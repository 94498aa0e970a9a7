//! `SQLite` schema for the response cache.

/// Cached response bodies, keyed by the blake3 hash of the request URL.
pub const CREATE_RESPONSES_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS responses (
    url_hash TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    body TEXT NOT NULL,
    fetched_at TEXT NOT NULL
)
";

/// Pruning walks entries by age.
pub const CREATE_FETCHED_AT_INDEX: &str = r"
CREATE INDEX IF NOT EXISTS idx_responses_fetched_at ON responses(fetched_at)
";

/// Key-value metadata, currently only the schema version.
pub const CREATE_METADATA_TABLE: &str = r"
CREATE TABLE IF NOT EXISTS metadata (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
)
";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_responses_table_columns() {
        assert!(CREATE_RESPONSES_TABLE.contains("url_hash TEXT PRIMARY KEY"));
        assert!(CREATE_RESPONSES_TABLE.contains("body TEXT NOT NULL"));
        assert!(CREATE_RESPONSES_TABLE.contains("fetched_at TEXT NOT NULL"));
    }

    #[test]
    fn test_metadata_table_structure() {
        assert!(CREATE_METADATA_TABLE.contains("key TEXT PRIMARY KEY"));
    }
}
