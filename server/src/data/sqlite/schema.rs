//! SQLite schema and statements for the destination table
//!
//! The table name is validated as a plain identifier before it reaches these
//! builders.

/// Destination table
pub fn create_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    date_time TEXT NOT NULL,
    metrics_name TEXT NOT NULL,
    value TEXT NOT NULL
)"#
    )
}

/// Unique index over the deduplication key
pub fn create_unique_index(table: &str) -> String {
    format!(
        "CREATE UNIQUE INDEX IF NOT EXISTS uq_{table}_row ON {table} (date_time, metrics_name, value)"
    )
}

/// Insert-if-absent; binds `date_time, metrics_name, value` twice
pub fn insert_if_absent(table: &str) -> String {
    format!(
        r#"
INSERT INTO {table} (date_time, metrics_name, value)
SELECT ?, ?, ?
WHERE NOT EXISTS (
    SELECT 1 FROM {table}
    WHERE date_time = ? AND metrics_name = ? AND value = ?
)
ON CONFLICT DO NOTHING"#
    )
}

pub fn count_rows(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {table}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_statements_use_table_name() {
        assert!(create_table("samples").contains("CREATE TABLE IF NOT EXISTS samples"));
        assert!(create_unique_index("samples").contains("uq_samples_row ON samples"));
        assert_eq!(insert_if_absent("samples").matches("samples").count(), 2);
    }

    #[test]
    fn test_insert_binds_six_parameters() {
        assert_eq!(insert_if_absent("t").matches('?').count(), 6);
    }
}
