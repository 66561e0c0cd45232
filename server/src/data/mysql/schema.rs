//! MySQL schema and statements for the destination table

/// Name of the unique index (MySQL index names are scoped to their table)
pub const UNIQUE_INDEX_NAME: &str = "uq_row";

pub fn create_table(table: &str) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS {table} (
    id BIGINT NOT NULL AUTO_INCREMENT,
    date_time VARCHAR(255) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL,
    metrics_name VARCHAR(255) CHARACTER SET utf8mb4 COLLATE utf8mb4_bin NOT NULL,
    value DECIMAL(65,6) NOT NULL,
    PRIMARY KEY (id)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4"#
    )
}

/// Whether the unique index already exists; binds the table name
pub const UNIQUE_INDEX_EXISTS: &str = r#"
SELECT COUNT(*) FROM information_schema.statistics
WHERE table_schema = DATABASE() AND table_name = ? AND index_name = ?"#;

pub fn add_unique_index(table: &str) -> String {
    format!(
        "ALTER TABLE {table} ADD UNIQUE INDEX {UNIQUE_INDEX_NAME} (date_time, metrics_name, value)"
    )
}

/// Insert-if-absent through a derived table (MySQL cannot reference the
/// target table directly in the inserted SELECT); binds the row twice
///
/// Only unique-index conflicts are absorbed, by the no-op update; data errors
/// still fail the statement. A conflict is reported as one affected row, so a
/// duplicate that loses the race past `NOT EXISTS` counts as inserted.
pub fn insert_if_absent(table: &str) -> String {
    format!(
        r#"
INSERT INTO {table} (date_time, metrics_name, value)
SELECT * FROM (
    SELECT ? AS date_time, ? AS metrics_name, CAST(? AS DECIMAL(65,6)) AS value
) AS tmp
WHERE NOT EXISTS (
    SELECT 1 FROM {table}
    WHERE date_time = ? AND metrics_name = ? AND value = CAST(? AS DECIMAL(65,6))
)
ON DUPLICATE KEY UPDATE id = id"#
    )
}

pub fn count_rows(table: &str) -> String {
    format!("SELECT COUNT(*) FROM {table}")
}
