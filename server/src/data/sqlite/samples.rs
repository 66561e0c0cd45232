//! Sample rows on SQLite

use sqlx::SqlitePool;

use super::schema;
use crate::data::error::is_unique_violation;
use crate::data::types::{ExtractedRow, InsertOutcome};

/// Create the table, then try the unique index
///
/// Returns false when the index could not be built because the table already
/// holds duplicate rows.
pub async fn ensure_schema(pool: &SqlitePool, table: &str) -> Result<bool, sqlx::Error> {
    sqlx::query(&schema::create_table(table))
        .execute(pool)
        .await?;

    match sqlx::query(&schema::create_unique_index(table))
        .execute(pool)
        .await
    {
        Ok(_) => Ok(true),
        Err(e) if is_unique_violation(&e) => Ok(false),
        Err(e) => Err(e),
    }
}

pub async fn insert_if_absent(
    pool: &SqlitePool,
    table: &str,
    row: &ExtractedRow,
) -> Result<InsertOutcome, sqlx::Error> {
    let result = sqlx::query(&schema::insert_if_absent(table))
        .bind(&row.date_time)
        .bind(&row.metric_name)
        .bind(&row.value)
        .bind(&row.date_time)
        .bind(&row.metric_name)
        .bind(&row.value)
        .execute(pool)
        .await?;

    Ok(InsertOutcome::from_rows_affected(result.rows_affected()))
}

pub async fn count_rows(pool: &SqlitePool, table: &str) -> Result<u64, sqlx::Error> {
    let count: i64 = sqlx::query_scalar(&schema::count_rows(table))
        .fetch_one(pool)
        .await?;
    Ok(count.max(0) as u64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        assert!(ensure_schema(&pool, "monitoring").await.unwrap());
        pool
    }

    fn row(date_time: &str, name: &str, value: &str) -> ExtractedRow {
        ExtractedRow {
            date_time: date_time.to_string(),
            metric_name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_insert_then_duplicate() {
        let pool = setup().await;
        let r = row("2024-01-01", "cpu", "42.000000");

        assert_eq!(
            insert_if_absent(&pool, "monitoring", &r).await.unwrap(),
            InsertOutcome::Inserted
        );
        assert_eq!(
            insert_if_absent(&pool, "monitoring", &r).await.unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(count_rows(&pool, "monitoring").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_rows_differing_in_one_column_are_distinct() {
        let pool = setup().await;

        for r in [
            row("2024-01-01", "cpu", "42.000000"),
            row("2024-01-02", "cpu", "42.000000"),
            row("2024-01-01", "mem", "42.000000"),
            row("2024-01-01", "cpu", "43.000000"),
        ] {
            assert_eq!(
                insert_if_absent(&pool, "monitoring", &r).await.unwrap(),
                InsertOutcome::Inserted
            );
        }
        assert_eq!(count_rows(&pool, "monitoring").await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_ensure_schema_is_idempotent() {
        let pool = setup().await;
        insert_if_absent(&pool, "monitoring", &row("d", "n", "1.000000"))
            .await
            .unwrap();

        assert!(ensure_schema(&pool, "monitoring").await.unwrap());
        assert_eq!(count_rows(&pool, "monitoring").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_existing_duplicates_skip_index_but_not_guard() {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        // Table from an older deployment without the index, already holding duplicates
        sqlx::query(&schema::create_table("legacy"))
            .execute(&pool)
            .await
            .unwrap();
        for _ in 0..2 {
            sqlx::query("INSERT INTO legacy (date_time, metrics_name, value) VALUES ('d', 'n', '1.000000')")
                .execute(&pool)
                .await
                .unwrap();
        }

        assert!(!ensure_schema(&pool, "legacy").await.unwrap());
        assert_eq!(
            insert_if_absent(&pool, "legacy", &row("d", "n", "1.000000"))
                .await
                .unwrap(),
            InsertOutcome::Duplicate
        );
        assert_eq!(count_rows(&pool, "legacy").await.unwrap(), 2);
    }
}
