use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{MicroDeposit, NewMicroDeposit, PageCursor, UploadableMicroDeposit},
    traits::GatewayDatabaseError,
};

pub async fn insert_micro_deposit(
    deposit: NewMicroDeposit,
    conn: &mut SqliteConnection,
) -> Result<MicroDeposit, GatewayDatabaseError> {
    let deposit = sqlx::query_as(
        r#"
            INSERT INTO micro_deposits (depository_id, user_id, file_id, amount, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *;
        "#,
    )
    .bind(deposit.depository_id)
    .bind(deposit.user_id)
    .bind(deposit.file_id)
    .bind(deposit.amount)
    .bind(Utc::now())
    .fetch_one(conn)
    .await?;
    Ok(deposit)
}

pub async fn fetch_for_depository(
    depository_id: &str,
    conn: &mut SqliteConnection,
) -> Result<Vec<MicroDeposit>, GatewayDatabaseError> {
    let deposits = sqlx::query_as("SELECT * FROM micro_deposits WHERE depository_id = $1 ORDER BY id")
        .bind(depository_id)
        .fetch_all(conn)
        .await?;
    Ok(deposits)
}

/// Unmerged micro-deposits, one row per file.
pub async fn fetch_pending_micro_deposits(
    cursor: &PageCursor,
    limit: u32,
    conn: &mut SqliteConnection,
) -> Result<Vec<UploadableMicroDeposit>, GatewayDatabaseError> {
    let deposits = sqlx::query_as(
        r#"
            SELECT file_id, depository_id, user_id, MIN(created_at) AS created_at
            FROM micro_deposits
            WHERE merged_filename IS NULL
            GROUP BY file_id, depository_id, user_id
            HAVING MIN(created_at) > $1 OR (MIN(created_at) = $1 AND file_id > $2)
            ORDER BY created_at, file_id
            LIMIT $3;
        "#,
    )
    .bind(cursor.created_at)
    .bind(cursor.id.as_str())
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(deposits)
}

pub async fn mark_as_merged(
    file_id: &str,
    filename: &str,
    conn: &mut SqliteConnection,
) -> Result<(), GatewayDatabaseError> {
    let result = sqlx::query("UPDATE micro_deposits SET merged_filename = $1 WHERE file_id = $2")
        .bind(filename)
        .bind(file_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(GatewayDatabaseError::MicroDepositNotFound(file_id.to_string()));
    }
    Ok(())
}
