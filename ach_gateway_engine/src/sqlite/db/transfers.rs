use chrono::{NaiveDate, Utc};
use log::*;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Cents, GroupableTransfer, NewTransfer, PageCursor, Transfer, TransferStatus},
    traits::GatewayDatabaseError,
};

pub async fn insert_transfer(
    transfer: NewTransfer,
    conn: &mut SqliteConnection,
) -> Result<Transfer, GatewayDatabaseError> {
    let id = transfer.id.clone();
    let now = Utc::now();
    let transfer = sqlx::query_as(
        r#"
            INSERT INTO transfers (
                id, user_id, amount, standard_entry_class_code, trace_number, effective_entry_date, file_id,
                origin_routing_number, transaction_id, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(transfer.id)
    .bind(transfer.user_id)
    .bind(transfer.amount)
    .bind(transfer.standard_entry_class_code)
    .bind(transfer.trace_number)
    .bind(transfer.effective_entry_date)
    .bind(transfer.file_id)
    .bind(transfer.origin_routing_number)
    .bind(transfer.transaction_id)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            GatewayDatabaseError::AlreadyExists(format!("Transfer {id}"))
        },
        _ => GatewayDatabaseError::from(e),
    })?;
    Ok(transfer)
}

pub async fn fetch_transfer(id: &str, conn: &mut SqliteConnection) -> Result<Option<Transfer>, GatewayDatabaseError> {
    let transfer = sqlx::query_as("SELECT * FROM transfers WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(transfer)
}

pub async fn fetch_pending_transfers(
    cursor: &PageCursor,
    limit: u32,
    conn: &mut SqliteConnection,
) -> Result<Vec<GroupableTransfer>, GatewayDatabaseError> {
    let transfers = sqlx::query_as(
        r#"
            SELECT id AS transfer_id, user_id, origin_routing_number, file_id, created_at
            FROM transfers
            WHERE status = 'pending' AND merged_filename IS NULL
              AND (created_at > $1 OR (created_at = $1 AND id > $2))
            ORDER BY created_at, id
            LIMIT $3;
        "#,
    )
    .bind(cursor.created_at)
    .bind(cursor.id.as_str())
    .bind(limit)
    .fetch_all(conn)
    .await?;
    Ok(transfers)
}

pub async fn mark_transfer_as_merged(
    transfer_id: &str,
    filename: &str,
    conn: &mut SqliteConnection,
) -> Result<(), GatewayDatabaseError> {
    let result = sqlx::query("UPDATE transfers SET merged_filename = $1, updated_at = $2 WHERE id = $3")
        .bind(filename)
        .bind(Utc::now())
        .bind(transfer_id)
        .execute(conn)
        .await?;
    if result.rows_affected() == 0 {
        return Err(GatewayDatabaseError::TransferNotFound(transfer_id.to_string()));
    }
    trace!("🗃️ Transfer {transfer_id} merged into {filename}");
    Ok(())
}

pub async fn lookup_transfer_from_return(
    sec_code: &str,
    amount: Cents,
    trace_number: &str,
    effective_entry_date: NaiveDate,
    conn: &mut SqliteConnection,
) -> Result<Option<Transfer>, GatewayDatabaseError> {
    let transfer = sqlx::query_as(
        r#"
            SELECT * FROM transfers
            WHERE standard_entry_class_code = $1 AND amount = $2 AND trace_number = $3 AND effective_entry_date = $4
            ORDER BY created_at DESC
            LIMIT 1;
        "#,
    )
    .bind(sec_code)
    .bind(amount)
    .bind(trace_number)
    .bind(effective_entry_date)
    .fetch_optional(conn)
    .await?;
    Ok(transfer)
}

/// Moves a `pending` or `processed` transfer to `reclaimed` and records the return code.
pub async fn reclaim_transfer(
    transfer_id: &str,
    return_code: &str,
    conn: &mut SqliteConnection,
) -> Result<Transfer, GatewayDatabaseError> {
    let updated: Option<Transfer> = sqlx::query_as(
        r#"
            UPDATE transfers SET status = $1, return_code = $2, updated_at = $3
            WHERE id = $4 AND status IN ('pending', 'processed')
            RETURNING *;
        "#,
    )
    .bind(TransferStatus::Reclaimed)
    .bind(return_code)
    .bind(Utc::now())
    .bind(transfer_id)
    .fetch_optional(&mut *conn)
    .await?;
    match updated {
        Some(transfer) => Ok(transfer),
        None => match fetch_transfer(transfer_id, conn).await? {
            Some(t) => Err(GatewayDatabaseError::TransferNotReclaimable(t.id, t.status)),
            None => Err(GatewayDatabaseError::TransferNotFound(transfer_id.to_string())),
        },
    }
}
