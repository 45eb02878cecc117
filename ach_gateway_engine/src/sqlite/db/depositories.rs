use chrono::Utc;
use sqlx::SqliteConnection;

use crate::{
    db_types::{Depository, DepositoryStatus, NewDepository},
    traits::GatewayDatabaseError,
};

pub async fn insert_depository(
    depository: NewDepository,
    conn: &mut SqliteConnection,
) -> Result<Depository, GatewayDatabaseError> {
    let id = depository.id.clone();
    let now = Utc::now();
    let depository = sqlx::query_as(
        r#"
            INSERT INTO depositories (id, user_id, routing_number, account_number, status, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $6)
            RETURNING *;
        "#,
    )
    .bind(depository.id)
    .bind(depository.user_id)
    .bind(depository.routing_number)
    .bind(depository.account_number)
    .bind(depository.status)
    .bind(now)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => {
            GatewayDatabaseError::AlreadyExists(format!("Depository {id}"))
        },
        _ => GatewayDatabaseError::from(e),
    })?;
    Ok(depository)
}

pub async fn fetch_depository(id: &str, conn: &mut SqliteConnection) -> Result<Option<Depository>, GatewayDatabaseError> {
    let depository = sqlx::query_as("SELECT * FROM depositories WHERE id = $1").bind(id).fetch_optional(conn).await?;
    Ok(depository)
}

pub async fn lookup_depository(
    user_id: &str,
    routing_number: &str,
    account_number: Option<&str>,
    conn: &mut SqliteConnection,
) -> Result<Option<Depository>, GatewayDatabaseError> {
    let depository = sqlx::query_as(
        r#"
            SELECT * FROM depositories
            WHERE user_id = $1 AND routing_number = $2 AND ($3 IS NULL OR account_number = $3)
            ORDER BY created_at DESC
            LIMIT 1;
        "#,
    )
    .bind(user_id)
    .bind(routing_number)
    .bind(account_number)
    .fetch_optional(conn)
    .await?;
    Ok(depository)
}

pub async fn update_status(
    id: &str,
    status: DepositoryStatus,
    conn: &mut SqliteConnection,
) -> Result<Depository, GatewayDatabaseError> {
    let depository = sqlx::query_as("UPDATE depositories SET status = $1, updated_at = $2 WHERE id = $3 RETURNING *")
        .bind(status)
        .bind(Utc::now())
        .bind(id)
        .fetch_optional(conn)
        .await?
        .ok_or_else(|| GatewayDatabaseError::DepositoryNotFound(id.to_string()))?;
    Ok(depository)
}
