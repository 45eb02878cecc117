use chrono::Utc;
use sqlx::SqliteConnection;

use crate::traits::GatewayDatabaseError;

pub async fn save_ach_file(file_id: &str, contents: &str, conn: &mut SqliteConnection) -> Result<(), GatewayDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO ach_files (id, contents, created_at) VALUES ($1, $2, $3)
            ON CONFLICT (id) DO UPDATE SET contents = excluded.contents;
        "#,
    )
    .bind(file_id)
    .bind(contents)
    .bind(Utc::now())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_ach_file(file_id: &str, conn: &mut SqliteConnection) -> Result<Option<String>, GatewayDatabaseError> {
    let contents =
        sqlx::query_scalar("SELECT contents FROM ach_files WHERE id = $1").bind(file_id).fetch_optional(conn).await?;
    Ok(contents)
}
