use std::path::PathBuf;

use log::*;
use sqlx::{FromRow, SqliteConnection};

use crate::{
    file_transfer::{CutoffTime, FileTransferConfig, FtpConfig, LocalConfig, SftpConfig, TransferProtocol},
    traits::GatewayDatabaseError,
};

#[derive(Debug, FromRow)]
struct CutoffRow {
    routing_number: String,
    cutoff: i64,
    location: String,
}

#[derive(Debug, FromRow)]
struct TransferConfigRow {
    routing_number: String,
    inbound_path: String,
    outbound_path: String,
    return_path: String,
    protocol: String,
    hostname: String,
    username: String,
    password: String,
    host_key_fingerprint: Option<String>,
    local_root: Option<String>,
}

impl TryFrom<TransferConfigRow> for FileTransferConfig {
    type Error = GatewayDatabaseError;

    fn try_from(row: TransferConfigRow) -> Result<Self, Self::Error> {
        let protocol = match row.protocol.as_str() {
            "ftp" => TransferProtocol::Ftp(FtpConfig {
                hostname: row.hostname,
                username: row.username,
                password: row.password.into(),
            }),
            "sftp" => TransferProtocol::Sftp(SftpConfig {
                hostname: row.hostname,
                username: row.username,
                password: row.password.into(),
                host_key_fingerprint: row.host_key_fingerprint.filter(|k| !k.trim().is_empty()),
            }),
            "local" => {
                let root = row.local_root.ok_or_else(|| {
                    GatewayDatabaseError::InvalidData(format!("Local config for {} has no root", row.routing_number))
                })?;
                TransferProtocol::Local(LocalConfig { root: PathBuf::from(root) })
            },
            p => {
                return Err(GatewayDatabaseError::InvalidData(format!(
                    "Unknown protocol '{p}' for {}",
                    row.routing_number
                )))
            },
        };
        Ok(FileTransferConfig {
            routing_number: row.routing_number,
            inbound_path: row.inbound_path,
            outbound_path: row.outbound_path,
            return_path: row.return_path,
            protocol,
        })
    }
}

pub async fn fetch_cutoff_times(conn: &mut SqliteConnection) -> Result<Vec<CutoffTime>, GatewayDatabaseError> {
    let rows: Vec<CutoffRow> =
        sqlx::query_as("SELECT routing_number, cutoff, location FROM cutoff_times ORDER BY routing_number")
            .fetch_all(conn)
            .await?;
    let cutoffs = rows
        .into_iter()
        .filter_map(|row| {
            let cutoff = u16::try_from(row.cutoff).unwrap_or(u16::MAX);
            match CutoffTime::new(&row.routing_number, cutoff, &row.location) {
                Ok(c) => Some(c),
                Err(e) => {
                    warn!("🗃️ Ignoring cutoff time for {}. {e}", row.routing_number);
                    None
                },
            }
        })
        .collect();
    Ok(cutoffs)
}

pub async fn upsert_cutoff_time(cutoff: &CutoffTime, conn: &mut SqliteConnection) -> Result<(), GatewayDatabaseError> {
    sqlx::query(
        r#"
            INSERT INTO cutoff_times (routing_number, cutoff, location) VALUES ($1, $2, $3)
            ON CONFLICT (routing_number) DO UPDATE SET cutoff = excluded.cutoff, location = excluded.location;
        "#,
    )
    .bind(cutoff.routing_number())
    .bind(i64::from(cutoff.cutoff()))
    .bind(cutoff.timezone().name())
    .execute(conn)
    .await?;
    Ok(())
}

pub async fn fetch_file_transfer_configs(
    conn: &mut SqliteConnection,
) -> Result<Vec<FileTransferConfig>, GatewayDatabaseError> {
    let rows: Vec<TransferConfigRow> =
        sqlx::query_as("SELECT * FROM file_transfer_configs ORDER BY routing_number").fetch_all(conn).await?;
    let configs = rows
        .into_iter()
        .filter_map(|row| match FileTransferConfig::try_from(row) {
            Ok(c) => Some(c),
            Err(e) => {
                warn!("🗃️ Ignoring file transfer config. {e}");
                None
            },
        })
        .collect();
    Ok(configs)
}

pub async fn upsert_file_transfer_config(
    config: &FileTransferConfig,
    conn: &mut SqliteConnection,
) -> Result<(), GatewayDatabaseError> {
    let (protocol, hostname, username, password, fingerprint, root) = match &config.protocol {
        TransferProtocol::Ftp(c) => ("ftp", c.hostname.clone(), c.username.clone(), c.password.reveal().clone(), None, None),
        TransferProtocol::Sftp(c) => (
            "sftp",
            c.hostname.clone(),
            c.username.clone(),
            c.password.reveal().clone(),
            c.host_key_fingerprint.clone(),
            None,
        ),
        TransferProtocol::Local(c) => {
            ("local", String::default(), String::default(), String::default(), None, Some(c.root.to_string_lossy().to_string()))
        },
    };
    sqlx::query(
        r#"
            INSERT INTO file_transfer_configs (
                routing_number, inbound_path, outbound_path, return_path, protocol, hostname, username, password,
                host_key_fingerprint, local_root
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            ON CONFLICT (routing_number) DO UPDATE SET
                inbound_path = excluded.inbound_path,
                outbound_path = excluded.outbound_path,
                return_path = excluded.return_path,
                protocol = excluded.protocol,
                hostname = excluded.hostname,
                username = excluded.username,
                password = excluded.password,
                host_key_fingerprint = excluded.host_key_fingerprint,
                local_root = excluded.local_root;
        "#,
    )
    .bind(config.routing_number.as_str())
    .bind(config.inbound_path.as_str())
    .bind(config.outbound_path.as_str())
    .bind(config.return_path.as_str())
    .bind(protocol)
    .bind(hostname)
    .bind(username)
    .bind(password)
    .bind(fingerprint)
    .bind(root)
    .execute(conn)
    .await?;
    Ok(())
}
