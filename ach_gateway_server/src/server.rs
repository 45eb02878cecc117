use std::time::Duration;

use ach_gateway_engine::{
    file_transfer::{ControllerHandle, FileTransferController},
    ledger::AccountsClient,
    SqliteDatabase,
};
use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;

use crate::{
    config::GatewayConfig,
    errors::ServerError,
    file_transfer_worker::{start_file_transfer_worker, GatewayController},
    routes::{flush_all, flush_incoming, flush_outgoing, health},
};

pub async fn run_server(config: GatewayConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    db.migrate().await.map_err(|e| ServerError::InitializeError(format!("Migrations failed. {e}")))?;
    info!("🗃️ Database ready at {}", config.database_url);
    let (controller, handle) = create_controller(&config, db).await?;
    let worker = start_file_transfer_worker(controller);
    let srv = create_server_instance(&config, handle.clone())?;
    let result = srv.await.map_err(|e| ServerError::Unspecified(e.to_string()));
    info!("🚀️ HTTP server stopped. Waiting for the file transfer controller to finish its current cycle");
    handle.shutdown();
    if let Err(e) = worker.await {
        error!("🚀️ File transfer worker did not exit cleanly. {e}");
    }
    result
}

pub async fn create_controller(
    config: &GatewayConfig,
    db: SqliteDatabase,
) -> Result<(GatewayController, ControllerHandle), ServerError> {
    let ledger = match &config.accounts_endpoint {
        Some(endpoint) => {
            let client = AccountsClient::new(endpoint, config.accounts_timeout)
                .map_err(|e| ServerError::ConfigurationError(e.to_string()))?;
            info!("💸️ Ledger reversals go to {}", client.endpoint());
            Some(client)
        },
        None => None,
    };
    FileTransferController::new(db, ledger, config.controller_config())
        .await
        .map_err(|e| ServerError::InitializeError(format!("Could not start the file transfer controller. {e}")))
}

pub fn create_server_instance(config: &GatewayConfig, handle: ControllerHandle) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("agw::access_log"))
            .app_data(web::Data::new(handle.clone()))
            .service(health)
            .service(flush_incoming)
            .service(flush_outgoing)
            .service(flush_all)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}
