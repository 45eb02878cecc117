use ach_gateway_engine::{file_transfer::ControllerHandle, test_utils::prepare_env::new_test_database_in};
use actix_web::{body::MessageBody, http::StatusCode, test, test::TestRequest, web, App};
use log::debug;
use tempfile::TempDir;
use tokio::task::JoinHandle;

use crate::{
    config::GatewayConfig,
    file_transfer_worker::start_file_transfer_worker,
    routes::{flush_all, flush_incoming, flush_outgoing},
    server::create_controller,
};

/// A running controller over an empty store kept in the returned `TempDir`. Keep it alive for as long as the
/// controller runs.
pub async fn start_controller() -> (ControllerHandle, JoinHandle<()>, TempDir) {
    let storage = tempfile::tempdir().expect("Could not create storage dir");
    let config = GatewayConfig { storage_dir: storage.path().to_path_buf(), ..Default::default() };
    let db = new_test_database_in(storage.path()).await;
    let (controller, handle) = create_controller(&config, db).await.expect("Could not create controller");
    let worker = start_file_transfer_worker(controller);
    (handle, worker, storage)
}

pub async fn post_request(path: &str, handle: ControllerHandle) -> Result<(StatusCode, String), String> {
    let app = App::new()
        .app_data(web::Data::new(handle))
        .service(flush_incoming)
        .service(flush_outgoing)
        .service(flush_all);
    let service = test::init_service(app).await;
    let req = TestRequest::post().uri(path).to_request();
    debug!("Making request");
    let (_, res) = test::try_call_service(&service, req).await.map_err(|e| e.to_string())?.into_parts();
    let status = res.status();
    let body = String::from_utf8_lossy(&res.into_body().try_into_bytes().unwrap()).into_owned();
    Ok((status, body))
}
