//! Admin routes.
//!
//! The flush routes hand a request to the file transfer controller and wait for the cycle to complete. Requests are
//! queued behind any cycle that is already running, so a flush can take as long as a full cycle.
use ach_gateway_engine::file_transfer::{ControllerHandle, FlushKind};
use actix_web::{get, post, web, HttpResponse, Responder};
use log::*;

use crate::errors::ServerError;

#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

#[post("/files/flush/incoming")]
pub async fn flush_incoming(controller: web::Data<ControllerHandle>) -> Result<HttpResponse, ServerError> {
    flush(controller.get_ref(), FlushKind::Incoming).await
}

#[post("/files/flush/outgoing")]
pub async fn flush_outgoing(controller: web::Data<ControllerHandle>) -> Result<HttpResponse, ServerError> {
    flush(controller.get_ref(), FlushKind::Outgoing).await
}

#[post("/files/flush")]
pub async fn flush_all(controller: web::Data<ControllerHandle>) -> Result<HttpResponse, ServerError> {
    flush(controller.get_ref(), FlushKind::All).await
}

async fn flush(controller: &ControllerHandle, kind: FlushKind) -> Result<HttpResponse, ServerError> {
    info!("💻️ Flush requested: {kind:?}");
    let report = controller.flush(kind).await?;
    debug!("💻️ Flush {kind:?} complete: {report:?}");
    Ok(HttpResponse::Ok().json(report))
}
