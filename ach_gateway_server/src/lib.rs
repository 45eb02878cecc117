//! # ACH gateway server
//! This crate hosts the ACH gateway binary. It is responsible for:
//! * Loading the gateway configuration from the environment.
//! * Starting the file transfer controller, which merges, uploads, downloads and reconciles ACH files on a timer.
//! * Serving a small admin HTTP surface for health checks and for forcing a file transfer cycle.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `GET /health`: A health check route that returns a 200 OK response.
//! * `POST /files/flush/incoming`: Downloads and processes inbound and return files now.
//! * `POST /files/flush/outgoing`: Merges pending transfers and uploads ready files now.
//! * `POST /files/flush`: Both of the above.
//!
//! The flush routes wait for the cycle to finish and reply with a summary of what it did.
pub mod cli;
pub mod config;
pub mod errors;
pub mod file_transfer_worker;
pub mod routes;
pub mod server;

#[cfg(test)]
mod endpoint_tests;
