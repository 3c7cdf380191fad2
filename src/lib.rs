//! Image upload service with per-bucket folders.
//!
//! The server side (`routes`, `handlers`, `services`) accepts one image per
//! request and stores it under `<upload root>/<bucket>/`; the `client`
//! module holds the upload queue and drives uploads against it.

pub mod client;
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod state;
