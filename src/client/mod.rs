//! Upload client: bucket-name gating, the pending queue, and the
//! sequential upload loop that talks to `POST /api/upload`.

pub mod controller;
pub mod records;
pub mod uploader;
