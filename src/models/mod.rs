//! Core data models for the image bucket service.
//!
//! These types are shared by the HTTP handlers and the upload client:
//! bucket names are validated the same way on both sides, and the upload
//! response body is serialized by one and parsed by the other.

pub mod bucket;
pub mod upload;
