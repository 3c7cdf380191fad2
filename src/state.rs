use crate::{models::upload::StoredFile, services::storage_service::StorageService};

/// Path prefix under which the upload root is served.
pub const IMAGES_MOUNT: &str = "/images";

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    pub storage: StorageService,

    /// Scheme, host and port clients should use to reach this server,
    /// e.g. `http://localhost:3000`.
    pub public_url: String,

    /// Largest accepted upload request body.
    pub max_upload_bytes: usize,
}

impl AppState {
    /// Absolute URL of a stored file: `<public_url>/images/<bucket>/<file_name>`.
    pub fn url_for(&self, stored: &StoredFile) -> String {
        format!(
            "{}{}/{}/{}",
            self.public_url.trim_end_matches('/'),
            IMAGES_MOUNT,
            stored.bucket,
            stored.file_name
        )
    }
}
