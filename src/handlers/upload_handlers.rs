//! HTTP handler for image uploads.
//! Streams the image part to disk instead of buffering it and delegates all
//! path and naming decisions to `StorageService`.

use crate::{
    errors::AppError,
    models::upload::UploadResponse,
    services::storage_service::{StagedUpload, StorageError, StorageService},
    state::AppState,
};
use axum::{
    Json,
    extract::{
        Multipart, State,
        multipart::{MultipartError, MultipartRejection},
    },
};
use futures::StreamExt;
use std::io;
use tracing::{debug, info};

/// Multipart field carrying the bucket name.
pub const BUCKET_FIELD: &str = "bucket";
/// Multipart field carrying the image.
pub const IMAGE_FIELD: &str = "image";

/// `POST /api/upload`
///
/// Expects a multipart form with a `bucket` text field and a single `image`
/// file. Responds with the public URL of the stored file. A body that is not
/// multipart at all carries no image and gets the same 400 as an empty form.
pub async fn upload_image(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!("upload without a multipart body: {}", rejection.body_text());
            return Err(StorageError::MissingImage.into());
        }
    };

    let mut staged = None;
    let form = read_upload_form(&state.storage, multipart, &mut staged).await;
    let bucket = match form {
        Ok(bucket) => bucket,
        Err(err) => {
            if let Some(staged) = staged {
                state.storage.discard_upload(staged).await;
            }
            return Err(err);
        }
    };

    let Some(staged) = staged else {
        return Err(StorageError::MissingImage.into());
    };

    let (bucket, dir) = match state.storage.resolve_bucket(bucket.as_deref()) {
        Ok(resolved) => resolved,
        Err(err) => {
            state.storage.discard_upload(staged).await;
            return Err(err.into());
        }
    };

    let stored = state.storage.commit_upload(staged, bucket, dir).await?;
    let url = state.url_for(&stored);
    info!("upload to bucket {} available at {}", stored.bucket, url);

    Ok(Json(UploadResponse::ok(url)))
}

/// Walk the multipart form, staging the image as soon as it arrives.
///
/// Returns the raw bucket value. A staged image is left in `staged` even on
/// error so the caller can clean it up.
async fn read_upload_form(
    storage: &StorageService,
    mut multipart: Multipart,
    staged: &mut Option<StagedUpload>,
) -> Result<Option<String>, AppError> {
    let mut bucket = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(Some(e)))?
    {
        let name = field.name().map(str::to_string);
        match name.as_deref() {
            Some(BUCKET_FIELD) => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| multipart_error(Some(e)))?;
                bucket = Some(value);
            }
            Some(IMAGE_FIELD) => {
                if staged.is_some() {
                    return Err(AppError::bad_request("Only one image per request"));
                }
                let original_name = field
                    .file_name()
                    .filter(|name| !name.is_empty())
                    .map(str::to_string);
                let mut body_error: Option<MultipartError> = None;
                let stream = field.map(|chunk| {
                    chunk.map_err(|e| {
                        let io_err = io::Error::other(e.to_string());
                        body_error = Some(e);
                        io_err
                    })
                });
                let result = storage.stage_upload(original_name, stream).await;
                let upload = match result {
                    Ok(upload) => upload,
                    // a broken or oversized request body is the client's fault
                    Err(_) if body_error.is_some() => {
                        return Err(multipart_error(body_error.take()));
                    }
                    Err(err) => return Err(err.into()),
                };
                // browsers submit an unnamed empty part when no file was picked
                if upload.size_bytes() == 0 && upload.original_name().is_none() {
                    storage.discard_upload(upload).await;
                    continue;
                }
                *staged = Some(upload);
            }
            _ => continue,
        }
    }

    Ok(bucket)
}

fn multipart_error(err: Option<MultipartError>) -> AppError {
    match err {
        Some(err) => AppError::new(
            err.status(),
            format!("Failed to read multipart: {}", err.body_text()),
        ),
        None => AppError::bad_request("Failed to read multipart"),
    }
}
