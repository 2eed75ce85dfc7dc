use axum::extract::Multipart;
use bytes::Bytes;
use camp_types::forms::CampgroundForm;
use camp_types::models::Image;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::state::AppState;

/// 10 MB per image
pub const MAX_IMAGE_SIZE: usize = 10 * 1024 * 1024;

/// An uploaded file held in memory until the form validates.
#[derive(Debug, Clone)]
pub struct PendingImage {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// The multipart body of the campground create/update forms.
#[derive(Debug, Default)]
pub struct CampgroundSubmission {
    pub form: CampgroundForm,
    pub images: Vec<PendingImage>,
    /// Filenames of existing images to drop (update only).
    pub delete_images: Vec<String>,
}

impl CampgroundSubmission {
    pub async fn read(mut multipart: Multipart) -> Result<Self, AppError> {
        let mut submission = Self::default();

        while let Some(field) = multipart.next_field().await? {
            let name = field.name().unwrap_or_default().to_owned();
            match name.as_str() {
                "image" => {
                    let file_name = field.file_name().unwrap_or_default().to_owned();
                    let content_type = field.content_type().unwrap_or_default().to_owned();
                    let bytes = field.bytes().await?;

                    // "no file chosen" still submits an empty part
                    if file_name.is_empty() && bytes.is_empty() {
                        continue;
                    }
                    if !content_type.starts_with("image/") {
                        return Err(AppError::Validation(format!("{file_name} is not an image")));
                    }
                    if bytes.len() > MAX_IMAGE_SIZE {
                        return Err(AppError::Validation(format!("{file_name} is larger than 10 MB")));
                    }

                    submission.images.push(PendingImage {
                        file_name,
                        content_type,
                        bytes,
                    });
                }
                "deleteImages" | "deleteImages[]" => {
                    submission.delete_images.push(field.text().await?);
                }
                "title" => submission.form.title = Some(field.text().await?),
                "location" => submission.form.location = Some(field.text().await?),
                "price" => submission.form.price = Some(field.text().await?),
                "description" => submission.form.description = Some(field.text().await?),
                _ => debug!("Ignoring form field '{}'", name),
            }
        }

        Ok(submission)
    }
}

/// Sends every pending image to the asset host. On failure, images already
/// uploaded by this call are released again.
pub async fn upload_all(state: &AppState, pending: Vec<PendingImage>) -> Result<Vec<Image>, AppError> {
    let mut uploaded = Vec::with_capacity(pending.len());
    for image in pending {
        match state.assets.upload(image).await {
            Ok(stored) => uploaded.push(stored),
            Err(e) => {
                release(state, &uploaded).await;
                return Err(AppError::Internal(e.context("image upload failed")));
            }
        }
    }
    Ok(uploaded)
}

/// Best-effort removal of images at the asset host.
pub async fn release(state: &AppState, images: &[Image]) {
    for image in images {
        if let Err(e) = state.assets.destroy(&image.filename).await {
            warn!("Failed to release asset {}: {:#}", image.filename, e);
        }
    }
}
