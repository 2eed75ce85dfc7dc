//! Where campground images are stored.
//!
//! Two interchangeable hosts: Cloudinary (signed REST calls) for real
//! deployments, and a local directory served under [`MEDIA_PATH`] for
//! development and tests.

use std::path::{Path, PathBuf};

use anyhow::{Result, bail};
use camp_types::models::Image;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use tokio::fs;
use tracing::{info, warn};
use uuid::Uuid;

use crate::MEDIA_PATH;
use crate::uploads::PendingImage;

pub enum AssetHost {
    Local(LocalAssets),
    Cloudinary(Cloudinary),
}

impl AssetHost {
    /// Stores the image and returns where it can be fetched from.
    pub async fn upload(&self, image: PendingImage) -> Result<Image> {
        match self {
            AssetHost::Local(local) => local.upload(image).await,
            AssetHost::Cloudinary(cloud) => cloud.upload(image).await,
        }
    }

    /// Deletes a stored image. Deleting something already gone succeeds.
    pub async fn destroy(&self, filename: &str) -> Result<()> {
        match self {
            AssetHost::Local(local) => local.destroy(filename).await,
            AssetHost::Cloudinary(cloud) => cloud.destroy(filename).await,
        }
    }

    /// The directory to serve under [`MEDIA_PATH`], for the local host.
    pub fn local_dir(&self) -> Option<&Path> {
        match self {
            AssetHost::Local(local) => Some(&local.dir),
            AssetHost::Cloudinary(_) => None,
        }
    }
}

// -- Local directory --

pub struct LocalAssets {
    dir: PathBuf,
}

impl LocalAssets {
    pub async fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir).await?;
        info!("Local media directory: {}", dir.display());
        Ok(Self { dir })
    }

    async fn upload(&self, image: PendingImage) -> Result<Image> {
        let filename = format!("{}.{}", Uuid::new_v4(), extension(&image));
        fs::write(self.dir.join(&filename), &image.bytes).await?;
        Ok(Image {
            url: format!("{MEDIA_PATH}/{filename}"),
            filename,
        })
    }

    async fn destroy(&self, filename: &str) -> Result<()> {
        if filename.is_empty() || filename.starts_with('.') || filename.contains(['/', '\\']) {
            bail!("Refusing to delete asset with suspicious name '{}'", filename);
        }

        match fs::remove_file(self.dir.join(filename)).await {
            Ok(()) => {
                info!("Deleted local asset {}", filename);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Local asset {} already gone", filename);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

fn extension(image: &PendingImage) -> String {
    let from_name = Path::new(&image.file_name)
        .extension()
        .and_then(|e| e.to_str())
        .filter(|e| !e.is_empty() && e.len() <= 5 && e.chars().all(|c| c.is_ascii_alphanumeric()));
    if let Some(ext) = from_name {
        return ext.to_ascii_lowercase();
    }
    match image.content_type.as_str() {
        "image/jpeg" => "jpg".into(),
        "image/png" => "png".into(),
        "image/gif" => "gif".into(),
        "image/webp" => "webp".into(),
        _ => "img".into(),
    }
}

// -- Cloudinary --

const CLOUDINARY_API: &str = "https://api.cloudinary.com/v1_1";

#[derive(Debug, Clone)]
pub struct CloudinaryConfig {
    pub cloud_name: String,
    pub api_key: String,
    pub api_secret: String,
    /// Folder new uploads are placed in.
    pub folder: String,
}

pub struct Cloudinary {
    http: reqwest::Client,
    config: CloudinaryConfig,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

impl Cloudinary {
    pub fn new(config: CloudinaryConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    fn endpoint(&self, action: &str) -> String {
        format!("{}/{}/image/{}", CLOUDINARY_API, self.config.cloud_name, action)
    }

    /// Request signature: SHA-1 over the sorted `key=value` pairs joined
    /// with `&`, followed by the API secret.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted = params.to_vec();
        sorted.sort_by_key(|(key, _)| *key);
        let payload = sorted
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha1::new();
        hasher.update(payload.as_bytes());
        hasher.update(self.config.api_secret.as_bytes());
        hex::encode(hasher.finalize())
    }

    async fn upload(&self, image: PendingImage) -> Result<Image> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("folder", self.config.folder.as_str()),
            ("timestamp", timestamp.as_str()),
        ]);

        let file = Part::bytes(image.bytes.to_vec())
            .file_name(image.file_name)
            .mime_str(&image.content_type)?;
        let form = Form::new()
            .part("file", file)
            .text("api_key", self.config.api_key.clone())
            .text("folder", self.config.folder.clone())
            .text("timestamp", timestamp)
            .text("signature", signature);

        let uploaded: UploadResponse = self
            .http
            .post(self.endpoint("upload"))
            .multipart(form)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!("Uploaded {} to Cloudinary", uploaded.public_id);
        Ok(Image {
            url: uploaded.secure_url,
            filename: uploaded.public_id,
        })
    }

    async fn destroy(&self, filename: &str) -> Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[("public_id", filename), ("timestamp", timestamp.as_str())]);

        let response: DestroyResponse = self
            .http
            .post(self.endpoint("destroy"))
            .form(&[
                ("public_id", filename),
                ("api_key", self.config.api_key.as_str()),
                ("timestamp", timestamp.as_str()),
                ("signature", signature.as_str()),
            ])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        match response.result.as_str() {
            "ok" => {
                info!("Destroyed {} on Cloudinary", filename);
                Ok(())
            }
            "not found" => {
                warn!("Cloudinary asset {} already gone", filename);
                Ok(())
            }
            other => bail!("Cloudinary refused to destroy {}: {}", filename, other),
        }
    }
}
