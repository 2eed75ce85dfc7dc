use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use camp_api::assets::CloudinaryConfig;

/// Server settings, read from the environment (after `.env`).
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub media_dir: PathBuf,
    pub secure_cookies: bool,
    /// Present only when all three Cloudinary credentials are set.
    pub cloudinary: Option<CloudinaryConfig>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let port = var_or("CAMP_PORT", "3000")
            .parse()
            .context("CAMP_PORT must be a port number")?;
        let secure_cookies = var_or("CAMP_SECURE_COOKIES", "false")
            .parse()
            .context("CAMP_SECURE_COOKIES must be true or false")?;

        let cloudinary = match (
            env::var("CLOUDINARY_CLOUD_NAME"),
            env::var("CLOUDINARY_KEY"),
            env::var("CLOUDINARY_SECRET"),
        ) {
            (Ok(cloud_name), Ok(api_key), Ok(api_secret)) => Some(CloudinaryConfig {
                cloud_name,
                api_key,
                api_secret,
                folder: var_or("CLOUDINARY_FOLDER", "campgrounds"),
            }),
            _ => None,
        };

        Ok(Self {
            host: var_or("CAMP_HOST", "0.0.0.0"),
            port,
            db_path: var_or("CAMP_DB_PATH", "camp.db").into(),
            media_dir: var_or("CAMP_MEDIA_DIR", "./media").into(),
            secure_cookies,
            cloudinary,
        })
    }
}

fn var_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.into())
}
