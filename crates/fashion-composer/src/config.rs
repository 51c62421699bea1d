use serde::{Deserialize, Serialize};

use std::future::Future;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;

/// Shape of the JSON body sent to the board-creation endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadShape {
    /// `{title, content, boardType}`
    #[default]
    Flat,
    /// `{qboard: {title, content, boardType}, base64Images: [...]}`
    Wrapped,
}

/// How a picked image becomes an editor embed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageStrategy {
    /// Upload to the server and embed the returned URL.
    #[default]
    Upload,
    /// Embed a `data:` URL built locally.
    Inline,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the REST API.
    pub api_url: String,
    /// Base URL that relative image paths are resolved against.
    pub asset_url: String,
    /// Path of the board-creation endpoint, relative to `api_url`.
    pub create_path: String,
    /// Path of the image upload endpoint, relative to `api_url`.
    pub upload_path: String,
    /// Route navigated to after a successful submit or a cancel.
    pub listing_route: String,
    pub payload_shape: PayloadShape,
    pub image_strategy: ImageStrategy,
}

impl Default for Config {
    fn default() -> Self {
        let api_url = "http://localhost:8080".to_owned();
        Self {
            asset_url: api_url.clone(),
            api_url,
            create_path: "/api/qboards".to_owned(),
            upload_path: "/qboards/uploadImage".to_owned(),
            listing_route: "/qna".to_owned(),
            payload_shape: PayloadShape::default(),
            image_strategy: ImageStrategy::default(),
        }
    }
}

impl Config {
    /// Defaults overridden by environment variables.
    ///
    /// - `FASHION_API_URL`
    /// - `FASHION_ASSET_URL` (defaults to the API URL)
    /// - `FASHION_PAYLOAD_SHAPE`: `flat` | `wrapped`
    /// - `FASHION_IMAGE_STRATEGY`: `upload` | `inline`
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`Config::from_env`] with an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(api_url) = lookup("FASHION_API_URL") {
            config.asset_url = api_url.clone();
            config.api_url = api_url;
        }
        if let Some(asset_url) = lookup("FASHION_ASSET_URL") {
            config.asset_url = asset_url;
        }
        if let Some(shape) = lookup("FASHION_PAYLOAD_SHAPE") {
            config.payload_shape = match shape.trim().to_ascii_lowercase().as_str() {
                "flat" => PayloadShape::Flat,
                "wrapped" => PayloadShape::Wrapped,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "FASHION_PAYLOAD_SHAPE",
                        value: shape,
                    });
                }
            };
        }
        if let Some(strategy) = lookup("FASHION_IMAGE_STRATEGY") {
            config.image_strategy = match strategy.trim().to_ascii_lowercase().as_str() {
                "upload" => ImageStrategy::Upload,
                "inline" => ImageStrategy::Inline,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "FASHION_IMAGE_STRATEGY",
                        value: strategy,
                    });
                }
            };
        }
        Ok(config)
    }

    /// Loads the configuration from the provided loader.
    pub async fn load(loader: &impl Loader) -> Result<Self, ConfigError> {
        loader.load().await
    }

    /// Saves the configuration using the provided saver.
    pub async fn save(&self, saver: &impl Saver) -> Result<(), ConfigError> {
        saver.save(self).await
    }

    pub fn create_url(&self) -> String {
        join_url(&self.api_url, &self.create_path)
    }

    pub fn upload_url(&self) -> String {
        join_url(&self.api_url, &self.upload_path)
    }

    /// Absolute URL for an image reference. Absolute references pass through.
    pub fn asset_link(&self, reference: &str) -> String {
        if is_absolute(reference) {
            reference.to_owned()
        } else {
            join_url(&self.asset_url, reference)
        }
    }
}

fn is_absolute(reference: &str) -> bool {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("data:")
}

fn join_url(base: &str, path: &str) -> String {
    match (base.ends_with('/'), path.starts_with('/')) {
        (true, true) => format!("{}{}", base, &path[1..]),
        (false, false) if !path.is_empty() => format!("{}/{}", base, path),
        _ => format!("{}{}", base, path),
    }
}

/// The trait for loading configuration data.
pub trait Loader {
    /// Loads the configuration data.
    fn load(&self) -> impl Future<Output = Result<Config, ConfigError>>;
}

/// The trait for saving configuration data.
pub trait Saver {
    /// Saves the configuration data.
    fn save(&self, config: &Config) -> impl Future<Output = Result<(), ConfigError>>;
}

/// An implementation of [`Loader`] and [`Saver`] that reads and writes a configuration file.
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    /// Create a new [`FileStore`] with the given path.
    ///
    /// Only `.json` files are supported. Missing keys take their default values.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn check_format(&self) -> Result<(), ConfigError> {
        match self.path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(()),
            other => Err(ConfigError::UnsupportedFormat(
                other.unwrap_or("<none>").to_owned(),
            )),
        }
    }
}

impl Loader for FileStore {
    async fn load(&self) -> Result<Config, ConfigError> {
        self.check_format()?;
        let raw: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&self.path)?)?;
        let has_asset_url = raw.get("asset_url").is_some();
        let mut config: Config = serde_json::from_value(raw)?;
        // The asset host follows the API host unless set explicitly.
        if !has_asset_url {
            config.asset_url = config.api_url.clone();
        }
        Ok(config)
    }
}

impl Saver for FileStore {
    async fn save(&self, config: &Config) -> Result<(), ConfigError> {
        self.check_format()?;
        std::fs::write(&self.path, serde_json::to_string_pretty(config)?)?;
        Ok(())
    }
}
