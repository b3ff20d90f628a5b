//! Uploader configuration.
//!
//! [`MediaConfig`] holds everything that can live in a file. [`MediaOptions`]
//! adds the application hooks (transport and callbacks) that can't.

use std::fmt;
use std::path::Path;
use std::rc::Rc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{MediaError, UploadError};
use crate::mime::MimeTaxonomy;
use crate::session::{UploadCallbacks, UploadTransport};
use crate::types::{MediaFile, MediaValue, Thumbnail};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MediaConfig {
    /// Display bounds applied to inserted images.
    pub thumbnail: Thumbnail,
    /// Category taxonomy. Entries given in configuration are merged over the defaults.
    #[serde(deserialize_with = "merged_over_defaults")]
    pub mimetypes: MimeTaxonomy,
    /// Accept files matching no category as generic `file` embeds.
    pub accept_any_file: bool,
    /// File extensions that are always rejected.
    pub blocked_extensions: Vec<String>,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            thumbnail: Thumbnail::new(180, 60, 10, 10),
            mimetypes: MimeTaxonomy::defaults(),
            accept_any_file: false,
            blocked_extensions: Vec::new(),
        }
    }
}

fn merged_over_defaults<'de, D>(deserializer: D) -> Result<MimeTaxonomy, D::Error>
where
    D: Deserializer<'de>,
{
    let overrides = MimeTaxonomy::deserialize(deserializer)?;
    let mut taxonomy = MimeTaxonomy::defaults();
    taxonomy.merge(overrides);
    Ok(taxonomy)
}

impl MediaConfig {
    /// Loads the configuration from a file, picking the format from its extension.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, MediaError> {
        let path = path.as_ref();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&std::fs::read_to_string(path)?),
            Some("toml") => Self::from_toml(&std::fs::read_to_string(path)?),
            _ => Err(MediaError::Config(format!(
                "unsupported config format: {}",
                path.display()
            ))),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, MediaError> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_toml(text: &str) -> Result<Self, MediaError> {
        Ok(toml::from_str(text)?)
    }

    /// Merge caller taxonomy entries over the current ones.
    pub fn with_mimetypes(mut self, overrides: MimeTaxonomy) -> Self {
        self.mimetypes.merge(overrides);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: Thumbnail) -> Self {
        self.thumbnail = thumbnail;
        self
    }

    pub fn accept_any_file(mut self, accept: bool) -> Self {
        self.accept_any_file = accept;
        self
    }

    pub fn block_extension(mut self, extension: impl Into<String>) -> Self {
        self.blocked_extensions.push(extension.into());
        self
    }

    /// The blocked extension `name` ends with, if any.
    ///
    /// Matching ignores case and a leading dot in the configured extension.
    pub fn blocked_extension<'a>(&'a self, name: &str) -> Option<&'a str> {
        let name = name.to_lowercase();
        self.blocked_extensions.iter().map(String::as_str).find(|blocked| {
            let ext = blocked.trim_start_matches('.').to_lowercase();
            !ext.is_empty()
                && name
                    .strip_suffix(ext.as_str())
                    .is_some_and(|stem| stem.ends_with('.'))
        })
    }
}

/// Label translation hook for the toolbar picker.
pub type Translate = Rc<dyn Fn(&str) -> String>;

/// Click hook, called with `(type, name, value)`.
pub type ClickHandler = Rc<dyn Fn(&str, &str, Option<&MediaValue>)>;

/// Default label translation: capitalize the first letter.
pub fn capitalize_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Full uploader options: file-level config plus application hooks.
#[derive(Clone)]
pub struct MediaOptions {
    pub config: MediaConfig,
    pub transport: Option<Rc<dyn UploadTransport>>,
    pub callbacks: UploadCallbacks,
    pub click_handler: Option<ClickHandler>,
    pub translate: Translate,
}

impl Default for MediaOptions {
    fn default() -> Self {
        Self::new(MediaConfig::default())
    }
}

impl MediaOptions {
    pub fn new(config: MediaConfig) -> Self {
        Self {
            config,
            transport: None,
            callbacks: UploadCallbacks::default(),
            click_handler: None,
            translate: Rc::new(capitalize_first),
        }
    }

    /// Set the upload operation.
    pub fn upload<T>(mut self, transport: T) -> Self
    where
        T: UploadTransport + 'static,
    {
        self.transport = Some(Rc::new(transport));
        self
    }

    /// Set the upload operation from a closure.
    pub fn upload_fn<F, Fut>(self, upload: F) -> Self
    where
        F: Fn(smol_str::SmolStr, MediaFile) -> Fut + 'static,
        Fut: std::future::Future<Output = Result<MediaValue, UploadError>> + 'static,
    {
        self.upload(upload)
    }

    pub fn upload_success(mut self, callback: impl Fn(&str, &str, &MediaValue) + 'static) -> Self {
        self.callbacks.upload_success = Some(Rc::new(callback));
        self
    }

    pub fn upload_error(mut self, callback: impl Fn(&str, &str, &UploadError) + 'static) -> Self {
        self.callbacks.upload_error = Some(Rc::new(callback));
        self
    }

    pub fn upload_cancelled(mut self, callback: impl Fn(&str, &str) + 'static) -> Self {
        self.callbacks.upload_cancelled = Some(Rc::new(callback));
        self
    }

    pub fn click_handler(mut self, handler: impl Fn(&str, &str, Option<&MediaValue>) + 'static) -> Self {
        self.click_handler = Some(Rc::new(handler));
        self
    }

    pub fn translate(mut self, translate: impl Fn(&str) -> String + 'static) -> Self {
        self.translate = Rc::new(translate);
        self
    }
}

impl fmt::Debug for MediaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MediaOptions")
            .field("config", &self.config)
            .field("transport", &self.transport.is_some())
            .field("callbacks", &self.callbacks)
            .field("click_handler", &self.click_handler.is_some())
            .finish_non_exhaustive()
    }
}
