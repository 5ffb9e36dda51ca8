//! amiablog: a personal blog engine
//!
//! Markdown posts with YAML metadata are loaded into a [`content::ContentStore`],
//! rendered through Tera templates and either served live ([`server`]) or
//! written out as a static site ([`generator`]).

pub mod commands;
pub mod config;
pub mod content;
pub mod feed;
pub mod generator;
pub mod highlight;
pub mod i18n;
pub mod server;
pub mod templates;

use anyhow::Result;
use std::path::{Path, PathBuf};

pub const SOFTWARE: &str = "AmiaBlog";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Config file name inside the site directory
pub const CONFIG_FILE: &str = "config.yml";

/// The main AmiaBlog application
#[derive(Clone)]
pub struct AmiaBlog {
    /// Site configuration
    pub config: config::SiteConfig,
    /// Base directory
    pub base_dir: PathBuf,
    /// Markdown posts
    pub posts_dir: PathBuf,
    /// Tera templates
    pub templates_dir: PathBuf,
    /// Static assets (css, favicon, highlight.js)
    pub static_dir: PathBuf,
    /// Translation files
    pub i18n_dir: PathBuf,
}

impl AmiaBlog {
    /// Create an instance from a site directory, reading `config.yml` if present
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self> {
        let base_dir = base_dir.as_ref();
        let config_path = base_dir.join(CONFIG_FILE);

        let config = if config_path.exists() {
            config::SiteConfig::load(&config_path)?
        } else {
            tracing::warn!("{:?} not found, using default configuration", config_path);
            config::SiteConfig::default()
        };

        Ok(Self::with_config(base_dir, config))
    }

    pub fn with_config<P: AsRef<Path>>(base_dir: P, config: config::SiteConfig) -> Self {
        let base_dir = base_dir.as_ref().to_path_buf();
        Self {
            posts_dir: base_dir.join(&config.posts_dir),
            templates_dir: base_dir.join(&config.templates_dir),
            static_dir: base_dir.join(&config.static_dir),
            i18n_dir: base_dir.join(&config.i18n_dir),
            config,
            base_dir,
        }
    }

    /// Translations for the configured site language
    pub fn i18n(&self) -> i18n::I18n {
        i18n::I18n::load(&self.i18n_dir, &self.config.site_language)
    }

    /// Post source reading the posts directory
    pub fn post_source(&self) -> content::DirectorySource {
        content::DirectorySource::new(&self.posts_dir)
    }

    /// Generate the static site into `destination`
    pub async fn generate(&self, destination: &Path, remove_existing: bool) -> Result<()> {
        commands::generate::run(self, destination, remove_existing).await
    }

    /// Create a new post
    pub fn new_post(&self, title: &str, tags: &[String], slug: Option<&str>) -> Result<PathBuf> {
        commands::new::create_post(self, title, tags, slug)
    }
}
