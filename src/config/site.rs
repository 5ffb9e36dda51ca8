//! Site configuration (config.yml)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// Base URL used when `site_settings.url` is not configured
pub const PLACEHOLDER_URL: &str = "http://example.com";

/// Main site configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site_settings: SiteSettings,
    pub site_language: String,
    pub copyright: Option<Copyright>,
    pub friend_links: Option<Vec<FriendLink>>,
    pub search_method: SearchMethod,

    // Rendering
    /// Recompile templates on every render (useful while editing them)
    pub disable_template_cache: bool,
    pub minify: bool,
    pub highlight: HighlightConfig,

    // Directory
    pub posts_dir: String,
    pub templates_dir: String,
    pub static_dir: String,
    pub i18n_dir: String,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_settings: SiteSettings::default(),
            site_language: "en".to_string(),
            copyright: None,
            friend_links: None,
            search_method: SearchMethod::default(),

            disable_template_cache: false,
            minify: true,
            highlight: HighlightConfig::default(),

            posts_dir: "posts".to_string(),
            templates_dir: "templates".to_string(),
            static_dir: "static".to_string(),
            i18n_dir: "i18n".to_string(),
        }
    }
}

impl SiteConfig {
    /// Load configuration from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {:?}", path))?;
        let config: SiteConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("failed to parse config file {:?}", path))?;
        config.warn_missing_optional();
        Ok(config)
    }

    /// Site base URL without a trailing slash, falling back to [`PLACEHOLDER_URL`]
    pub fn base_url(&self) -> &str {
        self.site_settings
            .url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .filter(|u| !u.is_empty())
            .unwrap_or(PLACEHOLDER_URL)
    }

    fn warn_missing_optional(&self) {
        if self.site_settings.url.as_deref().map_or(true, |u| u.trim().is_empty()) {
            tracing::warn!(
                "site_settings.url is not set, using {} for absolute links",
                PLACEHOLDER_URL
            );
        }
        if self.site_settings.title.is_empty() {
            tracing::warn!("site_settings.title is empty");
        }
    }
}

/// Site metadata shown in page headers and the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSettings {
    pub title: String,
    pub description: String,
    pub keywords: String,
    pub url: Option<String>,
    pub color_scheme: String,
    pub theme: String,
    pub hljs_languages: Vec<String>,
}

impl Default for SiteSettings {
    fn default() -> Self {
        Self {
            title: "AmiaBlog".to_string(),
            description: String::new(),
            keywords: String::new(),
            url: None,
            color_scheme: "DDAACC".to_string(),
            theme: "default".to_string(),
            hljs_languages: Vec::new(),
        }
    }
}

/// Copyright notice in the page footer and the feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Copyright {
    pub holder: String,
    #[serde(default)]
    pub since: Option<i32>,
}

impl Copyright {
    /// Render as `© since-year holder`
    pub fn notice(&self, year: i32) -> String {
        match self.since {
            Some(since) if since < year => format!("© {}-{} {}", since, year, self.holder),
            _ => format!("© {} {}", year, self.holder),
        }
    }
}

/// Link to a friend's site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FriendLink {
    pub name: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
}

/// Search strategy used by the content store
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchMethod {
    /// Substring match on slug, title, tags and keywords
    #[default]
    Fullmatch,
    /// Segmented query with hit-count ranking
    Tokenized,
}

impl fmt::Display for SearchMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchMethod::Fullmatch => f.write_str("fullmatch"),
            SearchMethod::Tokenized => f.write_str("tokenized"),
        }
    }
}

/// highlight.js language asset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HighlightConfig {
    /// Download missing language files from `cdn`
    pub fetch: bool,
    pub cdn: String,
}

impl Default for HighlightConfig {
    fn default() -> Self {
        Self {
            fetch: true,
            cdn: "https://cdnjs.cloudflare.com/ajax/libs/highlight.js/11.9.0/languages"
                .to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SiteConfig::default();
        assert_eq!(config.site_settings.title, "AmiaBlog");
        assert_eq!(config.site_settings.color_scheme, "DDAACC");
        assert_eq!(config.search_method, SearchMethod::Fullmatch);
        assert!(config.minify);
    }

    #[test]
    fn test_parse_config() {
        let yaml = r#"
site_settings:
  title: My Blog
  description: Notes
  url: https://blog.example.org/
  hljs_languages: [rust, python]
site_language: zh
search_method: tokenized
copyright:
  holder: Amia
  since: 2022
friend_links:
  - name: Friend
    url: https://friend.example.org
"#;
        let config: SiteConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.site_settings.title, "My Blog");
        assert_eq!(config.site_settings.hljs_languages, vec!["rust", "python"]);
        assert_eq!(config.site_language, "zh");
        assert_eq!(config.search_method, SearchMethod::Tokenized);
        assert_eq!(config.base_url(), "https://blog.example.org");
        assert_eq!(config.friend_links.unwrap()[0].description, "");
        assert_eq!(config.copyright.unwrap().since, Some(2022));
        // Unset fields keep their defaults
        assert_eq!(config.posts_dir, "posts");
    }

    #[test]
    fn test_missing_url_uses_placeholder() {
        let config = SiteConfig::default();
        assert_eq!(config.base_url(), PLACEHOLDER_URL);

        let mut blank = SiteConfig::default();
        blank.site_settings.url = Some(String::new());
        assert_eq!(blank.base_url(), PLACEHOLDER_URL);
    }

    #[test]
    fn test_copyright_notice() {
        let c = Copyright {
            holder: "Amia".to_string(),
            since: Some(2022),
        };
        assert_eq!(c.notice(2024), "© 2022-2024 Amia");
        let c = Copyright {
            holder: "Amia".to_string(),
            since: None,
        };
        assert_eq!(c.notice(2024), "© 2024 Amia");
    }
}
