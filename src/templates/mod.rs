//! Template rendering shared by the live server and the static generator
//!
//! Every render goes through [`TemplateRenderer::render_to_text`]: the shared
//! context is merged under the per-call context, Tera renders the template and
//! the output is minified. The HTTP and file variants only decide where the
//! text goes, so both modes produce the same bytes.

use anyhow::{anyhow, Context as _, Result};
use arc_swap::ArcSwap;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use chrono::Datelike;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tera::{Context, Tera};

use crate::config::SiteConfig;
use crate::content::{MarkdownRenderer, Post, Tag};
use crate::i18n::I18n;

/// Where templates are compiled from
enum TemplateSource {
    /// `*.html` files below a directory
    Dir(PathBuf),
    /// In-memory (name, body) pairs
    Raw(Vec<(String, String)>),
}

/// Rendering switches
#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    /// Compile once and reuse; when false every render recompiles
    pub cache_templates: bool,
    pub minify: bool,
}

impl RenderOptions {
    pub fn from_config(config: &SiteConfig) -> Self {
        Self {
            cache_templates: !config.disable_template_cache,
            minify: config.minify,
        }
    }
}

/// Template renderer with a shared context
pub struct TemplateRenderer {
    source: TemplateSource,
    cached: Option<Tera>,
    i18n: Arc<I18n>,
    shared: ArcSwap<Context>,
    minify: bool,
}

impl TemplateRenderer {
    /// Load every `*.html` template below `dir`
    pub fn from_dir<P: AsRef<Path>>(dir: P, i18n: Arc<I18n>, options: RenderOptions) -> Result<Self> {
        Self::with_source(
            TemplateSource::Dir(dir.as_ref().to_path_buf()),
            i18n,
            options,
        )
    }

    /// Use in-memory templates
    pub fn from_raw<N, B>(templates: Vec<(N, B)>, i18n: Arc<I18n>, options: RenderOptions) -> Result<Self>
    where
        N: Into<String>,
        B: Into<String>,
    {
        let templates = templates
            .into_iter()
            .map(|(n, b)| (n.into(), b.into()))
            .collect();
        Self::with_source(TemplateSource::Raw(templates), i18n, options)
    }

    fn with_source(source: TemplateSource, i18n: Arc<I18n>, options: RenderOptions) -> Result<Self> {
        let mut renderer = Self {
            source,
            cached: None,
            i18n,
            shared: ArcSwap::from_pointee(Context::new()),
            minify: options.minify,
        };
        // Compile up front either way so broken templates fail at startup
        let tera = renderer.compile()?;
        if options.cache_templates {
            renderer.cached = Some(tera);
        }
        Ok(renderer)
    }

    fn compile(&self) -> Result<Tera> {
        let mut tera = match &self.source {
            TemplateSource::Dir(dir) => {
                let glob = dir.join("**").join("*.html");
                Tera::new(&glob.to_string_lossy())
                    .with_context(|| format!("failed to load templates from {:?}", dir))?
            }
            TemplateSource::Raw(templates) => {
                let mut tera = Tera::default();
                tera.add_raw_templates(templates.iter().map(|(n, b)| (n.as_str(), b.as_str())))?;
                tera
            }
        };

        tera.register_function("t", translate_function(Arc::clone(&self.i18n)));
        tera.register_filter("date_format", date_format_filter);
        Ok(tera)
    }

    /// Add or replace one value of the shared context
    pub fn set_shared<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        self.shared.rcu(|current| {
            let mut next = Context::clone(current);
            next.insert(key, value);
            next
        });
    }

    /// Merge `context` into the shared context
    pub fn extend_shared(&self, context: Context) {
        self.shared.rcu(|current| {
            let mut next = Context::clone(current);
            next.extend(context.clone());
            next
        });
    }

    /// Render to minified text
    pub fn render_to_text(&self, template_name: &str, context: &Context) -> Result<String> {
        let mut merged = Context::clone(&self.shared.load());
        merged.extend(context.clone());

        let html = match &self.cached {
            Some(tera) => tera.render(template_name, &merged),
            None => self.compile()?.render(template_name, &merged),
        }
        .map_err(|e| anyhow!("failed to render {}: {}", template_name, tera_error_chain(&e)))?;

        if self.minify {
            minify(&html)
        } else {
            Ok(html)
        }
    }

    /// Render as an HTTP 200 response
    pub fn render(&self, template_name: &str, context: &Context) -> Result<Response> {
        self.render_with_status(template_name, context, StatusCode::OK)
    }

    pub fn render_with_status(
        &self,
        template_name: &str,
        context: &Context,
        status: StatusCode,
    ) -> Result<Response> {
        let text = self.render_to_text(template_name, context)?;
        Ok((status, Html(text)).into_response())
    }

    /// Render into `path`, creating parent directories and overwriting
    pub fn render_to_file<P: AsRef<Path>>(
        &self,
        path: P,
        template_name: &str,
        context: &Context,
    ) -> Result<()> {
        let path = path.as_ref();
        let text = self.render_to_text(template_name, context)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, text).with_context(|| format!("failed to write {:?}", path))?;
        tracing::debug!("Generated: {:?}", path);
        Ok(())
    }
}

/// Tera hides the useful message in the source chain
fn tera_error_chain(err: &tera::Error) -> String {
    let mut message = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(e) = source {
        message.push_str(": ");
        message.push_str(&e.to_string());
        source = e.source();
    }
    message
}

fn minify(html: &str) -> Result<String> {
    let mut cfg = minify_html::Cfg::new();
    cfg.keep_closing_tags = true;
    cfg.keep_html_and_head_opening_tags = true;
    cfg.keep_comments = false;
    cfg.minify_css = true;
    cfg.minify_js = true;
    let bytes = minify_html::minify(html.as_bytes(), &cfg);
    String::from_utf8(bytes).context("minified output is not valid UTF-8")
}

/// Tera function `t(key="...", name=value, ...)`: localized term with named
/// substitutions. The result is HTML; use it with `| safe`.
fn translate_function(
    i18n: Arc<I18n>,
) -> impl Fn(&HashMap<String, tera::Value>) -> tera::Result<tera::Value> + Send + Sync {
    move |args| {
        let key = match args.get("key") {
            Some(tera::Value::String(key)) => key,
            _ => return Err(tera::Error::msg("t() requires a string `key` argument")),
        };
        let named: Vec<(String, String)> = args
            .iter()
            .filter(|(name, _)| name.as_str() != "key")
            .map(|(name, value)| {
                let value = match value {
                    tera::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (name.clone(), value)
            })
            .collect();
        let named: Vec<(&str, &str)> = named
            .iter()
            .map(|(n, v)| (n.as_str(), v.as_str()))
            .collect();
        Ok(tera::Value::String(i18n.lookup(key).format(&[], &named)))
    }
}

/// Tera filter: format a `YYYY-MM-DD` date string
fn date_format_filter(
    value: &tera::Value,
    args: &HashMap<String, tera::Value>,
) -> tera::Result<tera::Value> {
    let s = tera::try_get_value!("date_format", "value", String, value);
    let format = match args.get("format") {
        Some(val) => tera::try_get_value!("date_format", "format", String, val),
        None => "%Y-%m-%d".to_string(),
    };

    match chrono::NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        Ok(date) => Ok(tera::Value::String(date.format(&format).to_string())),
        // Not a date: leave as-is
        Err(_) => Ok(tera::Value::String(s)),
    }
}

/// Build the context every render shares
pub fn shared_context(
    config: &SiteConfig,
    backend_version: &str,
    total_posts: usize,
    is_static: bool,
) -> Context {
    let year = chrono::Local::now().year();
    let mut context = Context::new();
    context.insert("config", config);
    context.insert("backend_version", backend_version);
    context.insert("total_posts", &total_posts);
    context.insert(
        "copyright",
        &config.copyright.as_ref().map(|c| c.notice(year)),
    );
    context.insert("is_static", &is_static);
    context.insert("link_suffix", link_suffix(is_static));
    context.insert("current_year", &year);
    context
}

/// Suffix appended to page links; static hosting needs the file extension
pub fn link_suffix(is_static: bool) -> &'static str {
    if is_static {
        ".html"
    } else {
        ""
    }
}

/// Bytes escaped in a URL path segment; unreserved characters stay readable
const SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Link to the page of tag `name`.
///
/// Static tag pages are written once per lower-cased name, so static links
/// are lower-cased too.
pub fn tag_path(name: &str, is_static: bool) -> String {
    let name = if is_static {
        name.to_lowercase()
    } else {
        name.to_string()
    };
    format!(
        "/tag/{}{}",
        utf8_percent_encode(&name, SEGMENT),
        link_suffix(is_static)
    )
}

/// Data structures for template context

#[derive(Debug, Clone, Serialize)]
pub struct PostData {
    pub slug: String,
    pub title: String,
    pub date: String,
    pub modified: String,
    pub path: String,
    pub tags: Vec<TagLink>,
    pub description: String,
    pub author: String,
    pub keywords: Vec<String>,
    /// Rendered body, only for the post page
    pub content: Option<String>,
}

impl PostData {
    /// Everything but the body
    pub fn summary(post: &Post, is_static: bool) -> Self {
        let meta = &post.metadata;
        Self {
            slug: post.slug.clone(),
            title: meta.title.clone(),
            date: meta.date.format("%Y-%m-%d").to_string(),
            modified: meta.modified.format("%Y-%m-%d").to_string(),
            path: format!("/post/{}{}", post.slug, link_suffix(is_static)),
            tags: meta
                .tags
                .iter()
                .map(|name| TagLink {
                    name: name.clone(),
                    path: tag_path(name, is_static),
                })
                .collect(),
            description: meta.description.clone(),
            author: meta.author.clone(),
            keywords: meta.keywords.clone(),
            content: None,
        }
    }

    /// Summary plus the rendered body
    pub fn full(post: &Post, markdown: &MarkdownRenderer, is_static: bool) -> Self {
        Self {
            content: Some(markdown.render(&post.content)),
            ..Self::summary(post, is_static)
        }
    }

    pub fn list<'a, I>(posts: I, is_static: bool) -> Vec<Self>
    where
        I: IntoIterator<Item = &'a Arc<Post>>,
    {
        posts
            .into_iter()
            .map(|p| Self::summary(p, is_static))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TagLink {
    pub name: String,
    pub path: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TagData {
    pub name: String,
    pub count: usize,
    pub path: String,
}

impl TagData {
    pub fn from_tag(tag: &Tag, is_static: bool) -> Self {
        Self {
            name: tag.name.clone(),
            count: tag.count,
            path: tag_path(&tag.name, is_static),
        }
    }
}
