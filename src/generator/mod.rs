//! Static site generator: renders every page of the site to files

use anyhow::{bail, Result};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tera::Context;
use walkdir::WalkDir;

use crate::config::SearchMethod;
use crate::content::{ContentStore, MarkdownRenderer, SortKey, TagOrder, DEFAULT_RECENT};
use crate::feed::FeedGenerator;
use crate::highlight::HighlightAssets;
use crate::templates::{shared_context, PostData, RenderOptions, TagData, TemplateRenderer};
use crate::{AmiaBlog, SOFTWARE, VERSION};

/// Name of the manifest written next to the generated pages
pub const BUILD_INFO_FILE: &str = "amiablog_build_info.txt";

/// What to do when the destination already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overwrite {
    /// Ask on the terminal
    Ask,
    /// Remove without asking
    Always,
    /// Refuse
    Never,
}

/// Summary of one generation run
#[derive(Debug, Clone)]
pub struct BuildInfo {
    pub build_time: String,
    pub duration_ms: f64,
    pub posts: usize,
    pub tags: usize,
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "software: {}", SOFTWARE)?;
        writeln!(f, "version: {}", VERSION)?;
        writeln!(f, "runtime: rust ({})", std::env::consts::FAMILY)?;
        writeln!(
            f,
            "platform: {}-{}",
            std::env::consts::OS,
            std::env::consts::ARCH
        )?;
        writeln!(f, "build_time: {}", self.build_time)?;
        writeln!(f, "build_time_usage: {:.2}ms", self.duration_ms)
    }
}

/// Static site generator
pub struct StaticGenerator {
    blog: AmiaBlog,
    destination: PathBuf,
    overwrite: Overwrite,
    store: ContentStore,
    renderer: TemplateRenderer,
    highlight: HighlightAssets,
    markdown: MarkdownRenderer,
}

impl StaticGenerator {
    /// Load posts, translations and templates for a static build
    pub fn new<P: AsRef<Path>>(blog: &AmiaBlog, destination: P, overwrite: Overwrite) -> Result<Self> {
        tracing::info!("Loading site data");
        let store = ContentStore::new(SearchMethod::Fullmatch).with_search_index(false);
        let report = store.load(&blog.post_source())?;
        tracing::info!("Loaded {} posts", report.loaded);

        let renderer = TemplateRenderer::from_dir(
            &blog.templates_dir,
            Arc::new(blog.i18n()),
            RenderOptions::from_config(&blog.config),
        )?;
        renderer.extend_shared(shared_context(
            &blog.config,
            &format!("{}-static", VERSION),
            store.len(),
            true,
        ));

        let highlight = HighlightAssets::new(
            &blog.static_dir,
            &blog.config.site_settings.hljs_languages,
        );

        Ok(Self {
            blog: blog.clone(),
            destination: destination.as_ref().to_path_buf(),
            overwrite,
            store,
            renderer,
            highlight,
            markdown: MarkdownRenderer::new(),
        })
    }

    /// Render the whole site
    pub async fn generate(&self) -> Result<BuildInfo> {
        let build_time = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let start = Instant::now();
        tracing::info!(
            "Generating static site with {} v{} to {:?}",
            SOFTWARE,
            VERSION,
            self.destination
        );
        self.renderer.set_shared("static_build_time", &build_time);

        if self.blog.config.highlight.fetch {
            if let Err(e) = self
                .highlight
                .fetch_missing(&self.blog.config.highlight.cdn)
                .await
            {
                tracing::warn!("Failed to fetch highlight.js languages: {}", e);
            }
        }

        self.prepare_destination()?;
        tracing::info!("Copying static assets");
        self.copy_static_assets()?;
        tracing::info!("Rendering top-layer pages");
        self.render_top_layers()?;
        tracing::info!("Rendering posts");
        self.render_posts()?;
        tracing::info!("Rendering tags");
        let tags = self.render_tags()?;

        let info = BuildInfo {
            build_time,
            duration_ms: start.elapsed().as_secs_f64() * 1000.0,
            posts: self.store.len(),
            tags,
        };
        tracing::info!(
            "Generation completed in {:.2} ms. Writing {}",
            info.duration_ms,
            BUILD_INFO_FILE
        );
        fs::write(self.destination.join(BUILD_INFO_FILE), info.to_string())?;
        Ok(info)
    }

    fn prepare_destination(&self) -> Result<()> {
        if self.destination.exists() {
            let remove = match self.overwrite {
                Overwrite::Always => true,
                Overwrite::Never => false,
                Overwrite::Ask => inquire::Confirm::new(&format!(
                    "Remove existing destination directory {:?}?",
                    self.destination
                ))
                .with_default(false)
                .prompt()?,
            };
            if !remove {
                bail!(
                    "destination {:?} already exists, terminating static site generation",
                    self.destination
                );
            }
            tracing::warn!("Removing existing destination directory {:?}", self.destination);
            fs::remove_dir_all(&self.destination)?;
        }
        fs::create_dir_all(&self.destination)?;
        Ok(())
    }

    /// Copy `static/` to `<dest>/static`, moving the favicon to the root
    fn copy_static_assets(&self) -> Result<()> {
        let source = &self.blog.static_dir;
        if !source.is_dir() {
            tracing::warn!("Static directory {:?} not found, skipping", source);
            return Ok(());
        }

        let target = self.destination.join("static");
        for entry in WalkDir::new(source).follow_links(true) {
            let entry = entry?;
            let relative = entry.path().strip_prefix(source)?;
            let dest = target.join(relative);
            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                fs::copy(entry.path(), &dest)?;
            }
        }

        let favicon = target.join("favicon.ico");
        if favicon.exists() {
            fs::rename(&favicon, self.destination.join("favicon.ico"))?;
        }
        Ok(())
    }

    fn render_top_layers(&self) -> Result<()> {
        tracing::info!("\tRendering: feed.xml");
        let feed = FeedGenerator::new(&self.blog.config, &self.store)
            .for_static_site()
            .generate(None);
        fs::write(self.destination.join("feed.xml"), feed)?;

        tracing::info!("\tRendering: index.html");
        let mut context = Context::new();
        context.insert(
            "recent_posts",
            &PostData::list(&self.store.recent(DEFAULT_RECENT), true),
        );
        self.renderer
            .render_to_file(self.destination.join("index.html"), "index.html", &context)?;

        tracing::info!("\tRendering: posts.html");
        let mut posts = self.store.all();
        SortKey::ModifiedDesc.sort(&mut posts);
        let mut context = Context::new();
        context.insert("posts", &PostData::list(&posts, true));
        context.insert("order", "modified_desc");
        self.renderer
            .render_to_file(self.destination.join("posts.html"), "posts.html", &context)?;

        tracing::info!("\tRendering: tags.html");
        let tags: Vec<TagData> = self
            .store
            .all_tags(TagOrder::PostCountDesc)
            .iter()
            .map(|t| TagData::from_tag(t, true))
            .collect();
        let mut context = Context::new();
        context.insert("n_tags", &tags.len());
        context.insert("tags", &tags);
        context.insert("order", "post_count");
        self.renderer
            .render_to_file(self.destination.join("tags.html"), "tags.html", &context)?;

        tracing::info!("\tRendering: 404.html (needs web server configuration to be used)");
        let mut context = Context::new();
        context.insert("status", &404);
        context.insert("error_key", "error_page_not_found");
        self.renderer
            .render_to_file(self.destination.join("404.html"), "error.html", &context)?;
        Ok(())
    }

    fn render_posts(&self) -> Result<()> {
        let posts = self.store.all();
        if posts.is_empty() {
            tracing::warn!("No posts found. Skipping.");
            return Ok(());
        }

        for post in posts {
            tracing::info!("\tRendering: post/{}.html", post.slug);
            let languages = self.markdown.code_languages(&post.content);
            let mut context = Context::new();
            context.insert("post", &PostData::full(&post, &self.markdown, true));
            context.insert("hljs_languages", &self.highlight.filter(&languages));
            self.renderer.render_to_file(
                self.destination.join("post").join(format!("{}.html", post.slug)),
                "post.html",
                &context,
            )?;
        }
        Ok(())
    }

    /// Returns the number of tag pages written.
    ///
    /// Tag lookup ignores case, so `Rust` and `rust` share one page named
    /// after the lower-cased tag.
    fn render_tags(&self) -> Result<usize> {
        let tags = self.store.all_tags(TagOrder::Insertion);
        if tags.is_empty() {
            tracing::warn!("No tags found. Skipping.");
            return Ok(0);
        }

        let mut written = HashSet::new();
        for tag in tags {
            let name = tag.name.to_lowercase();
            if written.contains(&name) {
                continue;
            }
            if !is_safe_file_name(&name) {
                tracing::warn!("Tag {:?} cannot be used as a file name. Skipping.", tag.name);
                continue;
            }
            let mut posts = self.store.by_tag(&name, None);
            if posts.is_empty() {
                tracing::warn!("Tag {} has no posts. Skipping.", tag.name);
                continue;
            }
            SortKey::ModifiedDesc.sort(&mut posts);

            tracing::info!("\tRendering: tag/{}.html", name);
            let mut context = Context::new();
            context.insert("tag", &tag.name);
            context.insert("posts", &PostData::list(&posts, true));
            self.renderer.render_to_file(
                self.destination.join("tag").join(format!("{}.html", name)),
                "tag.html",
                &context,
            )?;
            written.insert(name);
        }
        Ok(written.len())
    }
}

fn is_safe_file_name(name: &str) -> bool {
    !name.is_empty() && name != "." && name != ".." && !name.contains(['/', '\\'])
}
