//! Live blog server

use anyhow::Result;
use axum::{
    extract::{Path as UrlPath, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use notify_debouncer_mini::{new_debouncer, notify::RecursiveMode};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tera::Context;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use crate::config::SiteConfig;
use crate::content::{
    ContentStore, MarkdownRenderer, PostSource, SearchOrder, SortKey, StoreError, StoreView,
    TagOrder, DEFAULT_RECENT,
};
use crate::feed::FeedGenerator;
use crate::highlight::HighlightAssets;
use crate::i18n::I18n;
use crate::templates::{shared_context, PostData, RenderOptions, TagData, TemplateRenderer};
use crate::{AmiaBlog, SOFTWARE, VERSION};

/// Longest accepted search query, in characters
pub const MAX_QUERY_CHARS: usize = 50;

/// Request failures, rendered with `error.html`
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),

    #[error("page not found")]
    NotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound => StatusCode::NOT_FOUND,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Translation key of the message shown on the error page
    fn term(&self) -> &'static str {
        match self {
            AppError::BadRequest(_) => "error_bad_request",
            AppError::NotFound => "error_page_not_found",
            AppError::Internal(_) => "error_internal",
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::IndexNotBuilt => AppError::Internal(err.into()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

type PageResult = std::result::Result<Response, AppError>;

/// Everything a request handler needs
pub struct AppState {
    pub config: Arc<SiteConfig>,
    pub store: Arc<ContentStore>,
    pub renderer: Arc<TemplateRenderer>,
    pub i18n: Arc<I18n>,
    pub highlight: Arc<HighlightAssets>,
    pub static_dir: PathBuf,
    markdown: MarkdownRenderer,
}

impl AppState {
    /// Load posts, translations and templates of `blog`
    pub fn new(blog: &AmiaBlog) -> Result<Self> {
        let store = ContentStore::new(blog.config.search_method);
        store.load(&blog.post_source())?;

        let i18n = Arc::new(blog.i18n());
        let renderer = TemplateRenderer::from_dir(
            &blog.templates_dir,
            Arc::clone(&i18n),
            RenderOptions::from_config(&blog.config),
        )?;
        let highlight = HighlightAssets::new(
            &blog.static_dir,
            &blog.config.site_settings.hljs_languages,
        );

        Ok(Self::from_parts(
            blog.config.clone(),
            store,
            renderer,
            i18n,
            highlight,
            blog.static_dir.clone(),
        ))
    }

    pub fn from_parts(
        config: SiteConfig,
        store: ContentStore,
        renderer: TemplateRenderer,
        i18n: Arc<I18n>,
        highlight: HighlightAssets,
        static_dir: PathBuf,
    ) -> Self {
        renderer.extend_shared(shared_context(&config, VERSION, store.len(), false));
        Self {
            config: Arc::new(config),
            store: Arc::new(store),
            renderer: Arc::new(renderer),
            i18n,
            highlight: Arc::new(highlight),
            static_dir,
            markdown: MarkdownRenderer::new(),
        }
    }

    /// Reload posts from `source`; readers keep the old posts until done
    pub fn reload<S: PostSource + ?Sized>(&self, source: &S) -> Result<()> {
        self.store.load(source)?;
        Ok(())
    }

    fn respond(&self, result: PageResult) -> Response {
        result.unwrap_or_else(|err| self.error_page(err))
    }

    fn error_page(&self, err: AppError) -> Response {
        let status = err.status();
        match &err {
            AppError::Internal(e) => tracing::error!("Request failed: {:#}", e),
            other => tracing::debug!("Request rejected: {}", other),
        }

        let mut context = page_context(&self.store.view());
        context.insert("status", &status.as_u16());
        context.insert("error_key", err.term());
        if let AppError::BadRequest(message) = &err {
            context.insert("message", message);
        }
        match self.renderer.render_with_status("error.html", &context, status) {
            Ok(response) => response,
            Err(e) => {
                tracing::error!("Failed to render error page: {:#}", e);
                (status, err.to_string()).into_response()
            }
        }
    }
}

/// Per-request context; `total_posts` comes from the same view as the page
fn page_context(view: &StoreView) -> Context {
    let mut context = Context::new();
    context.insert("total_posts", &view.len());
    context
}

/// Build the router for `state`
pub fn router(state: Arc<AppState>) -> Router {
    let static_files = ServeDir::new(&state.static_dir);
    let favicon = ServeFile::new(state.static_dir.join("favicon.ico"));

    Router::new()
        .route("/", get(index))
        .route("/posts", get(posts))
        .route("/post/:slug", get(post))
        .route("/tags", get(tags))
        .route("/tag/:tag", get(tag))
        .route("/search", get(search))
        .route("/feed.xml", get(feed))
        .route("/api/status", get(status))
        .nest_service("/static", static_files)
        .route_service("/favicon.ico", favicon)
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the server
pub async fn start(blog: &AmiaBlog, ip: &str, port: u16, watch: bool) -> Result<()> {
    let state = Arc::new(AppState::new(blog)?);

    if blog.config.highlight.fetch {
        let highlight = Arc::clone(&state.highlight);
        let cdn = blog.config.highlight.cdn.clone();
        tokio::spawn(async move {
            if let Err(e) = highlight.fetch_missing(&cdn).await {
                tracing::warn!("Failed to fetch highlight.js languages: {}", e);
            }
        });
    }

    if watch {
        let state = Arc::clone(&state);
        let posts_dir = blog.posts_dir.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(e) = watch_and_reload(posts_dir, state) {
                tracing::error!("File watcher error: {}", e);
            }
        });
    }

    // Parse address - handle "localhost" specially
    let bind_ip = if ip == "localhost" { "127.0.0.1" } else { ip };
    let addr: SocketAddr = format!("{}:{}", bind_ip, port).parse()?;

    println!("Server running at http://{}:{}", ip, port);
    if watch {
        println!("Watching {:?} for changes...", blog.posts_dir);
    }
    println!("Press Ctrl+C to stop.");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router(state)).await?;

    Ok(())
}

/// Reload the store whenever the posts directory changes
fn watch_and_reload(posts_dir: PathBuf, state: Arc<AppState>) -> Result<()> {
    let (tx, rx) = std::sync::mpsc::channel();
    let mut debouncer = new_debouncer(Duration::from_millis(500), tx)?;
    debouncer
        .watcher()
        .watch(&posts_dir, RecursiveMode::Recursive)?;
    tracing::debug!("Watching: {:?}", posts_dir);

    let source = crate::content::DirectorySource::new(&posts_dir);
    loop {
        match rx.recv() {
            Ok(Ok(events)) => {
                let relevant = events.iter().any(|e| {
                    let path = e.path.to_string_lossy();
                    !path.contains(".git") && !path.ends_with('~')
                });
                if !relevant {
                    continue;
                }
                tracing::info!("Posts changed, reloading...");
                if let Err(e) = state.reload(&source) {
                    tracing::error!("Reload failed: {:#}", e);
                }
            }
            Ok(Err(e)) => {
                tracing::error!("Watch error: {:?}", e);
            }
            Err(e) => {
                tracing::error!("Channel error: {:?}", e);
                break;
            }
        }
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
struct OrderQuery {
    order: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SearchQuery {
    q: Option<String>,
    order: Option<String>,
}

async fn index(State(state): State<Arc<AppState>>) -> Response {
    let view = state.store.view();
    let mut context = page_context(&view);
    context.insert(
        "recent_posts",
        &PostData::list(&view.recent(DEFAULT_RECENT), false),
    );
    state.respond(state.renderer.render("index.html", &context).map_err(AppError::from))
}

async fn posts(State(state): State<Arc<AppState>>, Query(query): Query<OrderQuery>) -> Response {
    state.respond(posts_page(&state, &query))
}

fn posts_page(state: &AppState, query: &OrderQuery) -> PageResult {
    let order = query.order.as_deref().unwrap_or("modified_desc");
    let view = state.store.view();
    let posts = ContentStore::order(view.all(), order)?;
    let mut context = page_context(&view);
    context.insert("posts", &PostData::list(&posts, false));
    context.insert("order", order);
    Ok(state.renderer.render("posts.html", &context)?)
}

async fn post(State(state): State<Arc<AppState>>, UrlPath(slug): UrlPath<String>) -> Response {
    state.respond(post_page(&state, &slug))
}

fn post_page(state: &AppState, slug: &str) -> PageResult {
    let view = state.store.view();
    let post = view.get(slug).ok_or(AppError::NotFound)?;
    let languages = state.markdown.code_languages(&post.content);
    let mut context = page_context(&view);
    context.insert("post", &PostData::full(&post, &state.markdown, false));
    context.insert("hljs_languages", &state.highlight.filter(&languages));
    Ok(state.renderer.render("post.html", &context)?)
}

async fn tags(State(state): State<Arc<AppState>>, Query(query): Query<OrderQuery>) -> Response {
    state.respond(tags_page(&state, &query))
}

fn tags_page(state: &AppState, query: &OrderQuery) -> PageResult {
    let order_name = query.order.as_deref().unwrap_or("post_count");
    let order: TagOrder = order_name.parse()?;
    let view = state.store.view();
    let tags: Vec<TagData> = view
        .all_tags(order)
        .iter()
        .map(|t| TagData::from_tag(t, false))
        .collect();
    let mut context = page_context(&view);
    context.insert("n_tags", &tags.len());
    context.insert("tags", &tags);
    context.insert("order", order_name);
    Ok(state.renderer.render("tags.html", &context)?)
}

async fn tag(State(state): State<Arc<AppState>>, UrlPath(tag): UrlPath<String>) -> Response {
    state.respond(tag_page(&state, &tag))
}

fn tag_page(state: &AppState, tag: &str) -> PageResult {
    let view = state.store.view();
    let mut posts = view.by_tag(tag, None);
    if posts.is_empty() {
        return Err(AppError::NotFound);
    }
    SortKey::ModifiedDesc.sort(&mut posts);
    let mut context = page_context(&view);
    context.insert("tag", tag);
    context.insert("posts", &PostData::list(&posts, false));
    Ok(state.renderer.render("tag.html", &context)?)
}

async fn search(State(state): State<Arc<AppState>>, Query(query): Query<SearchQuery>) -> Response {
    state.respond(search_page(&state, &query))
}

fn search_page(state: &AppState, query: &SearchQuery) -> PageResult {
    let keyword = query.q.as_deref().unwrap_or_default().trim();
    let length = keyword.chars().count();
    if length == 0 || length > MAX_QUERY_CHARS {
        return Err(AppError::BadRequest(format!(
            "search query must be 1 to {} characters",
            MAX_QUERY_CHARS
        )));
    }

    let view = state.store.view();
    let posts = match query.order.as_deref() {
        Some(order) => view.search_ordered(keyword, order.parse::<SearchOrder>()?)?,
        None => view.search(keyword)?,
    };

    let mut context = page_context(&view);
    context.insert("query", keyword);
    context.insert("order", &query.order);
    context.insert("search_method", &state.store.strategy());
    context.insert("supports_relevance", &state.store.supports_relevance());
    context.insert("posts", &PostData::list(&posts, false));
    Ok(state.renderer.render("search.html", &context)?)
}

async fn feed(State(state): State<Arc<AppState>>) -> Response {
    let xml = FeedGenerator::new(&state.config, &state.store).generate(None);
    (
        [(header::CONTENT_TYPE, "application/rss+xml; charset=utf-8")],
        xml,
    )
        .into_response()
}

async fn status() -> Response {
    Json(serde_json::json!({
        "status": "ok",
        "server": SOFTWARE,
        "version": VERSION,
    }))
    .into_response()
}

async fn not_found(State(state): State<Arc<AppState>>) -> Response {
    state.error_page(AppError::NotFound)
}
