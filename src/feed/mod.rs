//! RSS 2.0 feed generation

use rss::extension::atom::{AtomExtensionBuilder, Link};
use rss::{CategoryBuilder, ChannelBuilder, GuidBuilder, Item, ItemBuilder};
use std::collections::BTreeMap;

use crate::config::SiteConfig;
use crate::content::{ContentStore, MarkdownRenderer, Post, SortKey};
use crate::templates::link_suffix;
use crate::{SOFTWARE, VERSION};

const CONTENT_NAMESPACE: &str = "http://purl.org/rss/1.0/modules/content/";

/// Serializes the store's posts into an RSS document
pub struct FeedGenerator<'a> {
    config: &'a SiteConfig,
    store: &'a ContentStore,
    markdown: MarkdownRenderer,
    is_static: bool,
}

impl<'a> FeedGenerator<'a> {
    pub fn new(config: &'a SiteConfig, store: &'a ContentStore) -> Self {
        Self {
            config,
            store,
            markdown: MarkdownRenderer::new(),
            is_static: false,
        }
    }

    /// Link posts with the `.html` suffix used by static builds
    pub fn for_static_site(mut self) -> Self {
        self.is_static = true;
        self
    }

    /// Build the feed, newest modification first, at most `limit` items
    pub fn generate(&self, limit: Option<usize>) -> String {
        let mut posts = self.store.all();
        SortKey::ModifiedDesc.sort(&mut posts);
        if let Some(limit) = limit {
            posts.truncate(limit);
        }

        let base_url = self.config.base_url();
        let items: Vec<Item> = posts.iter().map(|p| self.item(p, base_url)).collect();

        let mut self_link = Link::default();
        self_link.set_href(format!("{}/feed.xml", base_url));
        self_link.set_rel("self");
        self_link.set_mime_type(Some("application/rss+xml".to_string()));

        let mut namespaces = BTreeMap::new();
        namespaces.insert("content".to_string(), CONTENT_NAMESPACE.to_string());

        let settings = &self.config.site_settings;
        let copyright = self
            .config
            .copyright
            .as_ref()
            .map(|c| c.notice(chrono::Datelike::year(&chrono::Local::now())));

        let channel = ChannelBuilder::default()
            .namespaces(namespaces)
            .title(settings.title.clone())
            .link(format!("{}/", base_url))
            .description(settings.description.clone())
            .language(Some(self.config.site_language.clone()))
            .copyright(copyright)
            .last_build_date(Some(chrono::Utc::now().to_rfc2822()))
            .generator(Some(format!("{} {}", SOFTWARE, VERSION)))
            .atom_ext(Some(
                AtomExtensionBuilder::default().links(vec![self_link]).build(),
            ))
            .items(items)
            .build();

        tracing::debug!("Generated feed with {} items", channel.items().len());
        channel.to_string()
    }

    fn item(&self, post: &Post, base_url: &str) -> Item {
        let meta = &post.metadata;
        let link = format!(
            "{}/post/{}{}",
            base_url,
            post.slug,
            link_suffix(self.is_static)
        );
        let pub_date = meta
            .date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc().to_rfc2822());
        let categories = meta
            .tags
            .iter()
            .map(|tag| CategoryBuilder::default().name(tag.clone()).build())
            .collect::<Vec<_>>();

        ItemBuilder::default()
            .title(Some(meta.title.clone()))
            .link(Some(link.clone()))
            .description(Some(meta.description.clone()))
            .pub_date(pub_date)
            .guid(Some(GuidBuilder::default().permalink(true).value(link).build()))
            .author(Some(meta.author.clone()))
            .content(Some(self.markdown.render(&post.content)))
            .categories(categories)
            .build()
    }
}
