//! RSS 2.0 feed generation.
//!
//! One item per document: title, absolute link (also the permalink guid),
//! RFC 2822 publication date and the rendered body as description.

use crate::config::SiteConfig;
use crate::document::Document;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};

/// Render the channel for `docs`, in the given order.
pub fn render_feed(config: &SiteConfig, docs: &[Document]) -> String {
    let base_url = &config.site.base_url;
    let items: Vec<rss::Item> = docs.iter().map(|doc| document_to_item(doc, base_url)).collect();

    let channel = ChannelBuilder::default()
        .title(config.site.title.clone())
        .link(base_url.clone())
        .description(config.site.description.clone())
        .items(items)
        .build();

    channel.to_string()
}

fn document_to_item(doc: &Document, base_url: &str) -> rss::Item {
    let link = doc.absolute_url(base_url);
    ItemBuilder::default()
        .title(Some(doc.title.clone()))
        .link(Some(link.clone()))
        .guid(Some(GuidBuilder::default().permalink(true).value(link).build()))
        .pub_date(Some(doc.date_rfc2822()))
        .description(Some(doc.rendered_body.clone()))
        .build()
}
