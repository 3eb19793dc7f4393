//! HTML rendering.
//!
//! Every page shares one fixed layout; the functions here only decide what
//! goes inside it. Uses [maud](https://maud.lambda.xyz/) for compile-time
//! templating, so titles and other header values are escaped while rendered
//! bodies are inserted as-is.
//!
//! ## Pages
//!
//! | Page | Title |
//! |---|---|
//! | Home | `<site>` |
//! | Post | `<post> \| <site>` |
//! | Month index | `Posts from YYYY/MM \| <site>` |
//! | Year index | `Posts from YYYY \| <site>` |
//! | Archive | `Archives \| <site>` |
//! | Static page | `<page> \| <site>` |
//! | Error | `Error <code> \| <site>` |
//! | Gallery | `<gallery> \| <site>` |
//! | Gallery listing | `Galleries \| <site>` |
//!
//! Nothing rendered depends on the wall clock, so rebuilding unchanged
//! content yields identical bytes.

use crate::config::SiteConfig;
use crate::document::Document;
use maud::{DOCTYPE, Markup, PreEscaped, html};

/// One month of the archive page.
pub struct ArchiveMonth<'a> {
    pub month: &'a str,
    pub documents: &'a [Document],
}

/// One year of the archive page, months newest first.
pub struct ArchiveYear<'a> {
    pub year: &'a str,
    pub months: Vec<ArchiveMonth<'a>>,
}

/// A gallery master image and the files derived from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GalleryImage {
    /// File stem, `sunset`.
    pub name: String,
    /// `sunset.jpg`
    pub master: String,
    /// `sunset_z.jpg`
    pub resized: String,
    /// `sunset_thm.jpg`
    pub thumbnail: String,
}

impl GalleryImage {
    /// Page showing the single image, relative to the gallery folder.
    pub fn page(&self) -> String {
        format!("{}.htm", self.name)
    }
}

/// Fixed layouts, parameterised by the site identity.
pub struct Renderer {
    title: String,
    tagline: String,
    author: String,
    description: String,
    alias_prefix: String,
    galleries_prefix: String,
}

impl Renderer {
    pub fn new(config: &SiteConfig) -> Self {
        Self {
            title: config.site.title.clone(),
            tagline: config.site.tagline.clone(),
            author: config.site.author.clone(),
            description: config.site.description.clone(),
            alias_prefix: config.alias.public_prefix.clone(),
            galleries_prefix: config.paths.galleries_url_prefix(),
        }
    }

    fn page_title(&self, title: &str) -> String {
        format!("{title} | {}", self.title)
    }

    /// Renders the base HTML document structure
    fn base_document(&self, title: &str, content: Markup) -> Markup {
        html! {
            (DOCTYPE)
            html lang="en" {
                head {
                    meta charset="utf-8";
                    meta name="author" content=(self.author);
                    meta name="description" content=(self.description);
                    meta name="viewport" content="width=device-width, initial-scale=1";
                    link rel="icon" type="image/png" href="/images/favicon.png";
                    link rel="stylesheet" type="text/css" href="/css/app.css";
                    link rel="alternate" type="application/rss+xml" title={ (self.title) " feed" } href="/index.xml";
                    title { (title) }
                }
                body {
                    div.container {
                        (self.site_header())
                        main.twelve.columns {
                            (content)
                        }
                        (self.sidebar())
                    }
                    script src="/scripts/app.js" {}
                }
            }
        }
    }

    fn site_header(&self) -> Markup {
        html! {
            header.six.columns {
                h1 { a href="/" { (self.title) } }
                @if !self.tagline.is_empty() {
                    p.small { (self.tagline) }
                }
            }
        }
    }

    fn sidebar(&self) -> Markup {
        html! {
            aside.four.columns {
                h6 { a href="/about.htm" { "about" } }
                @if !self.description.is_empty() {
                    p.small { (self.description) }
                }
                ul.small {
                    li { a href="/archives.htm" { "archives" } }
                    li { a href=(self.galleries_prefix) { "galleries" } }
                    li { a href="/index.xml" { "feed" } }
                }
            }
        }
    }

    /// A post as it appears on listings and its own page.
    pub fn post_fragment(&self, doc: &Document) -> Markup {
        html! {
            article.post {
                div.eleven.columns {
                    h3 { a href=(doc.url()) title=(doc.title) { (doc.title) } }
                    p.small {
                        span.timeago title=(doc.date_iso()) { (doc.date_pretty()) }
                        @if let Some(short_url) = doc.short_url(&self.alias_prefix) {
                            " - "
                            a href=(short_url) { (short_url) }
                        }
                    }
                }
                div.eleven.columns {
                    (PreEscaped(&doc.rendered_body))
                }
            }
        }
    }

    pub fn post_page(&self, doc: &Document) -> Markup {
        self.base_document(&self.page_title(&doc.title), self.post_fragment(doc))
    }

    /// Documents one after another, in the given order.
    fn listing(&self, docs: &[Document]) -> Markup {
        html! {
            @for doc in docs {
                (self.post_fragment(doc))
            }
        }
    }

    pub fn home_page(&self, docs: &[Document]) -> Markup {
        self.base_document(&self.title, self.listing(docs))
    }

    pub fn month_page(&self, year: &str, month: &str, docs: &[Document]) -> Markup {
        let title = self.page_title(&format!("Posts from {year}/{month}"));
        self.base_document(&title, self.listing(docs))
    }

    pub fn year_page(&self, year: &str, docs: &[Document]) -> Markup {
        let title = self.page_title(&format!("Posts from {year}"));
        self.base_document(&title, self.listing(docs))
    }

    /// Nested year → month → post list.
    pub fn archive_page(&self, years: &[ArchiveYear<'_>]) -> Markup {
        let content = html! {
            div.eleven.columns { h3 { "Post Archives" } }
            div.eleven.columns {
                ul.square {
                    @for year in years {
                        li {
                            a href={ "/" (year.year) } { (year.year) }
                            ul.circle {
                                @for month in &year.months {
                                    li {
                                        a href={ "/" (year.year) "/" (month.month) } { (month.month) }
                                        ul {
                                            @for doc in month.documents {
                                                li { a href=(doc.url()) { (doc.title) } }
                                            }
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        };
        self.base_document(&self.page_title("Archives"), content)
    }

    /// A static page published at `url`.
    pub fn static_page(&self, doc: &Document, url: &str) -> Markup {
        let content = html! {
            div.eleven.columns {
                h3 { a href=(url) title=(doc.title) { (doc.title) } }
            }
            div.eleven.columns {
                (PreEscaped(&doc.rendered_body))
            }
        };
        self.base_document(&self.page_title(&doc.title), content)
    }

    pub fn error_page(&self, code: u16) -> Markup {
        let content = html! {
            div.eleven.columns { h3 { "Error " (code) } }
            div.eleven.columns {
                p { "Unfortunately, you've found one of those elusive error " (code) " pages." }
                p { "However you ended up here, this probably isn't where you wanted to be." }
                p {
                    "Perhaps you were looking for the " a href="/" { "home page" }
                    "? If not, maybe you can find what you need in the "
                    a href="/archives.htm" { "archives" } "."
                }
            }
        };
        self.base_document(&self.page_title(&format!("Error {code}")), content)
    }

    /// Gallery index: title, date, description, thumbnail grid.
    pub fn gallery_index(&self, doc: &Document, images: &[GalleryImage]) -> Markup {
        let content = html! {
            div.eleven.columns {
                h3 { (doc.title) }
                p.small { (doc.date_pretty()) }
            }
            div.eleven.columns {
                (PreEscaped(&doc.rendered_body))
            }
            div.gallery {
                @for image in images {
                    div.thumbnail {
                        a href=(image.page()) { img src=(image.thumbnail) alt=(image.name); }
                    }
                }
            }
        };
        self.base_document(&self.page_title(&doc.title), content)
    }

    /// Every gallery, newest first, linking its index.
    pub fn gallery_listing(&self, galleries: &[(&str, &Document)]) -> Markup {
        let content = html! {
            div.eleven.columns { h3 { "Galleries" } }
            div.eleven.columns {
                ul.square {
                    @for (name, doc) in galleries {
                        li {
                            a href={ (self.galleries_prefix) "/" (name) "/" } { (doc.title) }
                            " "
                            span.small { (doc.date_pretty()) }
                        }
                    }
                }
            }
        };
        self.base_document(&self.page_title("Galleries"), content)
    }

    /// Single gallery image, linking the master from the bounded variant.
    pub fn gallery_image_page(&self, gallery_title: &str, image: &GalleryImage) -> Markup {
        let content = html! {
            div.eleven.columns {
                h3 { (image.name) }
                p style="text-align:center;" {
                    a href=(image.master) {
                        img.scale-with-grid src=(image.resized) alt=(image.name);
                    }
                }
                p.small { a href="index.htm" { (gallery_title) } }
            }
        };
        self.base_document(&self.page_title(&image.name), content)
    }
}
