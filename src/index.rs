use anyhow::Context as _;
use scraper::{Html, Selector};

use crate::fetch::CachedFetcher;

/// One section of the daily index page, in page order.
#[derive(Debug, Clone)]
pub struct IndexSection {
    pub label: String,
    pub articles: Vec<ArticleLink>,
}

#[derive(Debug, Clone)]
pub struct ArticleLink {
    pub href: String,
    pub text: String,
}

const ARTICLE_URL_PREFIXES: &[&str] = &[
    "https://www.theguardian.com/",
    "http://www.theguardian.com/",
];

/// Fetch the daily index page and read out its section groups. An index
/// page with no sections at all cannot be used and aborts the run.
pub fn scan(fetcher: &CachedFetcher, index_url: &str) -> anyhow::Result<Vec<IndexSection>> {
    let response = fetcher
        .fetch(index_url)
        .with_context(|| format!("fetch index page: {index_url}"))?;
    if !response.is_success() {
        anyhow::bail!("index page returned HTTP {}: {index_url}", response.status);
    }

    let html = String::from_utf8_lossy(&response.body).into_owned();
    let sections = parse_index(&html)?;
    if sections.is_empty() {
        anyhow::bail!("no article sections found in the index page: {index_url}");
    }

    let total: usize = sections.iter().map(|s| s.articles.len()).sum();
    tracing::info!(sections = sections.len(), articles = total, "scanned index page");
    Ok(sections)
}

fn parse_index(html: &str) -> anyhow::Result<Vec<IndexSection>> {
    let section_selector = selector("ul.timeline > li")?;
    let label_selector = selector("h2 > a")?;
    let link_selector = selector("ul > li > a")?;

    let document = Html::parse_document(html);
    let mut sections = Vec::new();

    for section in document.select(&section_selector) {
        let Some(label_element) = section.select(&label_selector).next() else {
            continue;
        };
        let label = label_element.text().collect::<String>().trim().to_owned();

        let mut articles = Vec::new();
        for link in section.select(&link_selector) {
            let Some(href) = link.value().attr("href") else {
                continue;
            };
            articles.push(ArticleLink {
                href: href.to_owned(),
                text: link.text().collect::<String>().trim().to_owned(),
            });
        }

        sections.push(IndexSection { label, articles });
    }

    Ok(sections)
}

/// The item identifier is the article URL's path under the paper's
/// canonical host. Links of any other shape are not articles.
pub fn item_id(href: &str) -> Option<&str> {
    ARTICLE_URL_PREFIXES
        .iter()
        .find_map(|prefix| href.strip_prefix(prefix))
        .filter(|id| !id.is_empty())
}

fn selector(css: &str) -> anyhow::Result<Selector> {
    Selector::parse(css).map_err(|err| anyhow::anyhow!("parse selector {css:?}: {err}"))
}
