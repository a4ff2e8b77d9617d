use std::path::Path;

use anyhow::Context as _;
use scraper::{Html, Selector};
use sha2::Digest as _;

use crate::api::FetchOutcome;
use crate::book::{EditionBuilder, PageMeta};
use crate::edition::Edition;
use crate::fetch::CachedFetcher;
use crate::index::ArticleLink;

/// Marker the API leaves in place of a body it may not syndicate.
const RESTRICTED_MARKER: &str = "Redistribution rights for this field are unavailable";

/// Fixed apology body used whenever the marker is present.
pub const RESTRICTED_BODY: &str =
    "<p><b>Redistribution rights for this article were not available.</b></p>";

const OPEN_PLATFORM_URL: &str = "https://www.theguardian.com/open-platform";

pub struct ArticleContext<'a> {
    pub edition: &'a Edition,
    pub section_label: &'a str,
    pub link: &'a ArticleLink,
}

/// Render one article into a self-contained XHTML page, localizing its
/// thumbnail and inline images, and record everything with the builder.
/// Denied and missing articles still produce a valid page; only faults the
/// package cannot absorb (image fetch failures, I/O) are returned as
/// errors.
pub fn render_article(
    fetcher: &CachedFetcher,
    out_dir: &Path,
    builder: &mut EditionBuilder,
    ctx: &ArticleContext,
    outcome: FetchOutcome,
) -> anyhow::Result<String> {
    let number = builder.next_page_number();
    let filename = page_filename(number);

    let mut headline = "[No headline found]".to_owned();
    let mut byline = None;
    let mut standfirst = None;
    let mut section_name = None;
    let mut thumbnail = None;
    let mut short_url = None;
    let body;

    match outcome {
        FetchOutcome::Fetched(record) => {
            if let Some(h) = record.headline {
                headline = h;
            }
            byline = record.byline;
            standfirst = record.standfirst;
            section_name = record.section_name;
            thumbnail = record.thumbnail;
            short_url = record.short_url;
            body = record.body.map(|b| substitute_restricted_body(&b));
        }
        FetchOutcome::Denied { message } | FetchOutcome::Missing { message } => {
            if !ctx.link.text.is_empty() {
                headline = ctx.link.text.clone();
            }
            body = Some(placeholder_body(&message, &ctx.link.href));
        }
        FetchOutcome::NotOk { status } => {
            anyhow::bail!("article response status was {status:?}; nothing to render");
        }
    }

    let mut markup = String::new();
    markup.push_str(&format!("<h3>{}</h3>\n", xml_escape(&headline)));
    if let Some(byline) = &byline {
        markup.push_str(&format!("<h4>By {}</h4>\n", xml_escape(byline)));
    }
    match &section_name {
        Some(name) => markup.push_str(&format!(
            "<p>[{}: {}]</p>\n",
            xml_escape(ctx.section_label),
            xml_escape(name)
        )),
        None => markup.push_str(&format!("<p>[{}]</p>\n", xml_escape(ctx.section_label))),
    }
    if let Some(standfirst) = &standfirst {
        markup.push_str(&format!("<p><em>{standfirst}</em></p>\n"));
    }

    if let Some(thumbnail) = &thumbnail {
        match thumbnail_extension(thumbnail) {
            Some(extension) => {
                let thumb_filename = format!("{number:03}-thumb.{extension}");
                let response = fetcher
                    .fetch(thumbnail)
                    .with_context(|| format!("fetch thumbnail: {thumbnail}"))?;
                if !response.is_success() {
                    anyhow::bail!(
                        "thumbnail fetch returned HTTP {}: {thumbnail}",
                        response.status
                    );
                }
                std::fs::write(out_dir.join(&thumb_filename), &response.body)
                    .with_context(|| format!("write thumbnail: {thumb_filename}"))?;
                builder.record_asset(&thumb_filename);
                markup.push_str(&format!("<p><img src=\"{thumb_filename}\" /></p>\n"));
            }
            None => {
                tracing::debug!(url = %thumbnail, "thumbnail URL has no usable extension; skipping");
            }
        }
    }

    if let Some(body) = &body {
        let localized = localize_body_images(fetcher, out_dir, builder, body)
            .context("localize body images")?;
        markup.push_str(&localized);
        if !localized.ends_with('\n') {
            markup.push('\n');
        }
    }

    if let Some(short_url) = &short_url {
        markup.push_str(&format!(
            "<p>Original story: <a href=\"{0}\">{0}</a></p>\n",
            xml_escape(short_url)
        ));
    }
    markup.push_str(&format!(
        "<p>Content from the <a href=\"{OPEN_PLATFORM_URL}\">Guardian Open Platform</a></p>\n"
    ));

    let headline_text = strip_tags(&headline);
    let title = format!(
        "{} on {}: [{}] {}",
        ctx.edition.paper, ctx.edition.date, number, headline_text
    );
    let author = byline.as_deref().map(strip_tags).unwrap_or_default();
    let description = standfirst.as_deref().map(strip_tags).unwrap_or_default();
    let document = wrap_page(&title, &author, &description, &ensure_void_tags(&markup));

    let page_path = out_dir.join(&filename);
    std::fs::write(&page_path, document)
        .with_context(|| format!("write page: {}", page_path.display()))?;

    builder.record_page(
        &filename,
        PageMeta {
            headline: headline_text,
            section: ctx.section_label.to_owned(),
            description,
            author,
        },
    );

    Ok(filename)
}

pub fn page_filename(number: usize) -> String {
    format!("{number:03}.html")
}

fn wrap_page(title: &str, author: &str, description: &str, body_markup: &str) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
    out.push_str(
        "<html xmlns=\"http://www.w3.org/1999/xhtml\" xml:lang=\"en\" lang=\"en\">\n",
    );
    out.push_str("<head>\n");
    out.push_str("  <meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\" />\n");
    out.push_str(&format!("  <title>{}</title>\n", xml_escape(title)));
    out.push_str(&format!(
        "  <meta name=\"author\" content=\"{}\" />\n",
        xml_escape(author)
    ));
    out.push_str(&format!(
        "  <meta name=\"description\" content=\"{}\" />\n",
        xml_escape(description)
    ));
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str(body_markup);
    if !body_markup.ends_with('\n') {
        out.push('\n');
    }
    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

fn placeholder_body(message: &str, href: &str) -> String {
    format!(
        "<p><b>The Guardian Open Platform returned an error for this article: {}</b></p>\n\
         <p>You can still try <a href=\"{}\">the original article link</a></p>",
        xml_escape(message),
        xml_escape(href)
    )
}

/// The marker only ever arrives in a stub body, so the length check keeps
/// real articles that merely quote the phrase intact.
fn substitute_restricted_body(body: &str) -> String {
    if body.contains(RESTRICTED_MARKER) && body.len() < 100 {
        tracing::warn!("no redistribution rights for this article");
        RESTRICTED_BODY.to_owned()
    } else {
        body.to_owned()
    }
}

/// Fetch every image the body embeds, store it under a name derived from a
/// hash of its bytes, and point the markup at the local copy. Identical
/// images shared between articles land in one file.
fn localize_body_images(
    fetcher: &CachedFetcher,
    out_dir: &Path,
    builder: &mut EditionBuilder,
    body: &str,
) -> anyhow::Result<String> {
    let img_selector = Selector::parse("img[src]")
        .map_err(|err| anyhow::anyhow!("parse selector img[src]: {err}"))?;

    let fragment = Html::parse_fragment(body);
    let mut sources: Vec<String> = Vec::new();
    for element in fragment.select(&img_selector) {
        if let Some(src) = element.value().attr("src")
            && !sources.iter().any(|s| s == src)
        {
            sources.push(src.to_owned());
        }
    }

    let mut out = body.to_owned();
    for src in sources {
        let response = fetcher
            .fetch(&src)
            .with_context(|| format!("fetch inline image: {src}"))?;
        if !response.is_success() {
            anyhow::bail!("inline image fetch returned HTTP {}: {src}", response.status);
        }

        let mut hasher = sha2::Sha256::new();
        hasher.update(&response.body);
        let local = format!("img-{}.gif", hex::encode(hasher.finalize()));

        let path = out_dir.join(&local);
        if !path.exists() {
            std::fs::write(&path, &response.body)
                .with_context(|| format!("write inline image: {local}"))?;
        }
        builder.record_asset(&local);

        for quoted_src in [src.clone(), src.replace('&', "&amp;")] {
            out = out.replace(
                &format!("src=\"{quoted_src}\""),
                &format!("src=\"{local}\""),
            );
            out = out.replace(&format!("src='{quoted_src}'"), &format!("src='{local}'"));
        }
    }

    Ok(out)
}

fn thumbnail_extension(url: &str) -> Option<String> {
    let path = url::Url::parse(url).ok()?.path().to_owned();
    let (_, extension) = path.rsplit('/').next()?.rsplit_once('.')?;
    if extension.is_empty() || !extension.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(extension.to_ascii_lowercase())
}

pub(crate) fn strip_tags(markup: &str) -> String {
    if markup.is_empty() {
        return String::new();
    }
    let fragment = Html::parse_fragment(markup);
    fragment.root_element().text().collect()
}

pub(crate) fn xml_escape(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

/// Convert void tags like `<img ...>` into `<img ... />` so upstream body
/// markup stays well-formed XHTML.
pub(crate) fn ensure_void_tags(html: &str) -> String {
    const VOID_TAGS: &[&str] = &[
        "area", "base", "br", "col", "embed", "hr", "img", "input", "link", "meta", "param",
        "source", "track", "wbr",
    ];

    let bytes = html.as_bytes();
    let mut out = String::with_capacity(html.len());
    let mut cursor = 0;

    while let Some(rel_lt) = html[cursor..].find('<') {
        let lt = cursor + rel_lt;
        out.push_str(&html[cursor..lt]);

        // Find the closing `>` while respecting quoted attribute values.
        let mut in_quote: Option<u8> = None;
        let mut gt = lt + 1;
        while gt < bytes.len() {
            let b = bytes[gt];
            if let Some(q) = in_quote {
                if b == q {
                    in_quote = None;
                }
                gt += 1;
                continue;
            }
            if b == b'"' || b == b'\'' {
                in_quote = Some(b);
                gt += 1;
                continue;
            }
            if b == b'>' {
                break;
            }
            gt += 1;
        }
        if gt >= bytes.len() {
            // Malformed markup; pass the rest through untouched.
            out.push_str(&html[lt..]);
            return out;
        }

        let raw_tag = &html[lt..=gt];

        // Comments, doctypes, processing instructions and end tags pass through.
        if raw_tag
            .as_bytes()
            .get(1)
            .is_some_and(|b| matches!(b, b'!' | b'?' | b'/'))
        {
            out.push_str(raw_tag);
            cursor = gt + 1;
            continue;
        }

        let name_start = lt + 1;
        let mut name_end = name_start;
        while name_end < gt && (bytes[name_end] as char).is_ascii_alphabetic() {
            name_end += 1;
        }
        if name_end == name_start {
            out.push_str(raw_tag);
            cursor = gt + 1;
            continue;
        }

        let tag_name = html[name_start..name_end].to_ascii_lowercase();
        if !VOID_TAGS.contains(&tag_name.as_str()) {
            out.push_str(raw_tag);
            cursor = gt + 1;
            continue;
        }

        let tag_without_gt = &html[lt..gt];
        if tag_without_gt.trim_end().ends_with('/') {
            out.push_str(raw_tag);
        } else {
            out.push_str(tag_without_gt);
            out.push_str(" />");
        }

        cursor = gt + 1;
    }

    out.push_str(&html[cursor..]);
    out
}
