use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context as _;
use chrono::NaiveDate;

use crate::api::{ApiClient, FetchOutcome};
use crate::book::EditionBuilder;
use crate::cli::Cli;
use crate::edition::Edition;
use crate::fetch::CachedFetcher;
use crate::render::ArticleContext;
use crate::{api, convert, cover, index, opf, render, toc};

/// Run the whole daily pipeline: cover, index scan, one page per article,
/// contents and navigation, package manifest, optional conversion.
pub fn run(args: Cli) -> anyhow::Result<()> {
    let date = match &args.date {
        Some(s) => NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .with_context(|| format!("parse --date: {s}"))?,
        None => chrono::Local::now().date_naive(),
    };
    let edition = Edition::for_date(date);
    tracing::info!(paper = edition.paper, date = %edition.date, "building edition");

    let out_dir = PathBuf::from(&args.out).join(edition.date.to_string());
    std::fs::create_dir_all(&out_dir)
        .with_context(|| format!("create edition dir: {}", out_dir.display()))?;

    let logo_path = PathBuf::from(&args.logo_dir).join(edition.logo_filename());
    cover::generate(&logo_path, &out_dir).context("generate cover")?;

    let api_key_path = match &args.api_key_file {
        Some(path) => PathBuf::from(path),
        None => default_api_key_path()?,
    };
    let api_key = api::load_api_key(&api_key_path)?;

    let fetcher = CachedFetcher::new(
        &out_dir.join("cache"),
        Duration::from_millis(args.delay_ms),
    )
    .context("set up fetch cache")?;
    let client = ApiClient::new(&fetcher, &args.api_base, &api_key);

    let index_url = args
        .index_url
        .clone()
        .unwrap_or_else(|| edition.index_url());
    let sections = index::scan(&fetcher, &index_url)?;

    let mut builder = EditionBuilder::new();
    for section in &sections {
        tracing::info!(
            section = %section.label,
            articles = section.articles.len(),
            "rendering section"
        );
        for link in &section.articles {
            let Some(item_id) = index::item_id(&link.href) else {
                tracing::warn!(href = %link.href, "failed to parse the article link; skipping");
                continue;
            };

            let outcome = client.fetch_article(item_id)?;
            match &outcome {
                FetchOutcome::NotOk { status } => {
                    tracing::warn!(item_id, %status, "response status was not ok; skipping");
                    continue;
                }
                FetchOutcome::Denied { message } => {
                    tracing::warn!(item_id, %message, "access denied; rendering placeholder");
                }
                FetchOutcome::Missing { message } => {
                    tracing::warn!(item_id, %message, "article gone; rendering placeholder");
                }
                FetchOutcome::Fetched(_) => {}
            }

            let ctx = ArticleContext {
                edition: &edition,
                section_label: &section.label,
                link,
            };
            let filename = render::render_article(&fetcher, &out_dir, &mut builder, &ctx, outcome)
                .with_context(|| format!("render article: {item_id}"))?;
            tracing::debug!(item_id, filename, "page written");
        }
    }

    let contents = toc::render_contents(&builder);
    let contents_path = out_dir.join(toc::CONTENTS_FILENAME);
    std::fs::write(&contents_path, contents)
        .with_context(|| format!("write contents: {}", contents_path.display()))?;
    builder.set_headline(toc::CONTENTS_FILENAME, "Table of Contents");

    let ncx = toc::render_ncx(&edition, &builder);
    let nav_path = out_dir.join(toc::NAV_FILENAME);
    std::fs::write(&nav_path, ncx)
        .with_context(|| format!("write navigation: {}", nav_path.display()))?;

    builder.record_asset(toc::CONTENTS_FILENAME);
    builder.record_asset(toc::NAV_FILENAME);
    builder.record_asset(cover::COVER_GIF_FILENAME);
    builder.record_asset(cover::MASTHEAD_FILENAME);

    let opf_document = opf::render_opf(&edition, &builder).context("assemble package")?;
    let opf_filename = edition.opf_filename();
    let opf_path = out_dir.join(&opf_filename);
    std::fs::write(&opf_path, opf_document)
        .with_context(|| format!("write package: {}", opf_path.display()))?;

    convert::run_kindlegen(
        &args.kindlegen,
        &out_dir,
        &opf_filename,
        &edition.mobi_filename(),
    )?;

    let pages = builder
        .files()
        .iter()
        .filter(|f| f.ends_with(".html") && f.as_str() != toc::CONTENTS_FILENAME)
        .count();
    tracing::info!(
        pages,
        files = builder.files().len(),
        out = %out_dir.display(),
        "edition complete"
    );
    Ok(())
}

fn default_api_key_path() -> anyhow::Result<PathBuf> {
    let home = std::env::var_os("HOME")
        .ok_or_else(|| anyhow::anyhow!("HOME is not set; pass --api-key-file"))?;
    Ok(PathBuf::from(home).join(".guardian-open-platform-key"))
}
