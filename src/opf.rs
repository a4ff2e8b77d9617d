use anyhow::Context as _;

use crate::book::EditionBuilder;
use crate::edition::Edition;
use crate::render::xml_escape;
use crate::toc::{CONTENTS_FILENAME, NAV_FILENAME};

/// The package format knows exactly these media types. Everything the run
/// produces must map; an unknown extension means the package would be
/// invalid, so it aborts the run.
pub fn media_type_for_extension(extension: &str) -> anyhow::Result<&'static str> {
    match extension {
        "gif" => Ok("image/gif"),
        "html" => Ok("application/xhtml+xml"),
        "jpg" | "jpeg" => Ok("image/jpeg"),
        "png" => Ok("image/png"),
        "ncx" => Ok("application/x-dtbncx+xml"),
        other => anyhow::bail!("unknown extension: {other}"),
    }
}

/// Render the OPF package document: metadata, one manifest item per
/// produced file, the reading-order spine (contents page first), and the
/// guide pointing at the contents page and the first article.
pub fn render_opf(edition: &Edition, builder: &EditionBuilder) -> anyhow::Result<String> {
    let first_page = crate::render::page_filename(1);
    let first_headline = builder
        .headline(&first_page)
        .ok_or_else(|| anyhow::anyhow!("no first page ({first_page}) to anchor the guide"))?;

    let mut out = String::new();
    out.push_str("<?xml version='1.0' encoding='utf-8'?>\n");
    out.push_str(&format!(
        "<package xmlns=\"http://www.idpf.org/2007/opf\" version=\"2.0\" unique-identifier=\"{}\">\n",
        xml_escape(&edition.book_id())
    ));

    out.push_str("  <metadata>\n");
    out.push_str("    <dc-metadata xmlns:dc=\"http://purl.org/dc/elements/1.1/\">\n");
    out.push_str(&format!(
        "      <dc:title>{}</dc:title>\n",
        xml_escape(&edition.short_title())
    ));
    out.push_str("      <dc:language>en-gb</dc:language>\n");
    out.push_str("      <meta name=\"cover\" content=\"cover-image\" />\n");
    out.push_str(&format!(
        "      <dc:creator>{}</dc:creator>\n",
        xml_escape(edition.paper)
    ));
    out.push_str(&format!(
        "      <dc:publisher>{}</dc:publisher>\n",
        xml_escape(edition.paper)
    ));
    out.push_str("      <dc:subject>News</dc:subject>\n");
    out.push_str(&format!("      <dc:date>{}</dc:date>\n", edition.date));
    out.push_str(&format!(
        "      <dc:description>An unofficial ebook edition of {} on {}</dc:description>\n",
        xml_escape(edition.paper),
        xml_escape(&edition.long_date())
    ));
    out.push_str("    </dc-metadata>\n");
    out.push_str("    <x-metadata>\n");
    out.push_str(
        "      <output encoding=\"utf-8\" content-type=\"application/x-mobipocket-subscription-magazine\" />\n",
    );
    out.push_str("    </x-metadata>\n");
    out.push_str("  </metadata>\n");

    out.push_str("  <manifest>\n");
    for filename in builder.files() {
        let (stem, extension) = split_filename(filename)?;
        let media_type = media_type_for_extension(extension)
            .with_context(|| format!("manifest entry for {filename}"))?;
        out.push_str(&format!(
            "    <item id=\"{}\" media-type=\"{media_type}\" href=\"{}\" />\n",
            xml_escape(stem),
            xml_escape(filename)
        ));
    }
    out.push_str("  </manifest>\n");

    out.push_str("  <spine toc=\"nav-contents\">\n");
    out.push_str("    <itemref idref=\"contents\" />\n");
    for filename in builder.files() {
        if !filename.ends_with(".html") || filename == CONTENTS_FILENAME {
            continue;
        }
        let (stem, _) = split_filename(filename)?;
        out.push_str(&format!("    <itemref idref=\"{}\" />\n", xml_escape(stem)));
    }
    out.push_str("  </spine>\n");

    out.push_str("  <guide>\n");
    out.push_str(&format!(
        "    <reference type=\"toc\" title=\"Table of Contents\" href=\"{CONTENTS_FILENAME}\" />\n"
    ));
    out.push_str(&format!(
        "    <reference type=\"text\" title=\"{}\" href=\"{first_page}\" />\n",
        xml_escape(first_headline)
    ));
    out.push_str("  </guide>\n");
    out.push_str("</package>\n");

    Ok(out)
}

fn split_filename(filename: &str) -> anyhow::Result<(&str, &str)> {
    let stem = filename.split('.').next().unwrap_or(filename);
    let extension = filename
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .ok_or_else(|| anyhow::anyhow!("file without extension: {filename}"))?;
    Ok((stem, extension))
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;
    use crate::book::PageMeta;

    fn edition() -> Edition {
        Edition::for_date(NaiveDate::from_ymd_opt(2026, 8, 7).expect("date"))
    }

    fn builder_with_pages() -> EditionBuilder {
        let mut builder = EditionBuilder::new();
        for number in 1..=2 {
            let n = builder.next_page_number();
            assert_eq!(n, number);
            builder.record_page(
                &crate::render::page_filename(n),
                PageMeta {
                    headline: format!("Headline {n}"),
                    section: "News".to_owned(),
                    ..PageMeta::default()
                },
            );
        }
        builder.record_asset("001-thumb.jpg");
        builder.record_asset(CONTENTS_FILENAME);
        builder.set_headline(CONTENTS_FILENAME, "Table of Contents");
        builder.record_asset(NAV_FILENAME);
        builder.record_asset("cover-image.gif");
        builder.record_asset("masthead.gif");
        builder
    }

    #[test]
    fn media_types_follow_the_closed_table() {
        assert_eq!(media_type_for_extension("gif").unwrap(), "image/gif");
        assert_eq!(
            media_type_for_extension("html").unwrap(),
            "application/xhtml+xml"
        );
        assert_eq!(media_type_for_extension("jpg").unwrap(), "image/jpeg");
        assert_eq!(media_type_for_extension("jpeg").unwrap(), "image/jpeg");
        assert_eq!(media_type_for_extension("png").unwrap(), "image/png");
        assert_eq!(
            media_type_for_extension("ncx").unwrap(),
            "application/x-dtbncx+xml"
        );
        let err = media_type_for_extension("webp").unwrap_err();
        assert!(err.to_string().contains("unknown extension"));
    }

    #[test]
    fn every_file_appears_exactly_once_in_the_manifest() -> anyhow::Result<()> {
        let builder = builder_with_pages();
        let opf = render_opf(&edition(), &builder)?;
        let manifest_at = opf.find("<manifest>").expect("manifest");
        let manifest = &opf[manifest_at..opf.find("</manifest>").expect("manifest end")];
        for filename in builder.files() {
            let needle = format!("href=\"{filename}\"");
            assert_eq!(manifest.matches(&needle).count(), 1, "{filename}");
        }
        assert_eq!(
            manifest.matches("<item ").count(),
            builder.files().len(),
            "no extra manifest items"
        );
        Ok(())
    }

    #[test]
    fn spine_reads_contents_first_then_pages_in_order() -> anyhow::Result<()> {
        let opf = render_opf(&edition(), &builder_with_pages())?;
        let spine_at = opf.find("<spine").expect("spine");
        let spine = &opf[spine_at..opf.find("</spine>").expect("spine end")];
        assert!(spine.contains("toc=\"nav-contents\""));

        let contents = spine.find("idref=\"contents\"").expect("contents itemref");
        let p1 = spine.find("idref=\"001\"").expect("page 1 itemref");
        let p2 = spine.find("idref=\"002\"").expect("page 2 itemref");
        assert!(contents < p1 && p1 < p2);
        assert!(!spine.contains("idref=\"001-thumb\""));
        Ok(())
    }

    #[test]
    fn guide_needs_the_first_page() {
        let mut builder = EditionBuilder::new();
        builder.record_asset(CONTENTS_FILENAME);
        let err = render_opf(&edition(), &builder).unwrap_err();
        assert!(err.to_string().contains("no first page"));
    }

    #[test]
    fn unknown_extension_in_the_file_list_is_fatal() {
        let mut builder = builder_with_pages();
        builder.record_asset("notes.txt");
        let err = render_opf(&edition(), &builder).unwrap_err();
        assert!(format!("{err:#}").contains("unknown extension"));
    }

    #[test]
    fn metadata_names_the_edition() -> anyhow::Result<()> {
        let opf = render_opf(&edition(), &builder_with_pages())?;
        assert!(opf.contains("unique-identifier=\"Guardian_2026-08-07\""));
        assert!(opf.contains("<dc:title>The Guardian (Unofficial)</dc:title>"));
        assert!(opf.contains("<dc:date>2026-08-07</dc:date>"));
        assert!(opf.contains("application/x-mobipocket-subscription-magazine"));
        assert!(opf.contains(
            "<reference type=\"text\" title=\"Headline 1\" href=\"001.html\" />"
        ));
        Ok(())
    }
}
