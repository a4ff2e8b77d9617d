use crate::book::EditionBuilder;
use crate::cover;
use crate::edition::Edition;
use crate::render::xml_escape;

pub const CONTENTS_FILENAME: &str = "contents.html";
pub const NAV_FILENAME: &str = "nav-contents.ncx";

/// Consecutive pages sharing a section label form one visible group. The
/// list is never re-sorted: a section that reappears later in the paper
/// starts a fresh group.
fn section_runs<'a>(builder: &'a EditionBuilder) -> Vec<(&'a str, Vec<&'a str>)> {
    let mut runs: Vec<(&str, Vec<&str>)> = Vec::new();

    for filename in builder.files() {
        if !filename.ends_with(".html") || filename == CONTENTS_FILENAME {
            continue;
        }
        let section = builder
            .meta(filename)
            .map(|meta| meta.section.as_str())
            .unwrap_or("");

        let continues_run = matches!(runs.last(), Some((label, _)) if *label == section);
        if !continues_run {
            runs.push((section, Vec::new()));
        }
        if let Some((_, pages)) = runs.last_mut() {
            pages.push(filename);
        }
    }

    runs
}

/// The human-readable contents listing.
pub fn render_contents(builder: &EditionBuilder) -> String {
    let mut out = String::new();
    out.push_str("<html>\n");
    out.push_str("<head>\n");
    out.push_str("  <meta http-equiv=\"Content-Type\" content=\"text/html; charset=utf-8\" />\n");
    out.push_str("  <title>Table of Contents</title>\n");
    out.push_str("</head>\n");
    out.push_str("<body>\n");
    out.push_str("<h1>Contents</h1>\n");

    for (label, pages) in section_runs(builder) {
        out.push_str(&format!("<h4>{}</h4>\n", xml_escape(label)));
        out.push_str("<ul>\n");
        for filename in pages {
            let headline = builder.headline(filename).unwrap_or(filename);
            out.push_str(&format!(
                "  <li><a href=\"{filename}\">{}</a></li>\n",
                xml_escape(headline)
            ));
        }
        out.push_str("</ul>\n");
    }

    out.push_str("</body>\n");
    out.push_str("</html>\n");
    out
}

/// The hierarchical NCX navigation document: one periodical node, one
/// node per section run, one node per article. Section and article nodes
/// draw their playOrder from a single counter so traversal order is a
/// gapless integer sequence.
pub fn render_ncx(edition: &Edition, builder: &EditionBuilder) -> String {
    let mut out = String::new();
    out.push_str("<?xml version='1.0' encoding='utf-8'?>\n");
    out.push_str(
        "<!DOCTYPE ncx PUBLIC \"-//NISO//DTD ncx 2005-1//EN\" \"http://www.daisy.org/z3986/2005/ncx-2005-1.dtd\">\n",
    );
    out.push_str(
        "<ncx xmlns=\"http://www.daisy.org/z3986/2005/ncx/\" xmlns:mbp=\"http://mobipocket.com/ns/mbp\" version=\"2005-1\" xml:lang=\"en-GB\">\n",
    );
    out.push_str("  <head>\n");
    out.push_str(&format!(
        "    <meta name=\"dtb:uid\" content=\"{}\" />\n",
        xml_escape(&edition.book_id())
    ));
    out.push_str("    <meta name=\"dtb:depth\" content=\"2\" />\n");
    out.push_str("    <meta name=\"dtb:totalPageCount\" content=\"0\" />\n");
    out.push_str("    <meta name=\"dtb:maxPageNumber\" content=\"0\" />\n");
    out.push_str("  </head>\n");
    out.push_str(&format!(
        "  <docTitle><text>{}</text></docTitle>\n",
        xml_escape(&edition.short_title())
    ));
    out.push_str(&format!(
        "  <docAuthor><text>{}</text></docAuthor>\n",
        xml_escape(edition.paper)
    ));
    out.push_str("  <navMap>\n");

    let contents_label = builder
        .headline(CONTENTS_FILENAME)
        .unwrap_or("Table of Contents");
    out.push_str("    <navPoint class=\"periodical\" id=\"periodical\" playOrder=\"0\">\n");
    out.push_str(&format!(
        "      <mbp:meta-img name=\"mastheadImage\" src=\"{}\" />\n",
        cover::MASTHEAD_FILENAME
    ));
    out.push_str(&format!(
        "      <navLabel><text>{}</text></navLabel>\n",
        xml_escape(contents_label)
    ));
    out.push_str(&format!("      <content src=\"{CONTENTS_FILENAME}\" />\n"));

    let mut play_order = 1_usize;
    for (label, pages) in section_runs(builder) {
        let first_page = pages.first().copied().unwrap_or(CONTENTS_FILENAME);
        out.push_str(&format!(
            "      <navPoint class=\"section\" id=\"{}\" playOrder=\"{play_order}\">\n",
            xml_escape(&label.replace(' ', "-"))
        ));
        out.push_str(&format!(
            "        <navLabel><text>{}</text></navLabel>\n",
            xml_escape(label)
        ));
        out.push_str(&format!("        <content src=\"{first_page}\" />\n"));
        play_order += 1;

        for filename in pages {
            let stem = filename.split('.').next().unwrap_or(filename);
            out.push_str(&format!(
                "        <navPoint class=\"article\" id=\"item-{stem}\" playOrder=\"{play_order}\">\n",
            ));
            let headline = builder.headline(filename).unwrap_or(filename);
            out.push_str(&format!(
                "          <navLabel><text>{}</text></navLabel>\n",
                xml_escape(headline)
            ));
            out.push_str(&format!("          <content src=\"{filename}\" />\n"));
            if let Some(meta) = builder.meta(filename) {
                if !meta.description.is_empty() {
                    out.push_str(&format!(
                        "          <mbp:meta name=\"description\">{}</mbp:meta>\n",
                        xml_escape(&meta.description)
                    ));
                }
                if !meta.author.is_empty() {
                    out.push_str(&format!(
                        "          <mbp:meta name=\"author\">{}</mbp:meta>\n",
                        xml_escape(&meta.author)
                    ));
                }
            }
            out.push_str("        </navPoint>\n");
            play_order += 1;
        }

        out.push_str("      </navPoint>\n");
    }

    out.push_str("    </navPoint>\n");
    out.push_str("  </navMap>\n");
    out.push_str("</ncx>\n");
    out
}
