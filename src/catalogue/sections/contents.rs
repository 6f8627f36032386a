//! Table of contents: one section per collection, one link-card per category.

use crate::catalogue::grouping::{outline, CategoryOutline};
use crate::catalogue::images::data_uri;
use crate::catalogue::markup::escape_html;
use crate::catalogue::models::ProductRecord;

/// Anchor of the contents page; category headings link back to it.
pub const INDEX_ANCHOR: &str = "main-index";
pub const CONTENTS_TITLE: &str = "Table of Contents";

/// Only embedded images count as thumbnails, so images still held as URLs
/// must be resolved before this is built if they are to appear.
pub fn table_of_contents(records: &[ProductRecord]) -> String {
    let mut html = format!(
        "<div id=\"{INDEX_ANCHOR}\" class=\"toc-page\"><h1 class=\"toc-title\">{CONTENTS_TITLE}</h1>"
    );

    for (position, collection) in outline(records).iter().enumerate() {
        // Every collection after the first starts on its own page.
        if position == 0 {
            html.push_str("<div class=\"toc-section\">");
        } else {
            html.push_str(
                "<div class=\"toc-section\" style=\"page-break-before: always; padding-top: 20px;\">",
            );
        }
        html.push_str(&format!(
            "<h3 class=\"toc-catalogue-section-header\">{}</h3>",
            escape_html(collection.name)
        ));
        html.push_str("<div class=\"index-grid-container clearfix\">");
        for category in &collection.categories {
            html.push_str(&index_card(category));
        }
        html.push_str("</div><div style=\"clear: both;\"></div></div>");
    }

    html.push_str("</div>");
    html
}

fn index_card(category: &CategoryOutline<'_>) -> String {
    let image = match category.thumbnail {
        Some(payload) => format!(
            "<div class=\"index-card-image\"><img src=\"{}\" alt=\"\"></div>",
            data_uri(payload)
        ),
        None => "<div class=\"index-card-image empty\"></div>".to_string(),
    };

    format!(
        "<a href=\"#{}\" class=\"index-card-link\">{}<div class=\"index-card-label\">{}</div></a>",
        category.anchor,
        image,
        escape_html(category.name)
    )
}
