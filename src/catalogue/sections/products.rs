//! Grouped product pages.
//!
//! Driven by the boundary events from [`grouping::plan`]. A small state
//! machine tracks which block is open so that every `category-block` div is
//! closed exactly once, including at the end of input.

use crate::catalogue::attributes::PackingSpec;
use crate::catalogue::grouping::{self, GroupEvent};
use crate::catalogue::images::{data_uri, ImageResolver};
use crate::catalogue::markup::{escape_html, MarkupBuffer};
use crate::catalogue::models::{CaseSizeTable, ProductRecord};

use super::contents::INDEX_ANCHOR;

pub const BACK_LINK_TEXT: &str = "BACK TO INDEX";
pub const IMAGE_PLACEHOLDER_TEXT: &str = "IMAGE NOT FOUND";
pub const NEW_BADGE_TEXT: &str = "NEW";

const PACKING_HEADERS: [&str; 7] = [
    "Packing per Master Ctn<br>(doz/box)",
    "Gross Wt.<br>(Kg)",
    "Net Wt.<br>(Kg)",
    "Length<br>(Cm)",
    "Breadth<br>(Cm)",
    "Height<br>(Cm)",
    "CBM",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SectionState {
    NoSectionOpen,
    CollectionOpen,
    CategoryOpen,
}

/// Card font size by name length; long names get smaller type.
pub fn name_font_size(name: &str) -> &'static str {
    match name.chars().count() {
        0..=29 => "9pt",
        30..=49 => "8pt",
        _ => "7pt",
    }
}

/// Append the product pages for `records` to `buffer`.
///
/// Images that are still URLs are resolved through `resolver` and the result
/// is written back onto the record.
pub fn append_product_pages(
    buffer: &mut MarkupBuffer,
    records: &mut [ProductRecord],
    case_sizes: &CaseSizeTable,
    resolver: &dyn ImageResolver,
) {
    let events = grouping::plan(records);
    let mut state = SectionState::NoSectionOpen;

    buffer.push("<div class=\"catalogue-content clearfix\">");

    for event in events {
        match event {
            GroupEvent::Collection { name, page_break } => {
                if state == SectionState::CategoryOpen {
                    buffer.push("</div>");
                }
                let break_style = if page_break {
                    " style=\"page-break-before: always;\""
                } else {
                    ""
                };
                buffer.push(format!(
                    "<div style=\"clear:both;\"></div><h1 class=\"catalogue-heading\"{}>{}</h1>",
                    break_style,
                    escape_html(&name)
                ));
                state = SectionState::CollectionOpen;
            }
            GroupEvent::Category { name, anchor } => {
                if state == SectionState::CategoryOpen {
                    buffer.push("</div>");
                }
                buffer.push("<div class=\"category-block clearfix\">");
                buffer.push(format!(
                    "<h2 class=\"category-heading\" id=\"{}\"><a href=\"#{}\" class=\"back-link\">{} &uarr;</a>{}</h2>",
                    anchor,
                    INDEX_ANCHOR,
                    BACK_LINK_TEXT,
                    escape_html(&name)
                ));
                match case_sizes.get(&name).filter(|entry| !entry.is_empty()) {
                    Some(entry) => buffer.push(packing_table(&PackingSpec::from_entry(entry))),
                    None => log::debug!("no case size for category '{}'", name),
                }
                state = SectionState::CategoryOpen;
            }
            GroupEvent::Subcategory { label } => {
                buffer.push(format!(
                    "<div class=\"subcat-pdf-header\">{}</div>",
                    escape_html(&label)
                ));
            }
            GroupEvent::Product {
                index,
                display_number,
            } => {
                let record = &mut records[index];
                let image = record.image.resolve_with(resolver).map(data_uri);
                buffer.push(product_card(record, image.as_deref(), display_number));
            }
        }
    }

    if state == SectionState::CategoryOpen {
        buffer.push("</div>");
    }
    buffer.push("<div style=\"clear: both;\"></div></div>");
}

fn packing_table(spec: &PackingSpec) -> String {
    let mut html = String::new();
    if let Some(description) = &spec.description {
        html.push_str(&format!(
            "<div class=\"case-size-info\"><strong>Case Size:</strong> {}</div>",
            escape_html(description)
        ));
    }

    html.push_str("<table class=\"case-size-table\"><tr>");
    for header in PACKING_HEADERS {
        html.push_str(&format!("<th>{header}</th>"));
    }
    html.push_str("</tr><tr>");
    for cell in spec.cells() {
        html.push_str(&format!("<td>{}</td>", escape_html(cell)));
    }
    html.push_str("</tr></table>");
    html
}

fn product_card(record: &ProductRecord, image_uri: Option<&str>, display_number: usize) -> String {
    let badge = if record.is_flagged_new {
        format!("<div class=\"new-badge\">{NEW_BADGE_TEXT}</div>")
    } else {
        String::new()
    };
    let image = match image_uri {
        Some(uri) => format!("<img src=\"{uri}\" alt=\"Img\">"),
        None => format!("<div class=\"image-placeholder\">{IMAGE_PLACEHOLDER_TEXT}</div>"),
    };

    format!(
        "<div class=\"product-card\">{badge}<div class=\"card-image-box\">{image}</div>\
         <div class=\"card-info-box\"><div class=\"card-name\" style=\"font-size: {};\">\
         <span class=\"card-number\">{display_number}.</span>{}</div></div></div>",
        name_font_size(&record.display_name),
        escape_html(&record.display_name)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogue::images::no_images;
    use crate::catalogue::models::{CaseSizeEntry, ImageReference};

    fn render(records: &mut [ProductRecord], case_sizes: &CaseSizeTable) -> String {
        let mut buffer = MarkupBuffer::new();
        append_product_pages(&mut buffer, records, case_sizes, &no_images);
        buffer.finish()
    }

    #[test]
    fn test_font_tiers() {
        assert_eq!(name_font_size(&"a".repeat(29)), "9pt");
        assert_eq!(name_font_size(&"a".repeat(30)), "8pt");
        assert_eq!(name_font_size(&"a".repeat(49)), "8pt");
        assert_eq!(name_font_size(&"a".repeat(50)), "7pt");
    }

    #[test]
    fn test_category_blocks_are_balanced() {
        let mut records = vec![
            ProductRecord::new("A", "X", "one", 0),
            ProductRecord::new("A", "Y", "two", 1),
            ProductRecord::new("B", "Y", "three", 2),
        ];
        let html = render(&mut records, &CaseSizeTable::new());
        let opened = html.matches("<div class=\"category-block clearfix\">").count();
        assert_eq!(opened, 3);
        assert_eq!(html.matches("<div").count(), html.matches("</div>").count());
    }

    #[test]
    fn test_packing_table_only_with_case_size() {
        let mut case_sizes = CaseSizeTable::new();
        case_sizes.insert(
            "X".to_string(),
            CaseSizeEntry::new()
                .with("Description", "Box of 12")
                .with("Packing", "25")
                .with("CBM", "0.05"),
        );
        let mut records = vec![
            ProductRecord::new("A", "X", "one", 0),
            ProductRecord::new("A", "Y", "two", 1),
        ];
        let html = render(&mut records, &case_sizes);
        assert_eq!(html.matches("case-size-table").count(), 1);
        assert!(html.contains("<strong>Case Size:</strong> Box of 12"));
        assert!(html.contains("<td>25</td><td>-</td>"));
    }

    #[test]
    fn test_card_badge_and_placeholder() {
        let mut records = vec![
            ProductRecord::new("A", "X", "Rose Stick", 0).flagged_new(),
            ProductRecord::new("A", "X", "Jasmine", 1)
                .with_image(ImageReference::Embedded("/9j/4AAQSkZJRgABAQ".into())),
        ];
        let html = render(&mut records, &CaseSizeTable::new());
        assert_eq!(html.matches("class=\"new-badge\"").count(), 1);
        assert_eq!(html.matches(IMAGE_PLACEHOLDER_TEXT).count(), 1);
        assert!(html.contains("<span class=\"card-number\">2.</span>Jasmine"));
        assert!(html.contains("data:image/jpeg;base64,/9j/4AAQ"));
    }

    #[test]
    fn test_heading_links_back_to_index() {
        let mut records = vec![ProductRecord::new("A", "Hexa Sticks", "one", 0)];
        let html = render(&mut records, &CaseSizeTable::new());
        assert!(html.contains(
            "<h2 class=\"category-heading\" id=\"category-hexa-sticks\"><a href=\"#main-index\""
        ));
    }

    #[test]
    fn test_remote_images_resolved_and_memoized() {
        let resolver = |_: &str| Some("iVBORw0KGgoAAAANSUhEUg".to_string());
        let mut records = vec![ProductRecord::new("A", "X", "one", 0)
            .with_image(ImageReference::Remote("https://cdn.example.com/1.png".into()))];

        let mut buffer = MarkupBuffer::new();
        append_product_pages(&mut buffer, &mut records, &CaseSizeTable::new(), &resolver);

        assert!(buffer.finish().contains("data:image/png;base64,iVBORw0KGgo"));
        assert_eq!(
            records[0].image,
            ImageReference::Embedded("iVBORw0KGgoAAAANSUhEUg".into())
        );
    }
}
