//! In-process rendering backend.
//!
//! Needs no external binary: the markup is parsed with kuchiki and laid out
//! as a flow of blocks onto A4 pages, which lopdf serialises. The layout
//! understands the catalogue's own classes (cover, story, contents, headings,
//! packing tables, card grids) rather than general CSS. In-document `href="#id"`
//! links become link annotations pointing at the page and height where the
//! element carrying that id was laid out.

use std::collections::HashMap;

use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat};
use kuchiki::traits::TendrilSink;
use kuchiki::NodeRef;
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};

use super::{RenderBackend, RenderError};
use crate::catalogue::images::decode_payload;

const PAGE_WIDTH: f32 = 595.0;
const PAGE_HEIGHT: f32 = 842.0;
const MARGIN: f32 = 28.0;
const CONTENT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;

const GRID_COLUMNS: usize = 4;
const GRID_GAP: f32 = 8.0;
const CARD_HEIGHT: f32 = 150.0;
const CARD_IMAGE_HEIGHT: f32 = 100.0;
const MAX_IMAGE_EDGE: u32 = 1600;

const REGULAR: &str = "F1";
const BOLD: &str = "F2";

type Rgb = (f32, f32, f32);
const BLACK: Rgb = (0.0, 0.0, 0.0);
const WHITE: Rgb = (1.0, 1.0, 1.0);
const DARK: Rgb = (0.2, 0.2, 0.2);
const GREY: Rgb = (0.33, 0.33, 0.33);
const LIGHT_GREY: Rgb = (0.8, 0.8, 0.8);
const BLUE: Rgb = (0.0, 0.48, 1.0);
const RED: Rgb = (0.86, 0.21, 0.27);
const DEEP_RED: Rgb = (0.7, 0.0, 0.0);
const GOLD: Rgb = (0.9, 0.76, 0.52);

#[derive(Debug, Default)]
pub struct NativeBackend;

impl NativeBackend {
    pub fn new() -> Self {
        Self
    }
}

impl RenderBackend for NativeBackend {
    fn name(&self) -> &str {
        "native (lopdf)"
    }

    fn is_available(&self) -> bool {
        true
    }

    fn render(&self, markup: &str) -> Result<Vec<u8>, RenderError> {
        render_document(markup)
    }
}

/// Lay out `markup` and serialise it as a PDF.
pub fn render_document(markup: &str) -> Result<Vec<u8>, RenderError> {
    let html = kuchiki::parse_html().one(markup);
    let body = html
        .select_first("body")
        .map_err(|_| RenderError::Layout("markup has no <body>".to_string()))?;

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(font("Helvetica"));
    let bold_id = doc.add_object(font("Helvetica-Bold"));

    let mut layout = Layout::new(&mut doc);
    layout.walk_children(body.as_node());
    let Finished {
        pages,
        xobjects,
        watermark,
        destinations,
        links,
    } = layout.finish();

    let page_count = pages.len();
    let page_ids: Vec<ObjectId> = (0..page_count).map(|_| doc.new_object_id()).collect();
    let mut annotations: Vec<Vec<Object>> = vec![Vec::new(); page_count];
    let last_page = page_count.saturating_sub(1);
    for link in links {
        let Some(&(target_page, target_top)) = destinations.get(&link.target) else {
            log::debug!("link to unknown anchor '{}' dropped", link.target);
            continue;
        };
        let Some(&target) = page_ids.get(target_page.min(last_page)) else {
            continue;
        };
        let annotation_id = doc.add_object(link_annotation(&link, target, target_top));
        annotations[link.page.min(last_page)].push(Object::Reference(annotation_id));
    }

    let mut kids = Vec::with_capacity(page_count);
    for ((ops, page_id), page_annotations) in pages.into_iter().zip(page_ids).zip(annotations) {
        let mut content = String::new();
        if let Some(name) = &watermark {
            content.push_str(&format!(
                "q {PAGE_WIDTH:.2} 0 0 {PAGE_HEIGHT:.2} 0 0 cm /{name} Do Q\n"
            ));
        }
        content.push_str(&ops);

        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));
        let mut page = dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
        };
        if !page_annotations.is_empty() {
            page.set("Annots", page_annotations);
        }
        doc.objects.insert(page_id, Object::Dictionary(page));
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count as i64,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(PAGE_WIDTH as i64),
                Object::Integer(PAGE_HEIGHT as i64),
            ],
            "Resources" => dictionary! {
                "Font" => dictionary! {
                    REGULAR => regular_id,
                    BOLD => bold_id,
                },
                "XObject" => xobjects,
            },
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();

    let mut out = Vec::new();
    doc.save_to(&mut out)
        .map_err(|e| RenderError::Layout(format!("failed to serialise PDF: {e}")))?;
    Ok(out)
}

/// Borderless link over `link.rect` jumping to `top` on the `target` page.
fn link_annotation(link: &Link, target: ObjectId, top: f32) -> Dictionary {
    let (x, rect_top, width, height) = link.rect;
    let bottom = PAGE_HEIGHT - rect_top - height;
    dictionary! {
        "Type" => "Annot",
        "Subtype" => "Link",
        "Rect" => vec![
            Object::Integer(x.floor() as i64),
            Object::Integer(bottom.floor() as i64),
            Object::Integer((x + width).ceil() as i64),
            Object::Integer((bottom + height).ceil() as i64),
        ],
        "Border" => vec![Object::Integer(0), Object::Integer(0), Object::Integer(0)],
        "Dest" => vec![
            Object::Reference(target),
            Object::Name(b"XYZ".to_vec()),
            Object::Null,
            Object::Integer((PAGE_HEIGHT - top).round() as i64),
            Object::Null,
        ],
    }
}

fn font(base: &str) -> Dictionary {
    dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => base,
        "Encoding" => "WinAnsiEncoding",
    }
}

#[derive(Debug, Clone)]
struct PlacedImage {
    name: String,
    width: f32,
    height: f32,
}

#[derive(Debug, Default)]
struct Card {
    image: Option<String>,
    label: String,
    placeholder: Option<String>,
    badge: bool,
    /// Index cards carry their label in a coloured bar.
    label_bar: bool,
    /// Anchor the whole card links to.
    link: Option<String>,
}

/// Clickable area on page `page`; `rect` is `(x, top, width, height)` with
/// `top` measured from the top edge.
#[derive(Debug)]
struct Link {
    page: usize,
    rect: (f32, f32, f32, f32),
    target: String,
}

struct Finished {
    pages: Vec<String>,
    xobjects: Dictionary,
    watermark: Option<String>,
    /// Anchor id to `(page, top)` of the element carrying it.
    destinations: HashMap<String, (usize, f32)>,
    links: Vec<Link>,
}

struct Layout<'d> {
    doc: &'d mut Document,
    pages: Vec<String>,
    ops: String,
    has_content: bool,
    /// Distance from the top edge of the page.
    cursor: f32,
    images: HashMap<String, PlacedImage>,
    xobjects: Dictionary,
    watermark: Option<String>,
    pending_cards: Vec<Card>,
    after_collection_heading: bool,
    destinations: HashMap<String, (usize, f32)>,
    links: Vec<Link>,
}

impl<'d> Layout<'d> {
    fn new(doc: &'d mut Document) -> Self {
        Self {
            doc,
            pages: Vec::new(),
            ops: String::new(),
            has_content: false,
            cursor: MARGIN,
            images: HashMap::new(),
            xobjects: Dictionary::new(),
            watermark: None,
            pending_cards: Vec::new(),
            after_collection_heading: false,
            destinations: HashMap::new(),
            links: Vec::new(),
        }
    }

    fn finish(mut self) -> Finished {
        self.flush_cards();
        if self.has_content || self.pages.is_empty() {
            self.pages.push(std::mem::take(&mut self.ops));
        }
        Finished {
            pages: self.pages,
            xobjects: self.xobjects,
            watermark: self.watermark,
            destinations: self.destinations,
            links: self.links,
        }
    }

    /// Index of the page currently being filled.
    fn current_page(&self) -> usize {
        self.pages.len()
    }

    fn mark_destination(&mut self, id: String) {
        let position = (self.current_page(), self.cursor);
        self.destinations.entry(id).or_insert(position);
    }

    fn add_link(&mut self, target: &str, rect: (f32, f32, f32, f32)) {
        self.links.push(Link {
            page: self.current_page(),
            rect,
            target: target.to_string(),
        });
    }

    // ---- traversal ----------------------------------------------------

    fn walk_children(&mut self, node: &NodeRef) {
        for child in node.children() {
            self.walk(&child);
        }
    }

    fn walk(&mut self, node: &NodeRef) {
        if let Some(text) = node.as_text() {
            let text = normalise(&text.borrow());
            if !text.is_empty() {
                self.flush_cards();
                self.paragraph(&text, 10.0, REGULAR, BLACK);
            }
            return;
        }

        let Some(tag) = tag_name(node) else {
            return;
        };
        if matches!(tag.as_str(), "style" | "script" | "head" | "title" | "meta") {
            return;
        }

        if attr(node, "id").as_deref() == Some("watermark-layer") {
            self.watermark = attr(node, "style")
                .and_then(|style| style_payload(&style).map(str::to_string))
                .and_then(|payload| self.embed_image(&payload))
                .map(|image| image.name);
            return;
        }

        if has_class(node, "product-card") {
            self.pending_cards.push(product_card(node));
            if self.pending_cards.len() == GRID_COLUMNS {
                self.flush_cards();
            }
            return;
        }
        if has_class(node, "index-card-link") {
            self.pending_cards.push(index_card(node));
            if self.pending_cards.len() == GRID_COLUMNS {
                self.flush_cards();
            }
            return;
        }

        // Any other block ends the current card row.
        self.flush_cards();

        if attr(node, "style").is_some_and(|s| breaks_before(&s)) {
            self.page_break();
        }

        // Category headings record their own position once they have been placed.
        if !has_class(node, "category-heading") {
            if let Some(id) = attr(node, "id") {
                self.mark_destination(id);
            }
        }

        if has_class(node, "cover-page") {
            self.cover(node);
            self.page_break();
            return;
        }
        if has_class(node, "story-page") || has_class(node, "toc-page") {
            self.walk_children(node);
            self.flush_cards();
            self.page_break();
            return;
        }
        if has_class(node, "category-block") {
            if !self.after_collection_heading {
                self.page_break();
            }
            self.after_collection_heading = false;
            self.walk_children(node);
            return;
        }

        match tag.as_str() {
            "h1" if has_class(node, "catalogue-heading") => {
                self.bar(&node_text(node), 16.0, DARK, true);
                self.after_collection_heading = true;
                return;
            }
            "h1" => self.heading(&node_text(node), 24.0, DARK, true),
            "h2" if has_class(node, "category-heading") => self.category_heading(node),
            "h2" => self.heading(&node_text(node), 13.0, DARK, true),
            "h3" => self.bar(&node_text(node), 14.0, DARK, false),
            "table" => self.table(node),
            "img" => {
                if let Some(payload) = attr(node, "src").as_deref().and_then(src_payload) {
                    self.block_image(payload, CONTENT_WIDTH / 2.0, 220.0);
                }
            }
            _ if has_class(node, "subcat-pdf-header") => {
                self.space(6.0);
                self.paragraph(&node_text(node), 11.0, BOLD, BLUE);
            }
            _ if has_class(node, "case-size-info") => {
                self.paragraph(&node_text(node), 10.0, REGULAR, GREY);
            }
            _ if has_class(node, "story-text") => {
                self.paragraph(&node_text(node), 11.0, REGULAR, BLACK);
                self.space(10.0);
            }
            _ if has_class(node, "image-missing") => {
                self.paragraph(&node_text(node), 11.0, BOLD, RED);
            }
            _ => self.walk_children(node),
        }
        self.after_collection_heading = false;
    }

    // ---- pagination ---------------------------------------------------

    /// Start a new page. An empty page is only kept when it is the first
    /// one, so a cover without an image still occupies its page.
    fn page_break(&mut self) {
        if !self.has_content && !self.pages.is_empty() {
            return;
        }
        self.pages.push(std::mem::take(&mut self.ops));
        self.has_content = false;
        self.cursor = MARGIN;
    }

    fn ensure_space(&mut self, height: f32) {
        if self.has_content && self.cursor + height > PAGE_HEIGHT - MARGIN {
            self.page_break();
        }
    }

    fn space(&mut self, height: f32) {
        if self.has_content {
            self.cursor += height;
        }
    }

    // ---- blocks -------------------------------------------------------

    fn cover(&mut self, node: &NodeRef) {
        let payload = node
            .select_first("img")
            .ok()
            .and_then(|img| attr(img.as_node(), "src"))
            .and_then(|src| src_payload(&src).map(str::to_string));
        let Some(image) = payload.and_then(|p| self.embed_image(&p)) else {
            return;
        };

        // Fill the page, cropping the overflow.
        let scale = (PAGE_WIDTH / image.width).max(PAGE_HEIGHT / image.height);
        let (w, h) = (image.width * scale, image.height * scale);
        let (x, y) = ((PAGE_WIDTH - w) / 2.0, (PAGE_HEIGHT - h) / 2.0);
        self.ops.push_str(&format!(
            "q 0 0 {PAGE_WIDTH:.2} {PAGE_HEIGHT:.2} re W n {w:.2} 0 0 {h:.2} {x:.2} {y:.2} cm /{} Do Q\n",
            image.name
        ));
        self.has_content = true;
    }

    fn heading(&mut self, text: &str, size: f32, color: Rgb, centred: bool) {
        if text.is_empty() {
            return;
        }
        self.space(size * 0.6);
        let lines = wrap(text, size, CONTENT_WIDTH);
        self.ensure_space(lines.len() as f32 * size * 1.3);
        for line in lines {
            let x = if centred {
                MARGIN + (CONTENT_WIDTH - text_width(&line, size)).max(0.0) / 2.0
            } else {
                MARGIN
            };
            self.text_line(&line, x, size, BOLD, color);
        }
        self.cursor += size * 0.4;
    }

    /// Full-width filled bar with white text.
    fn bar(&mut self, text: &str, size: f32, fill: Rgb, centred: bool) {
        let height = size + 14.0;
        self.ensure_space(height + 6.0);
        self.rect(MARGIN, self.cursor, CONTENT_WIDTH, height, fill);
        let label = truncate(text, size, CONTENT_WIDTH - 20.0);
        let x = if centred {
            MARGIN + (CONTENT_WIDTH - text_width(&label, size)).max(0.0) / 2.0
        } else {
            MARGIN + 10.0
        };
        self.text_at(&label, x, self.cursor + 7.0 + size * 0.8, size, BOLD, WHITE);
        self.cursor += height + 6.0;
        self.has_content = true;
    }

    /// Title on the left, the back-to-index link on the right.
    fn category_heading(&mut self, node: &NodeRef) {
        let size = 14.0;
        self.space(10.0);
        self.ensure_space(size * 1.6 + CARD_HEIGHT);
        if let Some(id) = attr(node, "id") {
            self.mark_destination(id);
        }

        if let Ok(back) = node.select_first(".back-link") {
            let target = attr(back.as_node(), "href");
            let label: String = node_text(back.as_node())
                .chars()
                .filter(|&ch| ch.is_ascii() || win_ansi(ch) != b'?')
                .collect();
            let label = label.trim();
            let link_size = 8.0;
            let width = text_width(label, link_size);
            let x = MARGIN + CONTENT_WIDTH - width;
            self.text_at(label, x, self.cursor + size, link_size, REGULAR, GREY);
            if let Some(anchor) = target.as_deref().and_then(|href| href.strip_prefix('#')) {
                self.add_link(anchor, (x, self.cursor, width, size * 1.3));
            }
        }

        self.text_line(&node_text(node), MARGIN, size, BOLD, DARK);
        self.cursor += 3.0;
        self.rule(MARGIN, self.cursor, CONTENT_WIDTH, GOLD);
        self.cursor += 6.0;
    }

    fn paragraph(&mut self, text: &str, size: f32, font: &str, color: Rgb) {
        for line in wrap(text, size, CONTENT_WIDTH) {
            self.ensure_space(size * 1.4);
            self.text_line(&line, MARGIN, size, font, color);
        }
        self.cursor += size * 0.3;
    }

    /// Each row becomes one line of cells separated by a bar.
    fn table(&mut self, node: &NodeRef) {
        let Ok(rows) = node.select("tr") else {
            return;
        };
        for row in rows {
            let Ok(cells) = row.as_node().select("th, td") else {
                continue;
            };
            let mut is_header = false;
            let texts: Vec<String> = cells
                .map(|cell| {
                    is_header |= tag_name(cell.as_node()).as_deref() == Some("th");
                    node_text(cell.as_node())
                })
                .collect();
            let font = if is_header { BOLD } else { REGULAR };
            self.paragraph(&texts.join(" | "), 8.0, font, GREY);
        }
        self.space(4.0);
    }

    fn block_image(&mut self, payload: &str, max_width: f32, max_height: f32) {
        let Some(image) = self.embed_image(payload) else {
            return;
        };
        let scale = (max_width / image.width).min(max_height / image.height).min(1.0);
        let (w, h) = (image.width * scale, image.height * scale);
        self.ensure_space(h + 8.0);
        let x = MARGIN + (CONTENT_WIDTH - w) / 2.0;
        self.draw_image(&image.name, x, self.cursor, w, h);
        self.cursor += h + 8.0;
        self.has_content = true;
    }

    fn flush_cards(&mut self) {
        if self.pending_cards.is_empty() {
            return;
        }
        let cards = std::mem::take(&mut self.pending_cards);
        let card_width =
            (CONTENT_WIDTH - GRID_GAP * (GRID_COLUMNS as f32 - 1.0)) / GRID_COLUMNS as f32;

        self.ensure_space(CARD_HEIGHT + GRID_GAP);
        let top = self.cursor;
        for (column, card) in cards.iter().enumerate() {
            let left = MARGIN + column as f32 * (card_width + GRID_GAP);
            self.card(card, left, top, card_width);
            if let Some(anchor) = &card.link {
                self.add_link(anchor, (left, top, card_width, CARD_HEIGHT));
            }
        }
        self.cursor = top + CARD_HEIGHT + GRID_GAP;
        self.has_content = true;
    }

    fn card(&mut self, card: &Card, left: f32, top: f32, width: f32) {
        self.outline(left, top, width, CARD_HEIGHT, GOLD);

        let image = card.image.as_deref().and_then(|p| self.embed_image(p));
        match image {
            Some(image) => {
                let box_w = width - 8.0;
                let box_h = CARD_IMAGE_HEIGHT - 8.0;
                let scale = (box_w / image.width).min(box_h / image.height);
                let (w, h) = (image.width * scale, image.height * scale);
                let x = left + (width - w) / 2.0;
                let y = top + 4.0 + (box_h - h) / 2.0;
                self.draw_image(&image.name, x, y, w, h);
            }
            None => {
                if let Some(placeholder) = &card.placeholder {
                    let size = 7.0;
                    let x = left + (width - text_width(placeholder, size)).max(0.0) / 2.0;
                    self.text_at(placeholder, x, top + CARD_IMAGE_HEIGHT / 2.0, size, REGULAR, LIGHT_GREY);
                }
            }
        }

        if card.badge {
            let badge_w = 30.0;
            self.rect(left + width - badge_w, top, badge_w, 12.0, RED);
            self.text_at("NEW", left + width - badge_w + 6.0, top + 9.0, 7.0, BOLD, WHITE);
        }

        let label_top = top + CARD_IMAGE_HEIGHT;
        if card.label_bar {
            self.rect(left, label_top, width, CARD_HEIGHT - CARD_IMAGE_HEIGHT, DEEP_RED);
        }
        let color = if card.label_bar { WHITE } else { BLACK };
        let size = if card.label_bar { 8.0 } else { label_size(&card.label) };
        for (i, line) in wrap(&card.label, size, width - 8.0).iter().take(3).enumerate() {
            let x = left + (width - text_width(line, size)).max(0.0) / 2.0;
            let baseline = label_top + 6.0 + size * (i as f32 + 1.0) * 1.2;
            self.text_at(line, x, baseline, size, BOLD, color);
        }
    }

    // ---- drawing primitives -------------------------------------------

    fn text_line(&mut self, text: &str, x: f32, size: f32, font: &str, color: Rgb) {
        let baseline = self.cursor + size;
        self.text_at(text, x, baseline, size, font, color);
        self.cursor += size * 1.3;
        self.has_content = true;
    }

    /// `baseline` is measured from the top of the page.
    fn text_at(&mut self, text: &str, x: f32, baseline: f32, size: f32, font: &str, color: Rgb) {
        let y = PAGE_HEIGHT - baseline;
        self.ops.push_str(&format!(
            "BT /{font} {size:.1} Tf {:.3} {:.3} {:.3} rg {x:.2} {y:.2} Td ({}) Tj ET\n",
            color.0,
            color.1,
            color.2,
            pdf_string(text)
        ));
    }

    fn rect(&mut self, x: f32, top: f32, width: f32, height: f32, fill: Rgb) {
        let y = PAGE_HEIGHT - top - height;
        self.ops.push_str(&format!(
            "q {:.3} {:.3} {:.3} rg {x:.2} {y:.2} {width:.2} {height:.2} re f Q\n",
            fill.0, fill.1, fill.2
        ));
    }

    fn outline(&mut self, x: f32, top: f32, width: f32, height: f32, stroke: Rgb) {
        let y = PAGE_HEIGHT - top - height;
        self.ops.push_str(&format!(
            "q {:.3} {:.3} {:.3} RG 0.75 w {x:.2} {y:.2} {width:.2} {height:.2} re S Q\n",
            stroke.0, stroke.1, stroke.2
        ));
    }

    fn rule(&mut self, x: f32, top: f32, width: f32, stroke: Rgb) {
        let y = PAGE_HEIGHT - top;
        self.ops.push_str(&format!(
            "q {:.3} {:.3} {:.3} RG 2 w {x:.2} {y:.2} m {:.2} {y:.2} l S Q\n",
            stroke.0,
            stroke.1,
            stroke.2,
            x + width
        ));
    }

    fn draw_image(&mut self, name: &str, x: f32, top: f32, width: f32, height: f32) {
        let y = PAGE_HEIGHT - top - height;
        self.ops.push_str(&format!(
            "q {width:.2} 0 0 {height:.2} {x:.2} {y:.2} cm /{name} Do Q\n"
        ));
    }

    /// Decode `payload` once and register it as an image XObject.
    fn embed_image(&mut self, payload: &str) -> Option<PlacedImage> {
        if let Some(placed) = self.images.get(payload) {
            return Some(placed.clone());
        }

        let bytes = decode_payload(payload)?;
        let decoded = match image::load_from_memory(&bytes) {
            Ok(decoded) => decoded,
            Err(e) => {
                log::debug!("skipping undecodable image: {}", e);
                return None;
            }
        };
        let oversized = decoded.width() > MAX_IMAGE_EDGE || decoded.height() > MAX_IMAGE_EDGE;
        let decoded = if oversized {
            decoded.resize(MAX_IMAGE_EDGE, MAX_IMAGE_EDGE, FilterType::Triangle)
        } else {
            decoded
        };
        let (width, height) = (decoded.width(), decoded.height());

        // Baseline JPEGs can be embedded as-is.
        let passthrough = !oversized
            && image::guess_format(&bytes).ok() == Some(ImageFormat::Jpeg)
            && matches!(decoded.color(), ColorType::Rgb8 | ColorType::L8);

        let stream = if passthrough {
            let color_space = if decoded.color() == ColorType::L8 {
                "DeviceGray"
            } else {
                "DeviceRGB"
            };
            let mut stream = Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => color_space,
                    "BitsPerComponent" => 8_i64,
                    "Filter" => "DCTDecode",
                },
                bytes,
            );
            stream.allows_compression = false;
            stream
        } else {
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => width as i64,
                    "Height" => height as i64,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8_i64,
                },
                flatten_rgb(&decoded),
            )
        };

        let id: ObjectId = self.doc.add_object(stream);
        let name = format!("Im{}", self.images.len() + 1);
        self.xobjects.set(name.clone(), Object::Reference(id));

        let placed = PlacedImage {
            name,
            width: width.max(1) as f32,
            height: height.max(1) as f32,
        };
        self.images.insert(payload.to_string(), placed.clone());
        Some(placed)
    }
}

// ---- card extraction ----------------------------------------------------

fn product_card(node: &NodeRef) -> Card {
    Card {
        image: first_image_payload(node, "card-image-box"),
        label: node
            .select_first(".card-name")
            .map(|n| node_text(n.as_node()))
            .unwrap_or_default(),
        placeholder: node
            .select_first(".image-placeholder")
            .ok()
            .map(|n| node_text(n.as_node())),
        badge: node.select_first(".new-badge").is_ok(),
        label_bar: false,
        link: None,
    }
}

fn index_card(node: &NodeRef) -> Card {
    Card {
        image: first_image_payload(node, "index-card-image"),
        label: node
            .select_first(".index-card-label")
            .map(|n| node_text(n.as_node()))
            .unwrap_or_default(),
        placeholder: None,
        badge: false,
        label_bar: true,
        link: attr(node, "href").and_then(|href| href.strip_prefix('#').map(str::to_string)),
    }
}

fn first_image_payload(node: &NodeRef, container: &str) -> Option<String> {
    let img = node.select_first(&format!(".{container} img")).ok()?;
    let src = attr(img.as_node(), "src")?;
    src_payload(&src).map(str::to_string)
}

// ---- DOM helpers ----------------------------------------------------------

fn tag_name(node: &NodeRef) -> Option<String> {
    node.as_element().map(|el| {
        let local: &str = &el.name.local;
        local.to_ascii_lowercase()
    })
}

fn attr(node: &NodeRef, name: &str) -> Option<String> {
    let el = node.as_element()?;
    let attributes = el.attributes.borrow();
    attributes.get(name).map(str::to_string)
}

fn has_class(node: &NodeRef, class: &str) -> bool {
    attr(node, "class").is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
}

/// Visible text of `node`, treating `<br>` as a space and skipping the
/// back-to-index link inside category headings.
fn node_text(node: &NodeRef) -> String {
    let mut raw = String::new();
    collect_text(node, &mut raw);
    normalise(&raw)
}

fn collect_text(node: &NodeRef, out: &mut String) {
    for child in node.children() {
        if let Some(text) = child.as_text() {
            out.push_str(&text.borrow());
            continue;
        }
        match tag_name(&child).as_deref() {
            Some("br") => out.push(' '),
            Some("style") | Some("script") => {}
            Some(_) if has_class(&child, "back-link") => {}
            Some(_) => collect_text(&child, out),
            None => {}
        }
    }
}

fn normalise(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn breaks_before(style: &str) -> bool {
    style
        .split(';')
        .filter_map(|decl| decl.split_once(':'))
        .any(|(prop, value)| {
            prop.trim().eq_ignore_ascii_case("page-break-before")
                && value.trim().eq_ignore_ascii_case("always")
        })
}

/// Payload of a `data:` URI.
fn src_payload(src: &str) -> Option<&str> {
    let (_, payload) = src.strip_prefix("data:")?.split_once(',')?;
    (!payload.is_empty()).then_some(payload)
}

/// Payload of a `url('data:...')` inside an inline style.
fn style_payload(style: &str) -> Option<&str> {
    let start = style.find("base64,")? + "base64,".len();
    let rest = &style[start..];
    let end = rest
        .find(|c| matches!(c, '\'' | '"' | ')'))
        .unwrap_or(rest.len());
    let payload = &rest[..end];
    (!payload.is_empty()).then_some(payload)
}

// ---- text metrics and encoding --------------------------------------------

/// Helvetica averages roughly half an em per glyph.
fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5
}

fn label_size(label: &str) -> f32 {
    match crate::catalogue::sections::name_font_size(label) {
        "9pt" => 9.0,
        "8pt" => 8.0,
        _ => 7.0,
    }
}

fn wrap(text: &str, size: f32, width: f32) -> Vec<String> {
    let max_chars = ((width / (size * 0.5)) as usize).max(1);
    let mut lines = Vec::new();
    let mut line = String::new();

    for word in text.split_whitespace() {
        let needed = line.chars().count() + usize::from(!line.is_empty()) + word.chars().count();
        if needed > max_chars && !line.is_empty() {
            lines.push(std::mem::take(&mut line));
        }
        if !line.is_empty() {
            line.push(' ');
        }
        line.push_str(word);
    }
    if !line.is_empty() {
        lines.push(line);
    }
    lines
}

fn truncate(text: &str, size: f32, width: f32) -> String {
    let max_chars = ((width / (size * 0.5)) as usize).max(1);
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut cut: String = text.chars().take(max_chars.saturating_sub(3)).collect();
    cut.push_str("...");
    cut
}

/// Literal-string body in WinAnsi. Non-ASCII bytes are written as octal
/// escapes so the content stream stays 7-bit.
fn pdf_string(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(ch);
            }
            ' '..='~' => out.push(ch),
            _ => out.push_str(&format!("\\{:03o}", win_ansi(ch))),
        }
    }
    out
}

fn win_ansi(ch: char) -> u8 {
    match ch {
        '\u{A0}'..='\u{FF}' => ch as u8,
        '€' => 0x80,
        '‚' => 0x82,
        '„' => 0x84,
        '…' => 0x85,
        '•' => 0x95,
        '‘' => 0x91,
        '’' => 0x92,
        '“' => 0x93,
        '”' => 0x94,
        '–' => 0x96,
        '—' => 0x97,
        '™' => 0x99,
        _ => b'?',
    }
}

/// Raw RGB samples, compositing any alpha onto white.
fn flatten_rgb(image: &DynamicImage) -> Vec<u8> {
    if !image.color().has_alpha() {
        return image.to_rgb8().into_raw();
    }
    let rgba = image.to_rgba8();
    let mut out = Vec::with_capacity(rgba.width() as usize * rgba.height() as usize * 3);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            out.push(((u16::from(channel) * alpha + 255 * (255 - alpha)) / 255) as u8);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_string_escapes() {
        assert_eq!(pdf_string("a (b) \\ c"), "a \\(b\\) \\\\ c");
        assert_eq!(pdf_string("Café"), "Caf\\351");
        assert_eq!(pdf_string("↑"), "\\077");
    }

    #[test]
    fn test_wrap_respects_width() {
        let lines = wrap("one two three four five six", 10.0, 60.0);
        assert!(lines.iter().all(|l| l.chars().count() <= 12));
        assert_eq!(lines.join(" "), "one two three four five six");
    }

    #[test]
    fn test_breaks_before_parsing() {
        assert!(breaks_before("padding: 0; page-break-before: always;"));
        assert!(!breaks_before("page-break-before: avoid"));
    }

    #[test]
    fn test_style_payload() {
        assert_eq!(
            style_payload("background-image: url('data:image/png;base64,QUJD');"),
            Some("QUJD")
        );
        assert_eq!(style_payload("color: red"), None);
    }

    #[test]
    fn test_node_text_skips_back_link() {
        let html = kuchiki::parse_html().one(
            "<h2 id=\"x\"><a class=\"back-link\" href=\"#main-index\">BACK</a>Masala<br>Sticks</h2>",
        );
        let heading = html.select_first("h2").unwrap();
        assert_eq!(node_text(heading.as_node()), "Masala Sticks");
    }

    #[test]
    fn test_minimal_document_renders() {
        let pdf = render_document("<html><body><p>Hello</p></body></html>").unwrap();
        assert!(pdf.starts_with(b"%PDF-1.5"));
        let reloaded = Document::load_mem(&pdf).unwrap();
        assert_eq!(reloaded.get_pages().len(), 1);
    }

    #[test]
    fn test_internal_links_become_annotations() {
        let markup = "<html><body><div id=\"main-index\" class=\"toc-page\">\
                      <a href=\"#category-x\" class=\"index-card-link\"><div class=\"index-card-label\">X</div></a>\
                      <a href=\"#category-missing\" class=\"index-card-link\"><div class=\"index-card-label\">Gone</div></a></div>\
                      <div class=\"category-block\"><h2 class=\"category-heading\" id=\"category-x\">\
                      <a href=\"#main-index\" class=\"back-link\">BACK TO INDEX &uarr;</a>X</h2></div></body></html>";
        let pdf = render_document(markup).unwrap();
        let reloaded = Document::load_mem(&pdf).unwrap();
        let pages: Vec<ObjectId> = reloaded.get_pages().into_values().collect();
        assert_eq!(pages.len(), 2);

        let destination_page = |page: ObjectId| -> Vec<ObjectId> {
            let dict = reloaded.get_dictionary(page).unwrap();
            let Ok(annots) = dict.get(b"Annots").and_then(Object::as_array) else {
                return Vec::new();
            };
            annots
                .iter()
                .map(|annot| {
                    let annot = reloaded.get_dictionary(annot.as_reference().unwrap()).unwrap();
                    assert_eq!(annot.get(b"Subtype").unwrap().as_name().unwrap(), b"Link");
                    annot.get(b"Dest").unwrap().as_array().unwrap()[0]
                        .as_reference()
                        .unwrap()
                })
                .collect()
        };

        // The unknown anchor is dropped; the remaining links cross between the pages.
        assert_eq!(destination_page(pages[0]), vec![pages[1]]);
        assert_eq!(destination_page(pages[1]), vec![pages[0]]);
    }

    #[test]
    fn test_blank_cover_still_gets_a_page() {
        let markup = "<html><body><div class=\"cover-page\"><div class=\"cover-image-container\"></div></div>\
                      <div class=\"story-page\"><h1>Our Journey</h1></div></body></html>";
        let pdf = render_document(markup).unwrap();
        let reloaded = Document::load_mem(&pdf).unwrap();
        assert_eq!(reloaded.get_pages().len(), 2);
    }
}
