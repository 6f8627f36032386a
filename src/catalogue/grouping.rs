//! Collection / category / subcategory boundaries over the caller's order.
//!
//! Records are never sorted here. Groups are detected purely from transitions
//! between consecutive records, so a category that appears twice with other
//! records in between produces two blocks.

use super::models::ProductRecord;

const ANCHOR_PREFIX: &str = "category-";
const EMPTY_SLUG: &str = "uncategorised";

/// A transition detected during the single pass over records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GroupEvent {
    /// `page_break` is false only for the first collection of the document.
    Collection { name: String, page_break: bool },
    Category { name: String, anchor: String },
    Subcategory { label: String },
    /// `display_number` is the 1-based position in the output.
    Product { index: usize, display_number: usize },
}

/// Lower-cased letters and digits in any script, with every other run
/// collapsed to `-`. Non-ASCII marks (such as Devanagari vowel signs and the
/// virama) stay attached to their letters. A name with nothing left falls
/// back to a placeholder plus a hash of the name, so distinct names keep
/// distinct slugs.
pub fn slug(name: &str) -> String {
    let name = name.trim();
    let mut result = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if is_slug_char(ch) {
            if pending_dash && !result.is_empty() {
                result.push('-');
            }
            pending_dash = false;
            result.extend(ch.to_lowercase());
        } else {
            pending_dash = true;
        }
    }

    if result.is_empty() {
        if name.is_empty() {
            return EMPTY_SLUG.to_string();
        }
        return format!("{EMPTY_SLUG}-{:08x}", fnv1a(name));
    }
    result
}

fn is_slug_char(ch: char) -> bool {
    if ch.is_ascii() {
        ch.is_ascii_alphanumeric()
    } else {
        ch.is_alphanumeric() || !(ch.is_whitespace() || ch.is_control() || is_unicode_separator(ch))
    }
}

/// Non-ASCII punctuation that reads as a word break.
fn is_unicode_separator(ch: char) -> bool {
    matches!(
        ch,
        '\u{A0}'..='\u{BF}' | '\u{2010}'..='\u{205F}' | '\u{3000}'..='\u{3003}' | '\u{FEFF}'
    )
}

/// 32-bit FNV-1a; stable across runs and platforms.
fn fnv1a(text: &str) -> u32 {
    text.bytes().fold(0x811c_9dc5, |hash, byte| {
        (hash ^ u32::from(byte)).wrapping_mul(0x0100_0193)
    })
}

/// Document-internal anchor for a category heading.
pub fn category_anchor(category: &str) -> String {
    format!("{ANCHOR_PREFIX}{}", slug(category))
}

/// `None` for labels that mean "no subcategory": blank, `n/a`, `nan`.
pub fn subcategory_label(raw: Option<&str>) -> Option<&str> {
    let trimmed = raw?.trim();
    if trimmed.is_empty()
        || trimmed.eq_ignore_ascii_case("n/a")
        || trimmed.eq_ignore_ascii_case("nan")
    {
        return None;
    }
    Some(trimmed)
}

/// Walk `records` once and emit boundary events followed by product events.
pub fn plan(records: &[ProductRecord]) -> Vec<GroupEvent> {
    let mut events = Vec::with_capacity(records.len() * 2);
    let mut collection: Option<&str> = None;
    let mut category: Option<&str> = None;
    let mut subcategory: Option<&str> = None;

    for (index, record) in records.iter().enumerate() {
        if collection != Some(record.collection_name.as_str()) {
            events.push(GroupEvent::Collection {
                name: record.collection_name.clone(),
                page_break: collection.is_some(),
            });
            collection = Some(record.collection_name.as_str());
            category = None;
            subcategory = None;
        }

        if category != Some(record.category.as_str()) {
            events.push(GroupEvent::Category {
                name: record.category.clone(),
                anchor: category_anchor(&record.category),
            });
            category = Some(record.category.as_str());
            subcategory = None;
        }

        // Only adjacency is deduplicated; empty labels leave the tracker alone.
        if let Some(label) = subcategory_label(record.subcategory.as_deref()) {
            if subcategory != Some(label) {
                events.push(GroupEvent::Subcategory {
                    label: label.to_string(),
                });
                subcategory = Some(label);
            }
        }

        events.push(GroupEvent::Product {
            index,
            display_number: index + 1,
        });
    }

    events
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryOutline<'a> {
    pub name: &'a str,
    pub anchor: String,
    /// First usable embedded image of the category, in record order.
    pub thumbnail: Option<&'a str>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOutline<'a> {
    pub name: &'a str,
    pub categories: Vec<CategoryOutline<'a>>,
}

/// Distinct collections and their distinct categories, by first appearance.
pub fn outline(records: &[ProductRecord]) -> Vec<CollectionOutline<'_>> {
    let mut collections: Vec<CollectionOutline<'_>> = Vec::new();

    for record in records {
        let position = match collections
            .iter()
            .position(|c| c.name == record.collection_name)
        {
            Some(position) => position,
            None => {
                collections.push(CollectionOutline {
                    name: &record.collection_name,
                    categories: Vec::new(),
                });
                collections.len() - 1
            }
        };
        let categories = &mut collections[position].categories;

        match categories.iter_mut().find(|c| c.name == record.category) {
            Some(existing) => {
                if existing.thumbnail.is_none() {
                    existing.thumbnail = record.image.thumbnail();
                }
            }
            None => categories.push(CategoryOutline {
                name: &record.category,
                anchor: category_anchor(&record.category),
                thumbnail: record.image.thumbnail(),
            }),
        }
    }

    collections
}
