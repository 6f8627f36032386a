//! Section builders, composed in document order by the exporter:
//! head, cover, story, contents, product pages, tail.

pub mod contents;
pub mod cover;
pub mod products;
pub mod story;
pub mod styles;

pub use contents::{table_of_contents, INDEX_ANCHOR};
pub use cover::cover_page;
pub use products::{append_product_pages, name_font_size};
pub use story::story_page;
pub use styles::{document_head, DOCUMENT_TAIL};
