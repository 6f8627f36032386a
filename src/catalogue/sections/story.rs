//! "Our Journey" narrative page.

use crate::catalogue::images::data_uri;

pub const STORY_TITLE: &str = "Our Journey";
pub const STORY_FOOTER: &str = "Innovation, Creativity, Sustainability";
pub const IMAGE_MISSING_TEXT: &str = "JOURNEY IMAGE NOT FOUND";

const COMPANY_TEXT: &str = "HEM Corporation is amongst the top global manufacturers and exporters \
of perfumed agarbattis. For over three decades we have been shipping high-quality masala sticks, \
agarbattis, dhoops and cones to customers in more than 70 countries.<br><br>\
HEM was named a 'Top Exporter' of incense sticks by the Export Promotion Council for Handicrafts \
(EPCH) for three consecutive years from 2008 to 2011, and received the \"Niryat Shree\" Silver \
Trophy in the Handicraft category from the Federation of Indian Export Organisations (FIEO).";

const JOURNEY_TEXT: &str = "Founded by three brothers in 1983, HEM Fragrances started as a simple \
incense store offering masala agarbatti, thuribles, incense burners and dhoops. As customers' \
needs evolved, so did the range: incense for prayer, meditation and yoga, aromatherapy diffuser \
oils, and palo santo for cleansing a space.<br><br>\
While the signature lines remain at the core, above all the premium 'HEM Precious' collection, \
the portfolio keeps growing to meet the demands of customers around the world.";

/// `image` is the journey picture payload; `None` shows a visible placeholder.
pub fn story_page(image: Option<&str>) -> String {
    let image_html = match image {
        Some(payload) => format!("<img src=\"{}\" alt=\"Journey\">", data_uri(payload)),
        None => format!("<div class=\"image-missing\">{IMAGE_MISSING_TEXT}</div>"),
    };

    format!(
        "<div class=\"story-page\">\
         <h1>{STORY_TITLE}</h1>\
         <div class=\"story-text\">{COMPANY_TEXT}</div>\
         <div class=\"story-columns\">\
         <div class=\"story-text\">{JOURNEY_TEXT}</div>\
         <div class=\"story-image\">{image_html}</div>\
         </div>\
         <h2>{STORY_FOOTER}</h2>\
         </div>"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placeholder_when_image_missing() {
        let html = story_page(None);
        assert!(html.contains(IMAGE_MISSING_TEXT));
        assert!(!html.contains("<img"));
    }

    #[test]
    fn test_image_replaces_placeholder() {
        let html = story_page(Some("iVBORw0KGgoAAAANSUhEUg"));
        assert!(!html.contains(IMAGE_MISSING_TEXT));
        assert!(html.contains("data:image/png;base64,"));
    }
}
