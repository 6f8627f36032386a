use crate::catalogue::images::data_uri;

/// Full-bleed cover. Without an image the page is still emitted, just blank.
pub fn cover_page(image: Option<&str>) -> String {
    let content = image
        .map(|payload| format!("<img src=\"{}\" alt=\"Cover\">", data_uri(payload)))
        .unwrap_or_default();

    format!("<div class=\"cover-page\"><div class=\"cover-image-container\">{content}</div></div>")
}
