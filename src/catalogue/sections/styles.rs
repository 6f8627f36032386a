//! Document head: page geometry, class styles and the watermark layer.

use crate::catalogue::images::data_uri;

const STYLESHEET: &str = r#"
@page { size: A4; margin: 0; }
* { box-sizing: border-box; }
html, body { margin: 0 !important; padding: 0 !important; width: 100% !important; background-color: transparent !important; }
#watermark-layer { position: fixed; top: 0; left: 0; width: 100%; height: 100%; z-index: -1; background-repeat: repeat; background-position: center center; background-size: cover; background-color: transparent; }
.cover-page { width: 210mm; height: 260mm; display: block; position: relative; margin: 0; padding: 0; overflow: hidden; page-break-after: always; background-color: #ffffff; z-index: 10; }
.cover-image-container { position: absolute; top: 0; left: 0; height: 100%; width: 100%; z-index: 1; }
.cover-image-container img { width: 100%; height: 100%; object-fit: cover; }
.story-page, .toc-page { width: 210mm; display: block; position: relative; margin: 0; background-color: transparent; page-break-after: always; }
.story-page { padding: 25px 50px; font-family: sans-serif; overflow: hidden; height: 260mm; }
.story-page h1 { text-align: center; color: #333; font-size: 28pt; margin-bottom: 20px; }
.story-page h2 { text-align: center; font-size: 14pt; margin-top: 40px; clear: both; }
.story-text { font-size: 11pt; line-height: 1.6; margin-bottom: 30px; text-align: justify; }
.story-columns { margin-bottom: 30px; overflow: auto; clear: both; }
.story-columns .story-text { float: left; width: 50%; margin-right: 20px; }
.story-image { float: right; width: 45%; text-align: center; }
.story-image img { max-width: 100%; height: auto; border: 1px solid #eee; }
.image-missing { border: 2px dashed red; padding: 20px; color: red; }
.toc-page { padding: 20px; }
.toc-title { text-align: center; font-family: serif; font-size: 32pt; color: #222; margin-bottom: 20px; margin-top: 10px; text-transform: uppercase; letter-spacing: 1px; }
.toc-section { padding-top: 10px; }
h3.toc-catalogue-section-header { background-color: #333; color: #ffffff; font-family: sans-serif; font-size: 16pt; padding: 12px; margin: 0 0 15px 0; text-align: left; border-left: 8px solid #ff9800; clear: both; page-break-inside: avoid; }
.index-grid-container { display: block; width: 100%; margin: 0 auto; font-size: 0; }
a.index-card-link { display: inline-block; width: 30%; margin: 1.5%; height: 200px; background-color: #fff; border-radius: 8px; text-decoration: none; overflow: hidden; border: 1px solid #e0e0e0; page-break-inside: avoid; vertical-align: top; }
.index-card-image { width: 100%; height: 160px; background-color: #f9f9f9; text-align: center; overflow: hidden; }
.index-card-image img { max-width: 100%; max-height: 160px; }
.index-card-image.empty { background-color: #eee; }
.index-card-label { height: 40px; background-color: #b30000; color: white; font-family: sans-serif; font-size: 9pt; font-weight: bold; display: block; line-height: 40px; text-align: center; text-transform: uppercase; letter-spacing: 0.5px; white-space: nowrap; overflow: hidden; text-overflow: ellipsis; padding: 0 10px; }
.catalogue-content { padding-left: 10mm; padding-right: 10mm; display: block; padding-bottom: 50px; position: relative; z-index: 1; background-color: transparent; }
.catalogue-heading { background-color: #333; color: white; font-size: 18pt; padding: 8px 15px; margin-bottom: 5px; font-weight: bold; font-family: sans-serif; text-align: center; page-break-inside: avoid; clear: both; }
.category-heading { color: #333; font-size: 14pt; padding: 8px 0 4px 0; border-bottom: 2px solid #E5C384; margin-top: 5mm; clear: both; font-family: serif; page-break-inside: avoid; width: 100%; }
.back-link { float: right; font-size: 10px; color: #555; text-decoration: none; font-weight: normal; font-family: sans-serif; margin-top: 4px; }
.subcat-pdf-header { color: #007bff; font-size: 11pt; font-weight: bold; margin-top: 10px; margin-bottom: 5px; clear: both; font-family: sans-serif; border-left: 3px solid #007bff; padding-left: 8px; page-break-inside: avoid; width: 100%; }
.case-size-info { color: #555; font-size: 10pt; font-style: italic; margin-bottom: 5px; clear: both; font-family: sans-serif; }
.case-size-table { width: 100%; border-collapse: collapse; font-family: sans-serif; font-size: 9pt; margin-bottom: 10px; clear: both; background-color: rgba(255,255,255,0.9); }
.case-size-table th { border: 1px solid #ddd; background-color: #f2f2f2; padding: 4px; text-align: center; font-weight: bold; font-size: 8pt; color: #333; }
.case-size-table td { border: 1px solid #ddd; padding: 4px; text-align: center; color: #444; }
.clearfix::after { content: ""; clear: both; display: table; }
.category-block { display: block; font-size: 0; clear: both; page-break-inside: auto; margin-bottom: 20px; width: 100%; page-break-before: always; }
h1.catalogue-heading + .category-block { page-break-before: avoid !important; }
.product-card { display: inline-block; width: 23%; margin: 10px 1%; vertical-align: top; font-size: 12pt; padding: 0; background-color: #fcfcfc; border: 1px solid #E5C384; border-radius: 5px; text-align: center; position: relative; overflow: hidden; height: 180px; page-break-inside: avoid; }
.new-badge { position: absolute; top: 0; right: 0; background-color: #dc3545; color: white; font-size: 8px; font-weight: bold; padding: 2px 8px; border-radius: 0 0 0 5px; z-index: 10; }
.card-image-box { width: 100%; height: 115px; position: relative; background-color: #fff; border-bottom: 1px solid #eee; overflow: hidden; }
.card-image-box img { position: absolute; top: 0; bottom: 0; left: 0; right: 0; margin: auto; max-width: 95%; max-height: 95%; width: auto; height: auto; display: block; }
.image-placeholder { padding-top: 40px; color: #ccc; font-size: 10px; }
.card-info-box { height: 60px; display: block; padding: 5px; }
.card-name { font-family: serif; color: #000; line-height: 1.2; font-weight: bold; margin: 0; padding-top: 5px; display: block; }
.card-number { color: #007bff; margin-right: 2px; }
"#;

/// Everything up to and including the watermark layer inside `<body>`.
pub fn document_head(watermark: Option<&str>) -> String {
    let watermark_style = match watermark {
        Some(payload) => format!(
            " style=\"background-image: url('{}');\"",
            data_uri(payload)
        ),
        None => String::new(),
    };

    format!(
        "<!DOCTYPE html><html><head><meta charset=\"UTF-8\"><style>{STYLESHEET}</style></head>\
         <body style=\"margin: 0; padding: 0;\"><div id=\"watermark-layer\"{watermark_style}></div>"
    )
}

pub const DOCUMENT_TAIL: &str = "</body></html>";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_head_declares_a4_without_margins() {
        let head = document_head(None);
        assert!(head.contains("@page { size: A4; margin: 0; }"));
        assert!(head.contains("<div id=\"watermark-layer\"></div>"));
    }

    #[test]
    fn test_watermark_is_inlined() {
        let head = document_head(Some("iVBORw0KGgoAAAANSUhEUg"));
        assert!(head.contains("background-image: url('data:image/png;base64,iVBORw0KGgo"));
    }
}
