//! Markup accumulation helpers.

/// Ordered fragment list joined once at the end.
#[derive(Debug, Default)]
pub struct MarkupBuffer {
    parts: Vec<String>,
}

impl MarkupBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: impl Into<String>) {
        self.parts.push(fragment.into());
    }

    pub fn finish(self) -> String {
        self.parts.concat()
    }
}

/// Escape text for use inside element content or a quoted attribute.
pub fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_html() {
        assert_eq!(
            escape_html(r#"Rose & "Oud" <Premium>"#),
            "Rose &amp; &quot;Oud&quot; &lt;Premium&gt;"
        );
        assert_eq!(escape_html("plain"), "plain");
    }

    #[test]
    fn test_buffer_preserves_order() {
        let mut buffer = MarkupBuffer::new();
        buffer.push("<a>");
        buffer.push(String::from("b"));
        buffer.push("</a>");
        assert_eq!(buffer.finish(), "<a>b</a>");
    }
}
