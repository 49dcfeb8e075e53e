//! HTML escaping for `<%= %>` output.

use std::sync::Arc;

/// Escaping function applied to escaped output.
pub type Escaper = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Replace `&`, `<`, `>`, `"` and `'` with HTML entities.
///
/// Each character is replaced once, so existing entities are escaped again:
/// `&foo_bar;` becomes `&amp;foo_bar;`.
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&#34;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// The escaper used when no override is configured.
pub fn default_escaper() -> Escaper {
    Arc::new(escape_html)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_markup() {
        assert_eq!(escape_html("&nbsp;<script>"), "&amp;nbsp;&lt;script&gt;");
    }

    #[test]
    fn test_escape_quotes() {
        assert_eq!(escape_html("The Jones's"), "The Jones&#39;s");
        assert_eq!(escape_html("say \"hi\""), "say &#34;hi&#34;");
    }

    #[test]
    fn test_existing_entity_only_escapes_ampersand() {
        assert_eq!(escape_html("&foo_bar;"), "&amp;foo_bar;");
    }

    #[test]
    fn test_plain_text_untouched() {
        assert_eq!(escape_html("plain text ünïcode"), "plain text ünïcode");
        assert_eq!(default_escaper()("a<b"), "a&lt;b");
    }
}
