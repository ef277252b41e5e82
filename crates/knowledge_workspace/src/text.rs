//! Plain-text extraction from article HTML.

use std::sync::LazyLock;

use regex::Regex;

static SKIPPED_BLOCKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(script|style)\b[^>]*>.*?</(script|style)\s*>")
        .expect("regex pattern is valid")
});

static BLOCK_BREAKS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)<br\s*/?>|</(p|div|li|h[1-6]|tr|blockquote|pre)\s*>")
        .expect("regex pattern is valid")
});

static TAGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*>").expect("regex pattern is valid"));

static ENTITIES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[0-9]+|#[xX][0-9a-fA-F]+|[a-zA-Z]+);").expect("regex pattern is valid")
});

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("regex pattern is valid"));

fn decode_entity(entity: &str) -> Option<String> {
    let decoded = match entity {
        "amp" => '&',
        "lt" => '<',
        "gt" => '>',
        "quot" => '"',
        "apos" => '\'',
        "nbsp" => ' ',
        _ => {
            let code = if let Some(hex) = entity
                .strip_prefix("#x")
                .or_else(|| entity.strip_prefix("#X"))
            {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)?
        }
    };
    Some(decoded.to_string())
}

/// Converts article HTML into searchable plain text.
///
/// Script and style blocks are dropped, block boundaries become spaces,
/// common entities are decoded and whitespace is collapsed.
pub fn html_to_text(html: &str) -> String {
    let without_blocks = SKIPPED_BLOCKS.replace_all(html, " ");
    let with_breaks = BLOCK_BREAKS.replace_all(&without_blocks, " ");
    let stripped = TAGS.replace_all(&with_breaks, "");
    let decoded = ENTITIES.replace_all(&stripped, |caps: &regex::Captures<'_>| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_markup() {
        let html = "<h1>Title</h1><p>First <b>bold</b> line</p><p>Second</p>";
        assert_eq!(html_to_text(html), "Title First bold line Second");
    }

    #[test]
    fn test_drops_scripts_and_styles() {
        let html = "<style>p { color: red }</style><p>Visible</p><script>alert(1)</script>";
        assert_eq!(html_to_text(html), "Visible");
    }

    #[test]
    fn test_decodes_entities() {
        let html = "<p>Fish &amp; chips&nbsp;&lt;3 &#233;t&#xE9; &bogus;</p>";
        assert_eq!(html_to_text(html), "Fish & chips <3 été &bogus;");
    }

    #[test]
    fn test_line_breaks() {
        assert_eq!(html_to_text("one<br>two<br/>three"), "one two three");
        assert_eq!(html_to_text(""), "");
    }
}
