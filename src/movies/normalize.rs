/// Text clean-up for extracted fields
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));
static GENRE_SLASH: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*/\s*").expect("valid regex"));

/// Decode HTML entities, collapse whitespace runs and trim.
///
/// Idempotent: entities are decoded until the text stops changing.
pub fn normalize(text: &str) -> String {
    let mut decoded = text.to_string();
    loop {
        let next = decode_entities(&decoded);
        if next == decoded {
            break;
        }
        decoded = next;
    }
    WHITESPACE.replace_all(&decoded, " ").trim().to_string()
}

/// Normalize a genre list into `A, B, C` form.
pub fn normalize_genres(text: &str) -> String {
    let cleaned = normalize(text);
    let joined = GENRE_SLASH.replace_all(&cleaned, ", ");
    joined
        .trim()
        .trim_end_matches(|c: char| c == ',' || c.is_whitespace())
        .trim_start_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

/// One decoding pass. Text inside `<textarea>` is parsed as RCDATA, so
/// character references are decoded while markup is kept verbatim. Every `<`
/// is escaped first so a literal `</textarea>` cannot end the element early.
fn decode_entities(text: &str) -> String {
    if !text.contains('&') && !text.contains('\r') && !text.contains('\0') {
        return text.to_string();
    }
    let escaped = text.replace('<', "&lt;");
    let fragment = Html::parse_fragment(&format!("<textarea>\n{}</textarea>", escaped));
    fragment.root_element().text().collect()
}
