// Link extraction: turns a message into the ordered list of items to check.
//
// Items are the http(s) URLs found in the message text, in the order they
// appear, followed by attachment URLs in attachment order. Attachments are
// treated exactly like links; their URLs are taken verbatim.

use std::sync::LazyLock;

use regex_lite::Regex;

static URL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    // Stops at whitespace and at the delimiters chat clients wrap links in.
    Regex::new(r#"(?i)\bhttps?://[^\s<>"'`|]+"#).expect("URL pattern is valid")
});

/// Characters that end a sentence rather than a URL.
const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', '*', '_', '~'];

/// Find every http(s) URL in free text, in order of appearance.
pub fn extract_links(text: &str) -> Vec<String> {
    URL_PATTERN
        .find_iter(text)
        .map(|m| trim_url(m.as_str()))
        .filter(|url| !url.is_empty())
        .map(str::to_string)
        .collect()
}

/// Strip trailing punctuation, and closing brackets that have no opening
/// partner inside the URL (e.g. a link written in parentheses).
fn trim_url(mut url: &str) -> &str {
    loop {
        let trimmed = url.trim_end_matches(TRAILING_PUNCTUATION);
        let trimmed = strip_unbalanced(trimmed, '(', ')');
        let trimmed = strip_unbalanced(trimmed, '[', ']');
        if trimmed.len() == url.len() {
            return trimmed;
        }
        url = trimmed;
    }
}

fn strip_unbalanced(url: &str, open: char, close: char) -> &str {
    if url.ends_with(close) && url.matches(open).count() < url.matches(close).count() {
        &url[..url.len() - close.len_utf8()]
    } else {
        url
    }
}

/// All items for one message: text links first, then attachments.
pub fn message_items(text: &str, attachment_urls: &[String]) -> Vec<String> {
    let mut items = extract_links(text);
    items.extend(attachment_urls.iter().cloned());
    items
}
