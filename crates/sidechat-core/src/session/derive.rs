//! Page-derived session fields.

/// Scheme of the synthetic URLs given to blank sessions.
pub const BLANK_URL_SCHEME: &str = "sidechat-blank://";

/// Titles that page context is allowed to replace.
pub const PLACEHOLDER_TITLES: &[&str] = &[
    "New Chat",
    "New Chat.md",
    "New Session",
    "New Session.md",
    "Untitled",
    "Untitled.md",
    "Blank Session",
];

const MAX_TITLE_CHARS: usize = 100;
const TITLE_EXTENSION: &str = ".md";
const KNOWN_EXTENSIONS: &[&str] = &[".md", ".markdown", ".txt"];

/// Generates a fresh synthetic URL for a blank session.
pub fn blank_url() -> String {
    format!("{BLANK_URL_SCHEME}{}", uuid::Uuid::new_v4())
}

/// True if `url` is a non-navigable marker rather than a page address.
pub fn is_synthetic_url(url: &str) -> bool {
    url.starts_with(BLANK_URL_SCHEME) || url == "about:blank"
}

/// True if `title` is empty or one of the generic placeholders.
pub fn is_placeholder_title(title: &str) -> bool {
    let title = title.trim();
    title.is_empty()
        || PLACEHOLDER_TITLES
            .iter()
            .any(|placeholder| placeholder.eq_ignore_ascii_case(title))
}

/// Builds a session title from a page title.
///
/// Whitespace is collapsed, path-hostile characters become `-`, the result is
/// truncated and always ends with a single `.md` extension. An empty page
/// title falls back to the URL host, then to `Untitled`.
pub fn derive_title(page_title: &str, url: &str) -> String {
    let mut base: String = page_title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '-',
            c if c.is_control() => ' ',
            c => c,
        })
        .collect();

    if let Some(ext) = KNOWN_EXTENSIONS
        .iter()
        .find(|ext| ends_with_ignore_case(&base, ext))
    {
        base.truncate(base.len() - ext.len());
    }
    let mut base = base.trim().trim_end_matches('.').trim().to_string();

    if base.is_empty() {
        base = domain_tag(url).unwrap_or_else(|| "Untitled".to_string());
    }
    if base.chars().count() > MAX_TITLE_CHARS {
        base = base.chars().take(MAX_TITLE_CHARS).collect::<String>().trim_end().to_string();
    }

    format!("{base}{TITLE_EXTENSION}")
}

fn ends_with_ignore_case(s: &str, suffix: &str) -> bool {
    let Some(idx) = s.len().checked_sub(suffix.len()) else {
        return false;
    };
    s.is_char_boundary(idx) && s[idx..].eq_ignore_ascii_case(suffix)
}

/// Host of an http(s) URL without a leading `www.`.
pub fn domain_tag(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?;
    let host = host.strip_prefix("www.").unwrap_or(host);
    (!host.is_empty()).then(|| host.to_string())
}
