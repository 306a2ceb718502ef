use std::sync::LazyLock;

use regex::Regex;

static URL_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^https?://\S+$").expect("url pattern"));
static SEARCH_PREFIX_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*search:").expect("search prefix pattern"));

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    /// A URL naming a track or playlist.
    Direct,
    /// Free text handed to a search provider.
    Search,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadQuery {
    /// What is sent to the load service.
    pub identifier: String,
    pub kind: QueryKind,
}

impl LoadQuery {
    /// Classifies user input. Plain text without a `<name>search:` prefix
    /// gets `default_prefix`. Returns `None` for blank input.
    pub fn parse(raw: &str, default_prefix: &str) -> Option<Self> {
        let raw = raw.trim();
        // Chat clients wrap links in <> to suppress embeds.
        let raw = raw
            .strip_prefix('<')
            .and_then(|r| r.strip_suffix('>'))
            .unwrap_or(raw)
            .trim();
        if raw.is_empty() {
            return None;
        }

        let query = if URL_PATTERN.is_match(raw) {
            Self {
                identifier: raw.to_string(),
                kind: QueryKind::Direct,
            }
        } else if SEARCH_PREFIX_PATTERN.is_match(raw) {
            Self {
                identifier: raw.to_string(),
                kind: QueryKind::Search,
            }
        } else {
            Self {
                identifier: format!("{default_prefix}:{raw}"),
                kind: QueryKind::Search,
            }
        };
        Some(query)
    }

    pub fn is_search(&self) -> bool {
        self.kind == QueryKind::Search
    }
}
