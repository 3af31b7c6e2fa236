//! Markdown metadata extraction
//!
//! Turns raw document text into the fields the index stores: title, section
//! headers, keywords, a short summary and the text sent to the embedding
//! provider. Pure and total: bad frontmatter or odd markdown degrade to
//! fallbacks, never to an error.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::HashMap;
use std::path::Path;

lazy_static! {
    static ref FRONTMATTER_RE: Regex = Regex::new(r"(?s)^---\r?\n(.*?)\r?\n---[ \t]*(\r?\n|$)").unwrap();
    static ref HEADING_RE: Regex = Regex::new(r"^(#{1,6})\s+(.+?)(?:\s+#+)?\s*$").unwrap();
    static ref IMAGE_RE: Regex = Regex::new(r"!\[([^\]]*)\]\([^)]*\)").unwrap();
    static ref LINK_RE: Regex = Regex::new(r"\[([^\]]*)\]\([^)]*\)").unwrap();
    static ref HTML_TAG_RE: Regex = Regex::new(r"<[^>]+>").unwrap();
    static ref CODE_MARK_RE: Regex = Regex::new(r"[`~]+").unwrap();
    static ref LIST_MARKER_RE: Regex = Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+").unwrap();
}

pub const MAX_KEYWORDS: usize = 15;
pub const MAX_HEADERS: usize = 50;
pub const SUMMARY_MAX_CHARS: usize = 200;

const MIN_KEYWORD_LEN: usize = 3;
const TITLE_WEIGHT: usize = 3;
const HEADER_WEIGHT: usize = 2;

const KEYWORD_STOP_WORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "have", "his", "how", "its", "may", "new", "now", "see", "two",
    "who", "did", "get", "use", "used", "using", "this", "that", "with", "from", "your", "will",
    "when", "what", "which", "there", "their", "then", "than", "them", "they", "these", "those",
    "into", "also", "more", "most", "some", "such", "only", "other", "over", "each", "about",
    "after", "before", "should", "would", "could", "does", "been", "being", "here", "were",
    "where", "while", "very", "just", "like", "make", "need", "must", "want", "example",
];

/// Structured metadata for one document
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentMetadata {
    pub title: String,
    pub headers: Vec<String>,
    pub keywords: Vec<String>,
    pub summary: String,
    pub embedding_text: String,
}

/// Frontmatter values the extractor cares about
#[derive(Debug, Default)]
struct FrontmatterFields {
    title: Option<String>,
    summary: Option<String>,
    keywords: Vec<String>,
}

/// Extract metadata from raw markdown
pub fn extract(raw: &str, path: &Path) -> DocumentMetadata {
    let (front, body) = split_frontmatter(raw);

    let mut headings: Vec<(usize, String)> = Vec::new();
    let mut prose: Vec<String> = Vec::new();
    let mut summary_lines: Vec<String> = Vec::new();
    let mut summary_done = false;
    let mut in_fence = false;

    for line in body.lines() {
        let trimmed = line.trim();

        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            if !summary_lines.is_empty() {
                summary_done = true;
            }
            continue;
        }
        if in_fence {
            continue;
        }

        if let Some(caps) = HEADING_RE.captures(trimmed) {
            let level = caps.get(1).map(|m| m.as_str().len()).unwrap_or(1);
            let text = clean_inline(caps.get(2).map(|m| m.as_str()).unwrap_or(""));
            if !text.is_empty() {
                headings.push((level, text));
            }
            if !summary_lines.is_empty() {
                summary_done = true;
            }
            continue;
        }

        if trimmed.is_empty() {
            if !summary_lines.is_empty() {
                summary_done = true;
            }
            continue;
        }

        // Tables, comments and rules carry no prose
        if trimmed.starts_with('|') || trimmed.starts_with("<!--") || is_rule(trimmed) {
            continue;
        }

        let text = clean_inline(&LIST_MARKER_RE.replace(trimmed.trim_start_matches('>'), ""));
        if text.is_empty() {
            continue;
        }
        if !summary_done {
            summary_lines.push(text.clone());
        }
        prose.push(text);
    }

    // First H1 becomes the title unless frontmatter already named one
    let h1_index = headings.iter().position(|(level, _)| *level == 1);
    let explicit_title = front
        .title
        .clone()
        .or_else(|| h1_index.map(|i| headings[i].1.clone()));

    let headers: Vec<String> = headings
        .iter()
        .enumerate()
        .filter(|(i, _)| front.title.is_some() || Some(*i) != h1_index)
        .map(|(_, (_, text))| text.clone())
        .take(MAX_HEADERS)
        .collect();

    let summary = front
        .summary
        .clone()
        .unwrap_or_else(|| truncate_chars(&summary_lines.join(" "), SUMMARY_MAX_CHARS));

    // A file-stem title is a fallback label, not document content
    let keywords = extract_keywords(
        &front.keywords,
        explicit_title.as_deref().unwrap_or(""),
        &headers,
        &prose,
    );
    let title = explicit_title.unwrap_or_else(|| file_stem(path));

    let embedding_text = [
        title.clone(),
        headers.join(" | "),
        summary.clone(),
        keywords.join(" "),
        prose.join("\n"),
    ]
    .into_iter()
    .filter(|s| !s.is_empty())
    .collect::<Vec<_>>()
    .join("\n");

    DocumentMetadata {
        title,
        headers,
        keywords,
        summary,
        embedding_text,
    }
}

fn split_frontmatter(raw: &str) -> (FrontmatterFields, &str) {
    let Some(caps) = FRONTMATTER_RE.captures(raw) else {
        return (FrontmatterFields::default(), raw);
    };
    let body_start = caps.get(0).map(|m| m.end()).unwrap_or(0);
    let yaml = caps.get(1).map(|m| m.as_str()).unwrap_or("");

    let fields = match serde_yaml::from_str::<serde_yaml::Value>(yaml) {
        Ok(value) => parse_frontmatter(&value),
        Err(e) => {
            tracing::debug!("ignoring unparseable frontmatter: {}", e);
            FrontmatterFields::default()
        }
    };

    (fields, &raw[body_start..])
}

fn parse_frontmatter(value: &serde_yaml::Value) -> FrontmatterFields {
    let string_field = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    };

    let mut keywords = Vec::new();
    for key in ["keywords", "tags"] {
        match value.get(key) {
            Some(serde_yaml::Value::Sequence(items)) => {
                keywords.extend(items.iter().filter_map(|v| v.as_str()).map(normalize_keyword));
            }
            Some(serde_yaml::Value::String(s)) => {
                keywords.extend(s.split(',').map(normalize_keyword));
            }
            _ => {}
        }
    }
    keywords.retain(|k| !k.is_empty());

    FrontmatterFields {
        title: string_field("title"),
        summary: string_field("summary").or_else(|| string_field("description")),
        keywords,
    }
}

fn normalize_keyword(s: &str) -> String {
    s.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}

/// Frequency-ranked terms; title and header words count extra
fn extract_keywords(
    seeded: &[String],
    title: &str,
    headers: &[String],
    prose: &[String],
) -> Vec<String> {
    let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
    let mut order = 0usize;

    let mut add = |text: &str, weight: usize| {
        for term in tokenize(text) {
            if term.chars().count() < MIN_KEYWORD_LEN
                || term.chars().all(|c| c.is_ascii_digit())
                || KEYWORD_STOP_WORDS.contains(&term.as_str())
            {
                continue;
            }
            let entry = counts.entry(term).or_insert((0, order));
            entry.0 += weight;
            order += 1;
        }
    };

    add(title, TITLE_WEIGHT);
    for header in headers {
        add(header, HEADER_WEIGHT);
    }
    for line in prose {
        add(line, 1);
    }

    let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

    let mut keywords: Vec<String> = Vec::new();
    for kw in seeded.iter().cloned().chain(ranked.into_iter().map(|(t, _)| t)) {
        if keywords.len() >= MAX_KEYWORDS {
            break;
        }
        if !keywords.contains(&kw) {
            keywords.push(kw);
        }
    }
    keywords
}

/// Word-ish tokens; `snake_case` identifiers stay whole
fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(|t| t.trim_matches('_'))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn clean_inline(text: &str) -> String {
    let text = IMAGE_RE.replace_all(text, "$1");
    let text = LINK_RE.replace_all(&text, "$1");
    let text = HTML_TAG_RE.replace_all(&text, "");
    let text = CODE_MARK_RE.replace_all(&text, "");
    strip_emphasis(&text)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Drop `*`/`_` emphasis markers, keeping the ones inside a word (`max_tokens`)
fn strip_emphasis(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    for (i, &c) in chars.iter().enumerate() {
        if c == '*' || c == '_' {
            let before = i > 0 && chars[i - 1].is_alphanumeric();
            let after = chars.get(i + 1).is_some_and(|n| n.is_alphanumeric());
            if !(before && after) {
                continue;
            }
        }
        out.push(c);
    }
    out
}

fn is_rule(line: &str) -> bool {
    line.len() >= 3 && line.chars().all(|c| matches!(c, '-' | '*' | '_' | ' '))
}

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_string()
}

/// Char-aware truncation with a trailing ellipsis
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    format!("{}...", text.chars().take(keep).collect::<String>().trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"# Installing the CLI

Install the **command line** tool with [npm](https://npmjs.com) and run setup.
Second line of the intro.

## Requirements

Node 18 or newer is required to install.

```bash
npm install -g secret-code-block-term
```

### Verify the install

Run `cli --version` after install.
"#;

    #[test]
    fn test_title_and_headers() {
        let meta = extract(DOC, Path::new("/docs/install.md"));
        assert_eq!(meta.title, "Installing the CLI");
        assert_eq!(meta.headers, vec!["Requirements", "Verify the install"]);
    }

    #[test]
    fn test_summary_first_paragraph() {
        let meta = extract(DOC, Path::new("/docs/install.md"));
        assert_eq!(
            meta.summary,
            "Install the command line tool with npm and run setup. Second line of the intro."
        );
    }

    #[test]
    fn test_keywords_ranked_and_skip_code() {
        let meta = extract(DOC, Path::new("/docs/install.md"));
        assert_eq!(meta.keywords[0], "install");
        assert!(meta.keywords.len() <= MAX_KEYWORDS);
        assert!(!meta.keywords.iter().any(|k| k == "secret"));
        assert!(!meta.keywords.iter().any(|k| k == "the"));
        assert!(!meta.keywords.iter().any(|k| k == "18"));
    }

    #[test]
    fn test_embedding_text_contains_fields() {
        let meta = extract(DOC, Path::new("/docs/install.md"));
        assert!(meta.embedding_text.starts_with("Installing the CLI\n"));
        assert!(meta.embedding_text.contains("Requirements | Verify the install"));
        assert!(!meta.embedding_text.contains("secret-code-block-term"));
    }

    #[test]
    fn test_frontmatter_overrides() {
        let doc = "---\ntitle: Gateway Config\ndescription: How the gateway is configured\nkeywords: [Gateway, \"auth token\"]\n---\n# Heading One\n\nBody text here.\n";
        let meta = extract(doc, Path::new("gateway.md"));
        assert_eq!(meta.title, "Gateway Config");
        assert_eq!(meta.summary, "How the gateway is configured");
        assert_eq!(&meta.keywords[..2], &["gateway", "auth-token"]);
        // H1 is kept as a header when frontmatter supplies the title
        assert_eq!(meta.headers, vec!["Heading One"]);
    }

    #[test]
    fn test_invalid_frontmatter_is_ignored() {
        let doc = "---\ntitle: [unclosed\n---\nPlain body.\n";
        let meta = extract(doc, Path::new("notes/plain.md"));
        assert_eq!(meta.title, "plain");
        assert_eq!(meta.summary, "Plain body.");
    }

    #[test]
    fn test_empty_document() {
        let meta = extract("", Path::new("empty.md"));
        assert_eq!(meta.title, "empty");
        assert!(meta.headers.is_empty());
        assert!(meta.keywords.is_empty());
        assert!(meta.summary.is_empty());
        assert_eq!(meta.embedding_text, "empty");
    }

    #[test]
    fn test_identifiers_keep_underscores() {
        let doc = "# Config\n\nSet **max_tokens** to 100 in _gateway_config_.\n";
        let meta = extract(doc, Path::new("config.md"));
        assert_eq!(meta.summary, "Set max_tokens to 100 in gateway_config.");
        assert!(meta.keywords.iter().any(|k| k == "max_tokens"));
        assert!(meta.keywords.iter().any(|k| k == "gateway_config"));
        assert!(!meta.keywords.iter().any(|k| k == "maxtokens"));
    }

    #[test]
    fn test_heading_closing_hashes() {
        let doc = "# Languages\n\n## C#\n\n## F# ##\n\n## Input | Output\n\n## Setup ###\n";
        let meta = extract(doc, Path::new("langs.md"));
        assert_eq!(meta.headers, vec!["C#", "F#", "Input | Output", "Setup"]);
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdefghij", 6), "abc...");
        // Multi-byte characters are counted as chars
        assert_eq!(truncate_chars("가나다라마바", 5), "가나...");
    }
}
