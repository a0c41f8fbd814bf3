//! Markdown extraction helpers
//!
//! Pulls the pieces of a note the stores care about: title, tags, outgoing
//! links and a plain-text description for embedding.

use regex::Regex;
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

/// Minimum length (chars) for a paragraph to qualify as the description.
pub const MIN_DESCRIPTION_CHARS: usize = 50;
/// Descriptions are truncated to this many chars.
pub const MAX_DESCRIPTION_CHARS: usize = 500;

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)(?:^|\s)#([A-Za-z0-9_/\-]+)").expect("tag regex is valid")
});

static WIKILINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[([^\]]+)\]\]").expect("wikilink regex is valid"));

static MD_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!?\[[^\]]*\]\(([^)\s]+)(?:\s+[^)]*)?\)").expect("link regex is valid")
});

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s{0,3}#{1,6}(\s+|$)").expect("heading regex is valid"));

static LIST_MARKER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*+]|\d+[.)])\s+(?:\[[ xX]\]\s+)?").expect("list regex is valid")
});

static QUOTE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:>\s?)+").expect("quote regex is valid"));

static IMAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!\[([^\]]*)\]\([^)]*\)").expect("image regex is valid"));

static INLINE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]\([^)]*\)").expect("inline link regex is valid"));

static WIKILINK_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"!?\[\[([^\]|#]*)(?:#[^\]|]*)?(?:\|([^\]]+))?\]\]").expect("wikilink regex is valid")
});

static EMPHASIS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\*\*\*|\*\*|__|~~|\*|`").expect("emphasis regex is valid"));

static RULE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*(?:-{3,}|\*{3,}|_{3,})\s*$").expect("rule regex is valid"));

static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex is valid"));

/// Title is the file stem of the note path.
pub fn extract_title(relative_path: &str) -> String {
    Path::new(relative_path)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "Untitled".to_string())
}

/// Top-level folder of the note, or `general` for notes at the vault root.
pub fn extract_domain(relative_path: &str) -> String {
    let mut components = Path::new(relative_path).components().filter_map(|c| match c {
        Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
        _ => None,
    });

    match (components.next(), components.next()) {
        (Some(folder), Some(_)) => folder,
        _ => "general".to_string(),
    }
}

/// Remove a leading YAML front matter block.
pub fn strip_front_matter(content: &str) -> &str {
    let Some(rest) = content
        .strip_prefix("---\n")
        .or_else(|| content.strip_prefix("---\r\n"))
    else {
        return content;
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        offset += line.len();
        let trimmed = line.trim_end();
        if trimmed == "---" || trimmed == "..." {
            return &rest[offset..];
        }
    }
    content
}

/// Drop fenced code blocks (``` or ~~~), keeping everything else line by line.
pub fn strip_code_blocks(content: &str) -> String {
    let mut out = String::with_capacity(content.len());
    let mut fence: Option<&str> = None;

    for line in content.lines() {
        let trimmed = line.trim_start();
        match fence {
            Some(marker) => {
                if trimmed.starts_with(marker) {
                    fence = None;
                }
            }
            None => {
                if trimmed.starts_with("```") {
                    fence = Some("```");
                } else if trimmed.starts_with("~~~") {
                    fence = Some("~~~");
                } else {
                    out.push_str(line);
                    out.push('\n');
                }
            }
        }
    }

    out
}

/// Body text with front matter and code blocks removed.
fn prose(content: &str) -> String {
    strip_code_blocks(strip_front_matter(content))
}

/// Extract `#tags` in order of first appearance, without duplicates.
///
/// Tags inside code blocks and purely numeric tags (`#1`) are ignored.
pub fn extract_tags(content: &str) -> Vec<String> {
    let body = prose(content);
    let mut tags: Vec<String> = Vec::new();

    for cap in TAG_RE.captures_iter(&body) {
        let tag = cap[1].trim_end_matches(['/', '-']);
        if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit()) {
            continue;
        }
        if !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }

    tags
}

/// Extract outgoing links as vault-relative `.md` paths.
///
/// Wiki links (`[[Target]]`, `[[Target|alias]]`, `[[Target#heading]]`) are
/// resolved from the vault root. Markdown links to `.md` files are resolved
/// relative to the directory of the linking note. External URLs, links to
/// non-note files, self links and links escaping the vault are dropped.
pub fn extract_links(content: &str, note_path: &str) -> Vec<String> {
    let body = prose(content);
    let mut links: Vec<String> = Vec::new();
    let mut push = |target: String| {
        if target != note_path && !links.contains(&target) {
            links.push(target);
        }
    };

    for cap in WIKILINK_RE.captures_iter(&body) {
        let inner = &cap[1];
        let target = inner.split('|').next().unwrap_or_default();
        let target = target.split('#').next().unwrap_or_default().trim();
        if target.is_empty() {
            continue;
        }

        let with_ext = match Path::new(target).extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("md") => target.to_string(),
            Some(ext) if !ext.contains(' ') && ext.len() <= 5 => continue,
            _ => format!("{}.md", target),
        };

        if let Some(resolved) = normalize_path(Path::new(&with_ext)) {
            push(resolved);
        }
    }

    let note_dir = Path::new(note_path).parent().unwrap_or(Path::new(""));
    for cap in MD_LINK_RE.captures_iter(&body) {
        if cap[0].starts_with('!') {
            continue;
        }
        let raw = &cap[1];
        if raw.starts_with('#') || raw.contains("://") || raw.starts_with("mailto:") {
            continue;
        }

        let target = raw.split('#').next().unwrap_or_default().replace("%20", " ");
        if !target.to_ascii_lowercase().ends_with(".md") {
            continue;
        }

        let joined = if let Some(from_root) = target.strip_prefix('/') {
            PathBuf::from(from_root)
        } else {
            note_dir.join(&target)
        };

        if let Some(resolved) = normalize_path(&joined) {
            push(resolved);
        }
    }

    links
}

/// Collapse `.` and `..` segments; `None` if the path escapes the vault root.
fn normalize_path(path: &Path) -> Option<String> {
    let mut parts: Vec<String> = Vec::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
            Component::ParentDir => {
                parts.pop()?;
            }
            Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
        }
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join("/"))
    }
}

/// Strip inline Markdown markup from a single line.
pub fn strip_markup(line: &str) -> String {
    if RULE_RE.is_match(line) {
        return String::new();
    }

    let line = HEADING_RE.replace(line, "");
    let line = QUOTE_RE.replace(&line, "");
    let line = LIST_MARKER_RE.replace(&line, "");
    let line = IMAGE_RE.replace_all(&line, "$1");
    let line = WIKILINK_TEXT_RE.replace_all(&line, |caps: &regex::Captures| {
        caps.get(2)
            .or_else(|| caps.get(1))
            .map(|m| m.as_str().to_string())
            .unwrap_or_default()
    });
    let line = INLINE_LINK_RE.replace_all(&line, "$1");
    let line = EMPHASIS_RE.replace_all(&line, "");

    line.trim().to_string()
}

/// Plain-text description used for the embedding and the vector payload.
///
/// Returns the first paragraph of at least [`MIN_DESCRIPTION_CHARS`] characters
/// (truncated to [`MAX_DESCRIPTION_CHARS`]), falling back to `title` when no
/// paragraph qualifies. Returns `None` when the note has no readable text at
/// all.
pub fn extract_description(content: &str, title: &str) -> Option<String> {
    let body = prose(content);
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<String> = Vec::new();

    let mut has_text = false;
    for line in body.lines() {
        let is_heading = HEADING_RE.is_match(line);
        let stripped = strip_markup(line);
        if stripped.chars().any(char::is_alphanumeric) {
            has_text = true;
        }

        if is_heading || stripped.is_empty() {
            flush(&mut current, &mut paragraphs);
            continue;
        }
        current.push(stripped);
    }
    flush(&mut current, &mut paragraphs);

    if !has_text {
        return None;
    }

    let description = paragraphs
        .into_iter()
        .find(|p| p.chars().count() >= MIN_DESCRIPTION_CHARS)
        .map(|p| truncate_chars(&p, MAX_DESCRIPTION_CHARS))
        .unwrap_or_else(|| title.to_string());

    Some(description)
}

fn flush(current: &mut Vec<String>, paragraphs: &mut Vec<String>) {
    if current.is_empty() {
        return;
    }
    let joined = current.join(" ");
    let collapsed = WHITESPACE_RE.replace_all(&joined, " ").trim().to_string();
    if !collapsed.is_empty() {
        paragraphs.push(collapsed);
    }
    current.clear();
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].trim_end().to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LONG: &str =
        "This paragraph is comfortably longer than fifty characters, so it qualifies.";

    #[test]
    fn test_extract_title_uses_file_stem() {
        assert_eq!(extract_title("projects/Alpha Plan.md"), "Alpha Plan");
        assert_eq!(extract_title("root.md"), "root");
    }

    #[test]
    fn test_extract_domain() {
        assert_eq!(extract_domain("projects/alpha/plan.md"), "projects");
        assert_eq!(extract_domain("inbox.md"), "general");
    }

    #[test]
    fn test_extract_tags_basic() {
        let content = "#rust is fun\nSome text #async and #rust again #nested/tag";
        assert_eq!(extract_tags(content), vec!["rust", "async", "nested/tag"]);
    }

    #[test]
    fn test_extract_tags_ignores_headings_code_and_numbers() {
        let content = "# Heading\n## Sub\nIssue #42 fixed #done\n```\n#not-a-tag\n```\nurl.com/#anchor";
        assert_eq!(extract_tags(content), vec!["done"]);
    }

    #[test]
    fn test_extract_links_wikilinks() {
        let content = "See [[Other Note]], [[folder/Deep|alias]] and [[Topic#Section]].\n![[image.png]] [[#local]]";
        assert_eq!(
            extract_links(content, "inbox.md"),
            vec!["Other Note.md", "folder/Deep.md", "Topic.md"]
        );
    }

    #[test]
    fn test_extract_links_markdown_relative() {
        let content = "[sibling](sibling.md) [up](../top.md#part) [web](https://x.io/a.md) [img](pic.png)\n![embed](img.md)";
        assert_eq!(
            extract_links(content, "projects/alpha.md"),
            vec!["projects/sibling.md", "top.md"]
        );
    }

    #[test]
    fn test_extract_links_drops_escapes_and_self() {
        let content = "[out](../../outside.md) [[inbox]]";
        assert!(extract_links(content, "inbox.md").is_empty());
    }

    #[test]
    fn test_strip_markup() {
        assert_eq!(strip_markup("## **Bold** heading"), "Bold heading");
        assert_eq!(strip_markup("- [x] done [link](a.md)"), "done link");
        assert_eq!(strip_markup("> quoted `code` [[Target|Alias]]"), "quoted code Alias");
        assert_eq!(strip_markup("---"), "");
    }

    #[test]
    fn test_description_first_long_paragraph() {
        let content = format!("# Title\n\nShort intro.\n\n{}\n\nAnother paragraph.", LONG);
        assert_eq!(extract_description(&content, "Title").as_deref(), Some(LONG));
    }

    #[test]
    fn test_description_skips_front_matter_and_code() {
        let content = format!(
            "---\ntags: [a]\n---\n```rust\nfn main() {{ println!(\"a very long line of code that is not prose at all\"); }}\n```\n{}",
            LONG
        );
        assert_eq!(extract_description(&content, "T").as_deref(), Some(LONG));
    }

    #[test]
    fn test_description_falls_back_to_title() {
        assert_eq!(
            extract_description("just a few words", "My Note").as_deref(),
            Some("My Note")
        );
    }

    #[test]
    fn test_description_truncated() {
        let content = "word ".repeat(300);
        let description = extract_description(&content, "T").unwrap();
        assert!(description.chars().count() <= MAX_DESCRIPTION_CHARS);
        assert!(description.starts_with("word word"));
    }

    #[test]
    fn test_description_none_for_unreadable_content() {
        assert!(extract_description("", "Empty").is_none());
        assert!(extract_description("---\n***\n> \n", "Symbols").is_none());
        assert!(extract_description("```\ncode only\n```", "Code").is_none());
    }
}
