//! Table of contents and heading anchors for article markdown.

use anyhow::anyhow;
use regex::Regex;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TocEntry {
    pub level: usize,
    pub text: String,
    pub anchor: String,
}

fn heading_regex() -> anyhow::Result<Regex> {
    Regex::new(r"^(?P<hashes>#{2,3})\s+(?P<text>.+?)\s*$")
        .map_err(|e| anyhow!("internal regex compile failure: {e}"))
}

/// Lowercased heading text with whitespace runs collapsed to `-`.
pub fn anchor_for(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Second- and third-level headings, skipping fenced code blocks.
pub fn table_of_contents(content: &str) -> anyhow::Result<Vec<TocEntry>> {
    let heading_re = heading_regex()?;
    let mut in_fence = false;
    let mut entries = Vec::new();

    for line in content.lines() {
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if let Some(caps) = heading_re.captures(line) {
            let text = caps["text"].to_string();
            entries.push(TocEntry {
                level: caps["hashes"].len(),
                anchor: anchor_for(&text),
                text,
            });
        }
    }

    Ok(entries)
}

/// Rewrites each TOC heading as `## <span id="anchor">text</span>` so the
/// rendered page can link to it.
pub fn add_heading_ids(content: &str) -> anyhow::Result<String> {
    let heading_re = heading_regex()?;
    let mut in_fence = false;
    let mut out = String::with_capacity(content.len() + 64);

    for line in content.split_inclusive('\n') {
        let (body, newline) = match line.strip_suffix('\n') {
            Some(body) => (body, "\n"),
            None => (line, ""),
        };

        if body.trim_start().starts_with("```") {
            in_fence = !in_fence;
        } else if !in_fence && let Some(caps) = heading_re.captures(body) {
            let text = &caps["text"];
            out.push_str(&format!(
                "{} <span id=\"{}\">{}</span>{newline}",
                &caps["hashes"],
                anchor_for(text),
                text
            ));
            continue;
        }

        out.push_str(body);
        out.push_str(newline);
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::{add_heading_ids, anchor_for, table_of_contents};

    const ARTICLE: &str = "# Title\n\
                           intro\n\
                           ## Getting  Started\n\
                           text\n\
                           ### Build It\n\
                           ```sh\n\
                           ## not a heading\n\
                           ```\n\
                           #### too deep\n\
                           ## Wrap Up";

    #[test]
    fn anchors_are_lowercase_and_dashed() {
        assert_eq!(anchor_for("Getting  Started"), "getting-started");
        assert_eq!(anchor_for(" Build It "), "build-it");
    }

    #[test]
    fn collects_second_and_third_level_headings() {
        let toc = table_of_contents(ARTICLE).expect("toc");
        let summary: Vec<(usize, &str, &str)> = toc
            .iter()
            .map(|e| (e.level, e.text.as_str(), e.anchor.as_str()))
            .collect();
        assert_eq!(
            summary,
            vec![
                (2, "Getting  Started", "getting-started"),
                (3, "Build It", "build-it"),
                (2, "Wrap Up", "wrap-up"),
            ]
        );
    }

    #[test]
    fn rewrites_headings_with_anchor_spans() {
        let rewritten = add_heading_ids(ARTICLE).expect("rewrite");
        assert!(rewritten.contains("## <span id=\"getting-started\">Getting  Started</span>\n"));
        assert!(rewritten.contains("### <span id=\"build-it\">Build It</span>\n"));
        assert!(rewritten.ends_with("## <span id=\"wrap-up\">Wrap Up</span>"));
        assert!(rewritten.contains("## not a heading\n"));
        assert!(rewritten.contains("#### too deep\n"));
        assert!(rewritten.starts_with("# Title\nintro\n"));
    }
}
