//! Markup optimization passes.

use metrica_core::output::OptimizeTarget;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static STYLE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)(<style[^>]*>)(.*?)(</style>)").expect("style pattern is valid")
});
static CSS_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)/\*.*?\*/").expect("css comment pattern is valid"));
static CSS_PUNCTUATION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*([{}:;,>])\s*").expect("css punctuation pattern is valid"));
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace pattern is valid"));
static XML_COMMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<!--.*?-->").expect("xml comment pattern is valid"));
static INTER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r">\s+<").expect("inter-tag pattern is valid"));
static METADATA: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<metadata[^>]*>.*?</metadata>").expect("metadata pattern is valid")
});
static EMPTY_GROUP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<g(\s[^>]*)?>\s*</g>").expect("empty group pattern is valid"));

/// Minify the content of every `<style>` block.
pub fn css(document: &str) -> String {
    STYLE_BLOCK
        .replace_all(document, |caps: &Captures| {
            let rules = CSS_COMMENT.replace_all(&caps[2], "");
            let rules = WHITESPACE.replace_all(&rules, " ");
            let rules = CSS_PUNCTUATION.replace_all(&rules, "$1");
            let rules = rules.replace(";}", "}");
            format!("{}{}{}", &caps[1], rules.trim(), &caps[3])
        })
        .into_owned()
}

/// Drop comments and whitespace between tags.
pub fn xml(document: &str) -> String {
    let document = XML_COMMENT.replace_all(document, "");
    let document = INTER_TAG.replace_all(&document, "><");
    document.trim().to_string()
}

/// Drop metadata and groups left without content.
pub fn svg(document: &str) -> String {
    let mut document = METADATA.replace_all(document, "").into_owned();
    loop {
        let next = EMPTY_GROUP.replace_all(&document, "").into_owned();
        if next == document {
            return next;
        }
        document = next;
    }
}

/// Run the selected passes in a fixed order: style, markup, graphic.
pub fn run(document: String, targets: &[OptimizeTarget]) -> String {
    let mut document = document;
    if targets.contains(&OptimizeTarget::Css) {
        document = css(&document);
    }
    if targets.contains(&OptimizeTarget::Xml) {
        document = xml(&document);
    }
    if targets.contains(&OptimizeTarget::Svg) {
        document = svg(&document);
    }
    document
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_css_minification() {
        let doc = "<svg><style>\n  /* base */\n  .title { font-size : 14px ;\n color: #333; }\n</style></svg>";
        assert_eq!(css(doc), "<svg><style>.title{font-size:14px;color:#333}</style></svg>");
    }

    #[test]
    fn test_xml_pass() {
        let doc = "  <svg>\n  <!-- note -->\n  <g>\n    <text>a b</text>\n  </g>\n</svg>\n";
        assert_eq!(xml(doc), "<svg><g><text>a b</text></g></svg>");
    }

    #[test]
    fn test_svg_pass_removes_nested_empty_groups() {
        let doc = r#"<svg><metadata>x</metadata><g id="a"><g> </g></g><g><rect/></g></svg>"#;
        assert_eq!(svg(doc), "<svg><g><rect/></g></svg>");
    }

    #[test]
    fn test_passes_are_independent() {
        let doc = "<svg> <style> a { b: c; } </style> <g></g> </svg>".to_string();
        assert_eq!(run(doc.clone(), &[]), doc);
        assert_eq!(
            run(doc.clone(), &[OptimizeTarget::Css]),
            "<svg> <style>a{b:c}</style> <g></g> </svg>"
        );
        assert_eq!(
            run(doc, &OptimizeTarget::ALL),
            "<svg><style>a{b:c}</style></svg>"
        );
    }
}
