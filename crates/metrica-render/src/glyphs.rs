//! Builtin glyph tables and marker substitution.
//!
//! Octicon markers (`:octicon-<name>:`) become inline 16px vector icons.
//! Emoji markers (`:<shortcode>:`) become the matching Unicode character.
//! Unknown markers are left untouched.

use metrica_core::output::GlyphKind;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static OCTICON_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":octicon-([a-z0-9-]+):").expect("octicon marker pattern is valid")
});

static EMOJI_MARKER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r":([a-z0-9_+-]+):").expect("emoji marker pattern is valid")
});

/// Path data of the builtin icons, on a 16x16 grid.
const OCTICONS: &[(&str, &str)] = &[
    ("person", "M8 1a3 3 0 1 1 0 6 3 3 0 0 1 0-6zm-5 13a5 5 0 0 1 10 0v1H3z"),
    ("people", "M5 2a2.5 2.5 0 1 1 0 5 2.5 2.5 0 0 1 0-5zm6 1a2 2 0 1 1 0 4 2 2 0 0 1 0-4zM1 13a4 4 0 0 1 8 0v1H1zm9 1v-1a5 5 0 0 0-1-3 3.5 3.5 0 0 1 6 2.5V14z"),
    ("calendar", "M4 1h1v2h6V1h1v2h2a1 1 0 0 1 1 1v10a1 1 0 0 1-1 1H2a1 1 0 0 1-1-1V4a1 1 0 0 1 1-1h2zM2 6v8h12V6z"),
    ("flame", "M8 1c1 3 5 4 5 9a5 5 0 0 1-10 0c0-2 1-3 2-4 0 2 1 3 2 3 0-3-1-5 1-8z"),
    ("graph", "M1 1h1v13h13v1H1zm3 9 3-4 3 2 4-5 1 1-5 6-3-2-2 3z"),
    ("clock", "M8 1a7 7 0 1 1 0 14A7 7 0 0 1 8 1zm0 1.5a5.5 5.5 0 1 0 0 11 5.5 5.5 0 0 0 0-11zM7.25 4h1.5v3.7l2.4 2.4-1.05 1.05L7.25 8.3z"),
    ("heart", "M8 14 2 8a3.5 3.5 0 0 1 6-4.5A3.5 3.5 0 0 1 14 8z"),
    ("repo", "M3 1h10v11H4.5a1 1 0 0 0 0 2H6v1H4.5A2.5 2.5 0 0 1 2 12.5V2a1 1 0 0 1 1-1zm1 2v7.1c.2-.06.33-.1.5-.1H11V3z"),
    ("mark-github", "M8 0a8 8 0 0 0-2.5 15.6c.4.07.55-.17.55-.38v-1.4C3.8 14.3 3.3 12.9 3.3 12.9c-.36-.92-.9-1.17-.9-1.17-.73-.5.06-.49.06-.49.8.06 1.23.83 1.23.83.72 1.23 1.88.87 2.34.67.07-.52.28-.87.5-1.07-1.78-.2-3.64-.89-3.64-3.95 0-.87.31-1.59.82-2.15-.08-.2-.36-1.02.08-2.12 0 0 .67-.21 2.2.82a7.6 7.6 0 0 1 4 0c1.53-1.04 2.2-.82 2.2-.82.44 1.1.16 1.92.08 2.12.51.56.82 1.27.82 2.15 0 3.07-1.87 3.75-3.65 3.95.29.25.54.73.54 1.48v2.2c0 .21.15.46.55.38A8 8 0 0 0 8 0z"),
];

const EMOJIS: &[(&str, &str)] = &[
    ("fire", "\u{1F525}"),
    ("calendar", "\u{1F4C5}"),
    ("chart_with_upwards_trend", "\u{1F4C8}"),
    ("zap", "\u{26A1}"),
    ("star", "\u{2B50}"),
    ("sparkles", "\u{2728}"),
    ("heart", "\u{2764}\u{FE0F}"),
    ("rocket", "\u{1F680}"),
    ("octocat", "\u{1F431}"),
    ("+1", "\u{1F44D}"),
    ("tada", "\u{1F389}"),
    ("bust_in_silhouette", "\u{1F464}"),
];

pub fn octicon(name: &str) -> Option<&'static str> {
    OCTICONS.iter().find(|(n, _)| *n == name).map(|(_, d)| *d)
}

pub fn emoji(shortcode: &str) -> Option<&'static str> {
    EMOJIS.iter().find(|(n, _)| *n == shortcode).map(|(_, e)| *e)
}

/// Replace every known marker of `kind` in `document`.
pub fn inline(document: &str, kind: GlyphKind) -> String {
    match kind {
        GlyphKind::Octicon => OCTICON_MARKER
            .replace_all(document, |caps: &Captures| match octicon(&caps[1]) {
                Some(d) => format!(
                    r#"<svg class="octicon" viewBox="0 0 16 16" width="16" height="16" fill="currentColor"><path fill-rule="evenodd" d="{d}"/></svg>"#
                ),
                None => caps[0].to_string(),
            })
            .into_owned(),
        GlyphKind::Emoji => EMOJI_MARKER
            .replace_all(document, |caps: &Captures| match emoji(&caps[1]) {
                Some(e) => e.to_string(),
                None => caps[0].to_string(),
            })
            .into_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_octicon_markers_are_inlined() {
        let out = inline("<g>:octicon-person:</g><g>:octicon-unknown:</g>", GlyphKind::Octicon);
        assert!(out.contains(r#"<svg class="octicon""#));
        assert!(out.contains(":octicon-unknown:"));
        assert!(!out.contains(":octicon-person:"));
    }

    #[test]
    fn test_emoji_markers_are_inlined() {
        let out = inline("<text>:fire: 3 days, 12:30:45</text>", GlyphKind::Emoji);
        assert_eq!(out, "<text>\u{1F525} 3 days, 12:30:45</text>");
    }

    #[test]
    fn test_unknown_octicon_survives_emoji_pass() {
        let out = inline(":octicon-flame:", GlyphKind::Emoji);
        assert_eq!(out, ":octicon-flame:");
    }
}
