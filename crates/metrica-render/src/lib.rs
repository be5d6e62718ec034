//! Template collaborator for Metrica.
//!
//! Provides the `classic` SVG template together with the post-processing
//! stages shared by every template: glyph inlining, optimization passes,
//! padding, script attachment and PNG rasterization.

pub mod classic;
pub mod convert;
pub mod glyphs;
pub mod isometric;
pub mod optimize;

pub use classic::ClassicTemplate;

use metrica_core::ports::TemplateEngine;
use std::sync::Arc;

/// Get every builtin template.
pub fn builtin_templates() -> Vec<Arc<dyn TemplateEngine>> {
    vec![Arc::new(ClassicTemplate::new())]
}

/// Escape text for use inside markup.
pub(crate) fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape() {
        assert_eq!(escape("<b>\"Tom\" & 'Jerry'</b>"), "&lt;b&gt;&quot;Tom&quot; &amp; &#39;Jerry&#39;&lt;/b&gt;");
    }

    #[test]
    fn test_builtin_templates() {
        let templates = builtin_templates();
        assert_eq!(templates.len(), 1);
        assert_eq!(templates[0].name(), "classic");
    }
}
