//! Output formats and post-processing targets.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Output format of a rendered artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Svg,
    Png,
    Json,
}

impl OutputFormat {
    pub fn mime(&self) -> &'static str {
        match self {
            OutputFormat::Svg => "image/svg+xml",
            OutputFormat::Png => "image/png",
            OutputFormat::Json => "application/json",
        }
    }

    /// Whether the artifact is produced by the template collaborator.
    pub fn is_document(&self) -> bool {
        !matches!(self, OutputFormat::Json)
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "svg" | "auto" => Ok(OutputFormat::Svg),
            "png" => Ok(OutputFormat::Png),
            "json" => Ok(OutputFormat::Json),
            other => Err(format!("Unknown output format: {}", other)),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Svg => "svg",
            OutputFormat::Png => "png",
            OutputFormat::Json => "json",
        };
        f.write_str(name)
    }
}

/// Independently toggleable optimization passes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OptimizeTarget {
    /// Style rules inside `<style>` blocks.
    Css,
    /// Raw markup (comments, inter-tag whitespace).
    Xml,
    /// Graphic markup (empty groups, metadata).
    Svg,
}

impl OptimizeTarget {
    pub const ALL: [OptimizeTarget; 3] = [OptimizeTarget::Css, OptimizeTarget::Xml, OptimizeTarget::Svg];
}

/// Glyph families that can be inlined into a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GlyphKind {
    Octicon,
    Emoji,
}

/// A finished rendering artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub body: Vec<u8>,
    pub mime: String,
}

impl Artifact {
    pub fn new(body: impl Into<Vec<u8>>, mime: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            mime: mime.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.body.len()
    }

    pub fn is_empty(&self) -> bool {
        self.body.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_output_format() {
        assert_eq!("auto".parse::<OutputFormat>(), Ok(OutputFormat::Svg));
        assert_eq!("PNG".parse::<OutputFormat>(), Ok(OutputFormat::Png));
        assert!("pdf".parse::<OutputFormat>().is_err());
        assert!(!OutputFormat::Json.is_document());
    }
}
