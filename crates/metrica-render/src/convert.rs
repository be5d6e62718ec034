//! Resize, script attachment and format conversion.

use metrica_core::output::{Artifact, OutputFormat};
use metrica_core::ports::ConvertRequest;
use metrica_core::{Error, Result};
use regex::Regex;
use std::sync::{Arc, LazyLock};
use tracing::debug;

static ROOT_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<svg\b[^>]*>").expect("root tag pattern is valid"));
static WIDTH_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\swidth="([0-9.]+)(px)?""#).expect("width pattern is valid"));
static HEIGHT_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sheight="([0-9.]+)(px)?""#).expect("height pattern is valid"));
static VIEWBOX_ATTR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\sviewBox="[^"]*""#).expect("viewBox pattern is valid"));

static FONTS: LazyLock<Arc<usvg::fontdb::Database>> = LazyLock::new(|| {
    let mut db = usvg::fontdb::Database::new();
    db.load_system_fonts();
    Arc::new(db)
});

/// Largest raster edge, in pixels.
const MAX_DIM: u32 = 8_192;

/// One padding component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Padding {
    Pixels(f64),
    Percent(f64),
}

impl Padding {
    fn parse(raw: &str) -> Result<Self> {
        let raw = raw.trim();
        let invalid = || Error::Render(format!("invalid padding: {raw}"));
        match raw.strip_suffix('%') {
            Some(percent) => percent.trim().parse().map(Padding::Percent).map_err(|_| invalid()),
            None => raw
                .trim_end_matches("px")
                .parse()
                .map(Padding::Pixels)
                .map_err(|_| invalid()),
        }
    }

    pub fn apply(&self, size: f64) -> f64 {
        match self {
            Padding::Pixels(px) => size + px,
            Padding::Percent(pc) => size * (100.0 + pc) / 100.0,
        }
    }
}

/// Parse `"<w>,<h>"`; a single value applies to both edges.
pub fn parse_padding(raw: &str) -> Result<(Padding, Padding)> {
    let mut parts = raw.split(',');
    let width = Padding::parse(parts.next().unwrap_or_default())?;
    let height = match parts.next() {
        Some(height) => Padding::parse(height)?,
        None => width,
    };
    Ok((width, height))
}

/// Enlarge the root element's `width` and `height` by the paddings.
pub fn pad(document: &str, padding: &str) -> Result<String> {
    let (pad_w, pad_h) = parse_padding(padding)?;
    let Some(root) = ROOT_TAG.find(document) else {
        return Err(Error::Render("document has no root svg element".into()));
    };
    let tag = root.as_str();
    let width = attribute(&WIDTH_ATTR, tag);
    let height = attribute(&HEIGHT_ATTR, tag);
    let (Some(width), Some(height)) = (width, height) else {
        return Ok(document.to_string());
    };

    let width = pad_w.apply(width).ceil();
    let height = pad_h.apply(height).ceil();
    let tag = WIDTH_ATTR.replace(tag, format!(r#" width="{width}""#));
    let tag = HEIGHT_ATTR.replace(&tag, format!(r#" height="{height}""#));
    let tag = VIEWBOX_ATTR.replace(&tag, format!(r#" viewBox="0 0 {width} {height}""#));

    Ok(format!(
        "{}{}{}",
        &document[..root.start()],
        tag,
        &document[root.end()..]
    ))
}

fn attribute(pattern: &Regex, tag: &str) -> Option<f64> {
    pattern
        .captures(tag)
        .and_then(|caps| caps[1].parse().ok())
}

/// Append script fragments just before the closing root tag.
pub fn attach_scripts(document: &str, scripts: &[String]) -> String {
    if scripts.is_empty() {
        return document.to_string();
    }
    let block: String = scripts
        .iter()
        .map(|script| format!("<script><![CDATA[{script}]]></script>"))
        .collect();
    match document.rfind("</svg>") {
        Some(end) => format!("{}{}{}", &document[..end], block, &document[end..]),
        None => format!("{document}{block}"),
    }
}

/// Rasterize an SVG document into PNG bytes at its intrinsic size.
pub fn rasterize(document: &str) -> Result<Vec<u8>> {
    let opts = usvg::Options {
        fontdb: Arc::clone(&FONTS),
        ..Default::default()
    };
    let tree = usvg::Tree::from_data(document.as_bytes(), &opts)
        .map_err(|e| Error::Render(format!("parse svg tree: {e}")))?;

    let size = tree.size();
    let width = (size.width().ceil() as u32).max(1);
    let height = (size.height().ceil() as u32).max(1);
    if width > MAX_DIM || height > MAX_DIM {
        return Err(Error::Render(format!(
            "raster size too large: {width}x{height} (max {MAX_DIM}x{MAX_DIM})"
        )));
    }

    let mut pixmap = resvg::tiny_skia::Pixmap::new(width, height)
        .ok_or_else(|| Error::Render("failed to allocate pixmap".into()))?;
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap.as_mut());
    debug!(width, height, "Rasterized document");

    pixmap
        .encode_png()
        .map_err(|e| Error::Render(format!("encode png: {e}")))
}

/// Final stage: padding, scripts, then transcoding.
pub fn convert(document: String, request: &ConvertRequest) -> Result<Artifact> {
    let document = match request.padding.as_deref() {
        Some(padding) if !padding.trim().is_empty() => pad(&document, padding)?,
        _ => document,
    };

    match request.format {
        OutputFormat::Svg => {
            let document = attach_scripts(&document, &request.scripts);
            Ok(Artifact::new(document.into_bytes(), OutputFormat::Svg.mime()))
        }
        OutputFormat::Png => Ok(Artifact::new(rasterize(&document)?, OutputFormat::Png.mime())),
        OutputFormat::Json => Err(Error::Internal(
            "structured output is not produced by templates".into(),
        )),
    }
}
