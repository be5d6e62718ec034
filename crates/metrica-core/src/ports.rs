//! Port traits (hexagonal architecture).
//!
//! These traits define the interfaces between the core domain and external adapters.

use crate::Result;
use crate::context::{AccountKind, PluginContext};
use crate::output::{Artifact, GlyphKind, OptimizeTarget, OutputFormat};
use crate::ratelimit::RateLimitSnapshot;
use async_trait::async_trait;
use serde_json::Value;

/// Remote data provider.
#[async_trait]
pub trait UpstreamApi: Send + Sync {
    /// Execute a parametrized query and return its `data` payload.
    async fn query(&self, query: &str, variables: Value) -> Result<Value>;

    /// Read the provider's quota counters.
    async fn rate_limit(&self) -> Result<RateLimitSnapshot>;
}

/// Parameters of the final format conversion stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertRequest {
    pub format: OutputFormat,
    /// `"<w>,<h>"` paddings, each in px or `%`.
    pub padding: Option<String>,
    /// Script fragments to attach to the document.
    pub scripts: Vec<String>,
}

/// Template and rendering collaborator.
pub trait TemplateEngine: Send + Sync {
    /// Template name as selected by requests.
    fn name(&self) -> &str;

    /// Content sections the template can render, in default order.
    fn sections(&self) -> Vec<String>;

    /// Whether the template can produce `format` for this kind of account.
    fn supports(&self, account: AccountKind, format: OutputFormat) -> bool;

    /// Produce a document from a finished context.
    fn render(&self, ctx: &PluginContext) -> Result<String>;

    /// Replace glyph markers with inline graphics.
    fn inline_glyphs(&self, document: String, kind: GlyphKind) -> Result<String>;

    /// Run the selected optimization passes.
    fn optimize(&self, document: String, targets: &[OptimizeTarget]) -> Result<String>;

    /// Resize, attach scripts and transcode into the requested format.
    fn convert(&self, document: String, request: &ConvertRequest) -> Result<Artifact>;
}
