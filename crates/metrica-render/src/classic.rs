//! The `classic` template.

use crate::{convert, escape, glyphs, isometric, optimize};
use metrica_core::Result;
use metrica_core::calendar::ContributionCalendar;
use metrica_core::context::{AccountKind, PluginContext};
use metrica_core::output::{Artifact, GlyphKind, OptimizeTarget, OutputFormat};
use metrica_core::ports::{ConvertRequest, TemplateEngine};
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write;
use tracing::debug;

pub const NAME: &str = "classic";

const WIDTH: u32 = isometric::WIDTH;

const STYLE: &str = r#"
  svg {
    font-family: -apple-system, BlinkMacSystemFont, Segoe UI, Helvetica, Arial, sans-serif;
    font-size: 14px;
  }
  .title { font-size: 18px; font-weight: bold; fill: #0366d6; }
  .subtitle { fill: #586069; }
  .heading { font-size: 16px; font-weight: bold; fill: #0366d6; }
  .stat { font-size: 12px; fill: #24292e; }
  .error { font-size: 12px; fill: #cb2431; }
  .footer { font-size: 10px; fill: #959da5; }
  .octicon { fill: #959da5; }
"#;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CalendarSection {
    duration: String,
    current_streak: u32,
    max_streak: u32,
    max_daily_count: u32,
    average: String,
    calendar: ContributionCalendar,
}

#[derive(Deserialize)]
struct SectionError {
    error: ErrorMessage,
}

#[derive(Deserialize)]
struct ErrorMessage {
    message: String,
}

/// Header, isometric calendar and footer stacked vertically.
#[derive(Debug, Default)]
pub struct ClassicTemplate;

impl ClassicTemplate {
    pub fn new() -> Self {
        Self
    }

    fn header(&self, ctx: &PluginContext) -> Option<(String, u32)> {
        let account = ctx.account.as_ref()?;
        let mut handle = format!("@{}", account.login);
        if let Some(repository) = &ctx.repository {
            let _ = write!(handle, "/{repository}");
        }
        let mut subtitle = vec![handle];
        if account.kind == AccountKind::User {
            subtitle.push(format!("{} followers", account.followers));
        }
        if let Some(years) = ctx
            .computed()
            .get("base.registration")
            .and_then(|r| r.get("years"))
            .and_then(Value::as_u64)
        {
            subtitle.push(match years {
                0 => "joined this year".to_string(),
                1 => "joined 1 year ago".to_string(),
                n => format!("joined {n} years ago"),
            });
        }

        let icon = match account.kind {
            AccountKind::User => ":octicon-person:",
            AccountKind::Organization => ":octicon-people:",
        };
        let markup = format!(
            concat!(
                r#"<g class="header">"#,
                r#"<g transform="translate(16, 14)">{icon}</g>"#,
                r#"<text x="40" y="28" class="title">{name}</text>"#,
                r#"<text x="40" y="48" class="subtitle">{subtitle}</text>"#,
                "</g>"
            ),
            icon = icon,
            name = escape(account.display_name()),
            subtitle = escape(&subtitle.join(" · ")),
        );
        Some((markup, 60))
    }

    fn isocalendar(&self, ctx: &PluginContext) -> Option<(String, u32)> {
        let result = ctx.plugin_result("isocalendar")?;
        if let Ok(failure) = SectionError::deserialize(result.as_ref()) {
            let markup = format!(
                r#"<g class="isocalendar"><text x="16" y="20" class="heading">Activity calendar</text><text x="16" y="40" class="error">{}</text></g>"#,
                escape(&failure.error.message)
            );
            return Some((markup, 52));
        }

        let section = match CalendarSection::deserialize(result.as_ref()) {
            Ok(section) => section,
            Err(err) => {
                debug!(error = %err, "Skipping malformed calendar result");
                return None;
            }
        };

        let period = if section.duration == "full-year" {
            "last year"
        } else {
            "last 180 days"
        };
        let projection_height = isometric::height(section.calendar.weeks.len());
        let stats = [
            format!(":fire: Current streak {} days", section.current_streak),
            format!(":zap: Best streak {} days", section.max_streak),
            format!(":star: Highest in a day {}", section.max_daily_count),
            format!(":chart_with_upwards_trend: Average per day ~{}", section.average),
        ];

        let mut markup = String::from(r#"<g class="isocalendar">"#);
        let _ = write!(
            markup,
            r#"<g transform="translate(16, 4)">:octicon-calendar:</g><text x="40" y="18" class="heading">Activity calendar, {period}</text>"#
        );
        let _ = write!(
            markup,
            r#"<g transform="translate(0, 28)">{}</g>"#,
            isometric::project(&section.calendar)
        );
        let stats_y = 28 + projection_height + 16;
        for (i, stat) in stats.iter().enumerate() {
            let x = 16 + (i as u32 % 2) * 224;
            let y = stats_y + (i as u32 / 2) * 18;
            let _ = write!(markup, r#"<text x="{x}" y="{y}" class="stat">{}</text>"#, escape(stat));
        }
        markup.push_str("</g>");
        Some((markup, stats_y + 28))
    }

    fn metadata(&self, ctx: &PluginContext) -> (String, u32) {
        let markup = format!(
            r#"<g class="metadata"><text x="{x}" y="14" class="footer" text-anchor="end">Rendered for {login} with metrica {version} ({template})</text></g>"#,
            x = WIDTH - 16,
            login = escape(ctx.login.as_str()),
            version = env!("CARGO_PKG_VERSION"),
            template = escape(&ctx.template),
        );
        (markup, 24)
    }
}

impl TemplateEngine for ClassicTemplate {
    fn name(&self) -> &str {
        NAME
    }

    fn sections(&self) -> Vec<String> {
        vec![
            "base.header".to_string(),
            "isocalendar".to_string(),
            "base.metadata".to_string(),
        ]
    }

    fn supports(&self, account: AccountKind, format: OutputFormat) -> bool {
        !(account == AccountKind::Organization && format == OutputFormat::Png)
    }

    fn render(&self, ctx: &PluginContext) -> Result<String> {
        let mut body = String::new();
        let mut height = 0;

        for section in ctx.sections.iter() {
            let rendered = match section.as_str() {
                "base.header" => self.header(ctx),
                "isocalendar" => self.isocalendar(ctx),
                "base.metadata" => Some(self.metadata(ctx)),
                _ => None,
            };
            if let Some((markup, section_height)) = rendered {
                let _ = write!(body, r#"<g transform="translate(0, {height})">{markup}</g>"#);
                height += section_height;
            }
        }

        let height = height.max(1);
        let mut document = format!(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{WIDTH}" height="{height}" viewBox="0 0 {WIDTH} {height}" class="metrica {NAME}">"#
        );
        let _ = write!(document, "<style>{STYLE}{}</style>", ctx.extras.css);
        if ctx.sections.contains("isocalendar") {
            let _ = write!(document, "<defs>{}</defs>", isometric::filters());
        }
        document.push_str(&body);
        document.push_str("</svg>");
        Ok(document)
    }

    fn inline_glyphs(&self, document: String, kind: GlyphKind) -> Result<String> {
        Ok(glyphs::inline(&document, kind))
    }

    fn optimize(&self, document: String, targets: &[OptimizeTarget]) -> Result<String> {
        Ok(optimize::run(document, targets))
    }

    fn convert(&self, document: String, request: &ConvertRequest) -> Result<Artifact> {
        convert::convert(document, request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrica_core::context::Account;
    use metrica_core::{Login, QueryParams};
    use serde_json::json;
    use std::sync::Arc;

    fn context(kind: AccountKind) -> PluginContext {
        let mut ctx = PluginContext::new(
            Login::parse("octocat").unwrap(),
            QueryParams::default(),
            NAME,
        );
        ctx.account = Some(Arc::new(Account {
            login: "octocat".into(),
            name: Some("The <Octocat>".into()),
            kind,
            avatar_url: None,
            created_at: None,
            followers: 42,
        }));
        ctx.set_computed("base.registration", Arc::new(json!({"years": 13})));
        ctx
    }

    fn calendar_result() -> Value {
        json!({
            "duration": "half-year",
            "currentStreak": 2,
            "maxStreak": 5,
            "maxDailyCount": 9,
            "average": "1.5",
            "calendar": {"weeks": [{"contributionDays": [
                {"date": "2024-01-07", "contributionCount": 0, "color": "#ebedf0"},
                {"date": "2024-01-08", "contributionCount": 9, "color": "#216e39"}
            ]}]}
        })
    }

    #[test]
    fn test_sections_follow_context_order() {
        let mut ctx = context(AccountKind::User);
        ctx.sections.insert("isocalendar");
        ctx.sections.insert("base.header");
        ctx.set_plugin_result("isocalendar", Arc::new(calendar_result()));

        let document = ClassicTemplate::new().render(&ctx).unwrap();
        let calendar = document.find(r#"class="isocalendar""#).unwrap();
        let header = document.find(r#"class="header""#).unwrap();
        assert!(calendar < header);
        assert!(document.contains("The &lt;Octocat&gt;"));
        assert!(document.contains("@octocat · 42 followers · joined 13 years ago"));
        assert!(document.contains(":fire: Current streak 2 days"));
        assert!(document.contains("Average per day ~1.5"));
        assert!(document.contains("<defs>"));
    }

    #[test]
    fn test_calendar_error_is_displayed() {
        let mut ctx = context(AccountKind::User);
        ctx.sections.insert("isocalendar");
        ctx.set_plugin_result(
            "isocalendar",
            Arc::new(json!({"error": {"message": "upstream exploded"}})),
        );
        let document = ClassicTemplate::new().render(&ctx).unwrap();
        assert!(document.contains(r#"class="error">upstream exploded"#));
    }

    #[test]
    fn test_extras_css_is_appended() {
        let mut ctx = context(AccountKind::User);
        ctx.sections.insert("base.metadata");
        ctx.extras.css = ".footer{fill:red}".into();
        let document = ClassicTemplate::new().render(&ctx).unwrap();
        assert!(document.contains(".footer{fill:red}</style>"));
        assert!(document.contains("Rendered for octocat with metrica"));
        assert!(!document.contains("<defs>"));
    }

    #[test]
    fn test_document_height_matches_sections() {
        let mut ctx = context(AccountKind::Organization);
        ctx.sections.insert("base.header");
        ctx.sections.insert("base.metadata");
        let document = ClassicTemplate::new().render(&ctx).unwrap();
        assert!(document.starts_with(
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="480" height="84" viewBox="0 0 480 84""#
        ));
        assert!(document.contains(":octicon-people:"));
        assert!(!document.contains("followers"));
    }

    #[test]
    fn test_supported_outputs() {
        let template = ClassicTemplate::new();
        assert!(template.supports(AccountKind::User, OutputFormat::Png));
        assert!(template.supports(AccountKind::Organization, OutputFormat::Svg));
        assert!(template.supports(AccountKind::Organization, OutputFormat::Json));
        assert!(!template.supports(AccountKind::Organization, OutputFormat::Png));
    }

    #[test]
    fn test_full_chain_produces_png() {
        let mut ctx = context(AccountKind::User);
        ctx.sections.insert("base.header");
        ctx.sections.insert("isocalendar");
        ctx.set_plugin_result("isocalendar", Arc::new(calendar_result()));

        let template = ClassicTemplate::new();
        let document = template.render(&ctx).unwrap();
        let document = template.inline_glyphs(document, GlyphKind::Octicon).unwrap();
        let document = template.inline_glyphs(document, GlyphKind::Emoji).unwrap();
        let document = template.optimize(document, &OptimizeTarget::ALL).unwrap();
        assert!(!document.contains(":octicon-person:"));
        assert!(document.contains('\u{1F525}'));

        let artifact = template
            .convert(
                document,
                &ConvertRequest {
                    format: OutputFormat::Png,
                    padding: Some("0,8".into()),
                    scripts: vec![],
                },
            )
            .unwrap();
        assert_eq!(artifact.mime, "image/png");
        assert!(!artifact.is_empty());
    }
}
