//! Isometric projection of a contribution calendar.
//!
//! Each day is drawn as a prism whose height is proportional to its count
//! relative to the busiest day of the calendar. Weeks advance diagonally to
//! the right, days diagonally to the left.

use crate::escape;
use metrica_core::calendar::ContributionCalendar;
use std::fmt::Write;

/// Maximum prism height, in projection units.
const PRISM: f64 = 6.0;
/// Horizontal step between neighbouring cells.
const STEP: f64 = 1.7;
const SCALE: f64 = 4.0;

pub const WIDTH: u32 = 480;

/// Height of the projection for a calendar of `weeks` weeks.
pub fn height(weeks: usize) -> u32 {
    if weeks > 30 { 270 } else { 170 }
}

/// Brightness filters used for the prism sides.
pub fn filters() -> String {
    let mut out = String::new();
    for k in [1u8, 2] {
        let slope = 1.0 - f64::from(k) * 0.4;
        let _ = write!(
            out,
            r#"<filter id="brightness{k}"><feComponentTransfer><feFuncR type="linear" slope="{slope}"/><feFuncG type="linear" slope="{slope}"/><feFuncB type="linear" slope="{slope}"/></feComponentTransfer></filter>"#
        );
    }
    out
}

/// Project `calendar` into a group of prisms.
pub fn project(calendar: &ContributionCalendar) -> String {
    let reference = calendar.reference();
    let mut out = String::new();
    let _ = write!(out, r#"<g transform="scale({SCALE}) translate(12, 0)">"#);

    for (i, week) in calendar.weeks.iter().enumerate() {
        let i = i as f64;
        let _ = write!(out, r#"<g transform="translate({}, {})">"#, fmt(i * STEP), fmt(i));
        for (j, day) in week.days.iter().enumerate() {
            let j = j as f64;
            let ratio = day.ratio(reference);
            let color = if day.color_hint.is_empty() {
                "#ebedf0".to_string()
            } else {
                escape(&day.color_hint)
            };
            let dy = j + (1.0 - ratio) * PRISM;
            let lift = ratio * PRISM;
            let _ = write!(
                out,
                concat!(
                    r#"<g transform="translate({x}, {y})">"#,
                    r#"<path fill="{c}" d="M1.7,2 0,1 1.7,0 3.4,1 z"/>"#,
                    r#"<path fill="{c}" filter="url(#brightness1)" d="M0,1 1.7,2 1.7,{l2} 0,{l1} z"/>"#,
                    r#"<path fill="{c}" filter="url(#brightness2)" d="M1.7,2 3.4,1 3.4,{l1} 1.7,{l2} z"/>"#,
                    "</g>"
                ),
                x = fmt(-j * STEP),
                y = fmt(dy),
                c = &color,
                l1 = fmt(1.0 + lift),
                l2 = fmt(2.0 + lift),
            );
        }
        out.push_str("</g>");
    }

    out.push_str("</g>");
    out
}

/// Shortest decimal form, at most three fractional digits.
fn fmt(value: f64) -> String {
    let text = format!("{value:.3}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" { "0".to_string() } else { text.to_string() }
}
