//! Isolated rendering of generated markup.
//!
//! Generated markup is untrusted. It is only ever shown inside a frame that
//! may run scripts but has no other capability: no navigation of the host,
//! no popups, no forms, no same-origin access. The frame does not size
//! itself, so rendering is an explicit load, measure, resize sequence, and
//! the measured height goes through a bounded [`HeightPolicy`].

use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::visualize::VisualizationResult;

/// The only capability granted to the frame.
pub const SANDBOX_FLAGS: &str = "allow-scripts";

/// How a measured content height becomes a frame height.
///
/// `height = clamp(measured + padding, min, ceiling)`. Measurements at or below
/// `trivial` mean the content has not laid out yet and keep `min`. A failed
/// measurement uses `fallback`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightPolicy {
    pub min: u32,
    pub padding: u32,
    pub ceiling: u32,
    pub trivial: u32,
    pub fallback: u32,
}

impl Default for HeightPolicy {
    fn default() -> Self {
        Self {
            min: 700,
            padding: 50,
            ceiling: 3000,
            trivial: 100,
            fallback: 1000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeightSource {
    Measured,
    Capped,
    Minimum,
    Fallback,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameSize {
    pub height: u32,
    pub source: HeightSource,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeasureError {
    #[error("guest content has not loaded")]
    NotLoaded,
    #[error("content height unavailable: {0}")]
    Unavailable(String),
}

impl HeightPolicy {
    pub fn resolve(&self, measured: Result<u32, MeasureError>) -> FrameSize {
        let measured = match measured {
            Ok(h) => h,
            Err(e) => {
                log::debug!("height measurement failed ({e}), using fallback");
                return FrameSize {
                    height: self.fallback,
                    source: HeightSource::Fallback,
                };
            }
        };
        if measured <= self.trivial {
            return FrameSize {
                height: self.min,
                source: HeightSource::Minimum,
            };
        }
        let wanted = measured.saturating_add(self.padding);
        let (height, source) = if wanted > self.ceiling {
            (self.ceiling, HeightSource::Capped)
        } else if wanted < self.min {
            (self.min, HeightSource::Minimum)
        } else {
            (wanted, HeightSource::Measured)
        };
        FrameSize { height, source }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.min == 0 {
            return Err("sandbox.min must be positive".into());
        }
        if self.ceiling < self.min {
            return Err(format!(
                "sandbox.ceiling ({}) is below sandbox.min ({})",
                self.ceiling, self.min
            ));
        }
        if self.fallback < self.min || self.fallback > self.ceiling {
            return Err(format!(
                "sandbox.fallback ({}) must lie between min ({}) and ceiling ({})",
                self.fallback, self.min, self.ceiling
            ));
        }
        Ok(())
    }
}

/// Markup prepared for a sandboxed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SandboxedDocument {
    markup: String,
}

impl SandboxedDocument {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
        }
    }

    pub fn markup(&self) -> &str {
        &self.markup
    }

    /// A standalone page embedding the markup in a sandboxed `srcdoc` frame
    /// of the given height.
    pub fn host_page(&self, title: &str, height: u32) -> String {
        let title = escape_attr(title);
        format!(
            r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<meta http-equiv="Content-Security-Policy" content="base-uri 'none'; form-action 'none'; object-src 'none'">
<meta name="referrer" content="no-referrer">
<title>{title}</title>
<style>body {{ margin: 0; }} iframe {{ display: block; width: 100%; border: 0; }}</style>
</head>
<body>
<iframe title="{title}" sandbox="{flags}" referrerpolicy="no-referrer" height="{height}" srcdoc="{srcdoc}"></iframe>
</body>
</html>
"#,
            flags = SANDBOX_FLAGS,
            srcdoc = escape_attr(&self.markup),
        )
    }
}

fn escape_attr(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}

/// A frame that hosts a sandboxed document.
pub trait GuestFrame {
    fn load(&mut self, document: &SandboxedDocument);

    /// Natural height of the loaded content.
    fn content_height(&self) -> Result<u32, MeasureError>;

    fn set_height(&mut self, height: u32);
}

/// Drives load, measure and resize on a [`GuestFrame`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SandboxRenderer {
    policy: HeightPolicy,
}

impl SandboxRenderer {
    pub fn new(policy: HeightPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &HeightPolicy {
        &self.policy
    }

    pub fn render<F: GuestFrame>(&self, frame: &mut F, result: &VisualizationResult) -> FrameSize {
        let document = SandboxedDocument::new(result.markup.clone());
        frame.load(&document);
        let size = self.policy.resolve(frame.content_height());
        frame.set_height(size.height);
        log::debug!("sandbox frame sized to {} ({:?})", size.height, size.source);
        size
    }
}

/// Frame without a layout engine: the content height is estimated from the
/// markup's explicit element heights and its amount of text.
#[derive(Debug, Clone, Default)]
pub struct LayoutEstimateFrame {
    measured: Option<Result<u32, MeasureError>>,
    height: Option<u32>,
}

const LINE_HEIGHT: u32 = 20;
const CHARS_PER_LINE: usize = 100;

static BODY: Lazy<Selector> = Lazy::new(|| Selector::parse("body").unwrap());
static STYLE_HEIGHT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(?:^|;)\s*(?:min-)?height\s*:\s*(\d+(?:\.\d+)?)px").unwrap()
});

impl LayoutEstimateFrame {
    pub fn new() -> Self {
        Self::default()
    }

    /// Height set by the last resize.
    pub fn height(&self) -> Option<u32> {
        self.height
    }
}

impl GuestFrame for LayoutEstimateFrame {
    fn load(&mut self, document: &SandboxedDocument) {
        self.measured = Some(estimate_height(document.markup()));
    }

    fn content_height(&self) -> Result<u32, MeasureError> {
        self.measured.clone().unwrap_or(Err(MeasureError::NotLoaded))
    }

    fn set_height(&mut self, height: u32) {
        self.height = Some(height);
    }
}

fn estimate_height(markup: &str) -> Result<u32, MeasureError> {
    if markup.trim().is_empty() {
        return Err(MeasureError::Unavailable("empty document".into()));
    }
    let html = Html::parse_document(markup);
    let body = html
        .select(&BODY)
        .next()
        .ok_or_else(|| MeasureError::Unavailable("document has no body".into()))?;
    Ok(element_height(body))
}

fn is_invisible(name: &str) -> bool {
    matches!(name, "script" | "style" | "head" | "template" | "noscript")
}

/// Walks the tree with an explicit stack; generated markup can nest arbitrarily deep.
fn element_height(root: ElementRef) -> u32 {
    let mut total = 0u32;
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        if let Some(el) = ElementRef::wrap(node) {
            if is_invisible(el.value().name()) {
                continue;
            }
            if let Some(h) = explicit_height(el) {
                total = total.saturating_add(h);
                continue;
            }
            stack.extend(el.children());
        } else if let Some(text) = node.value().as_text() {
            total = total.saturating_add(text_height(text.trim()));
        }
    }
    total
}

fn explicit_height(element: ElementRef) -> Option<u32> {
    let from_attr = element
        .value()
        .attr("height")
        .and_then(|h| h.trim().trim_end_matches("px").parse::<f64>().ok());
    let from_style = element
        .value()
        .attr("style")
        .and_then(|s| STYLE_HEIGHT.captures(s))
        .and_then(|c| c[1].parse::<f64>().ok());
    from_style.or(from_attr).map(|h| h.max(0.0) as u32)
}

fn text_height(text: &str) -> u32 {
    let chars = text.chars().count();
    if chars == 0 {
        return 0;
    }
    let lines = chars.div_ceil(CHARS_PER_LINE) as u32;
    lines.saturating_mul(LINE_HEIGHT)
}

/// Visible text blocks of `markup`, for terminal previews.
pub fn readable_text(markup: &str) -> Vec<String> {
    let html = Html::parse_document(markup);
    let mut blocks = Vec::new();
    if let Some(body) = html.select(&BODY).next() {
        collect_text(body, &mut blocks);
    }
    blocks
}

fn collect_text(root: ElementRef, out: &mut Vec<String>) {
    // Children are pushed in reverse so blocks come out in document order.
    let mut stack = vec![*root];
    while let Some(node) = stack.pop() {
        if let Some(el) = ElementRef::wrap(node) {
            if !is_invisible(el.value().name()) {
                stack.extend(el.children().rev());
            }
        } else if let Some(text) = node.value().as_text() {
            let text = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !text.is_empty() {
                out.push(text);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn result(markup: &str) -> VisualizationResult {
        VisualizationResult {
            query: "q".into(),
            paper_ids: vec!["a".into()],
            markup: markup.into(),
            generated_at: Utc::now(),
        }
    }

    #[test]
    fn measured_height_gets_padding() {
        let size = HeightPolicy::default().resolve(Ok(1200));
        assert_eq!(size.height, 1250);
        assert_eq!(size.source, HeightSource::Measured);
    }

    #[test]
    fn oversized_content_is_capped() {
        let size = HeightPolicy::default().resolve(Ok(50_000));
        assert_eq!(size.height, 3000);
        assert_eq!(size.source, HeightSource::Capped);
        assert_eq!(HeightPolicy::default().resolve(Ok(u32::MAX)).height, 3000);
    }

    #[test]
    fn small_and_trivial_measurements_keep_minimum() {
        let policy = HeightPolicy::default();
        assert_eq!(policy.resolve(Ok(0)).height, 700);
        assert_eq!(policy.resolve(Ok(100)).source, HeightSource::Minimum);
        assert_eq!(policy.resolve(Ok(400)).height, 700);
    }

    #[test]
    fn failed_measurement_uses_fallback() {
        let size = HeightPolicy::default().resolve(Err(MeasureError::NotLoaded));
        assert_eq!(size.height, 1000);
        assert_eq!(size.source, HeightSource::Fallback);
    }

    #[test]
    fn policy_validation() {
        assert!(HeightPolicy::default().validate().is_ok());
        let inverted = HeightPolicy {
            ceiling: 500,
            ..HeightPolicy::default()
        };
        assert!(inverted.validate().is_err());
        let stray_fallback = HeightPolicy {
            fallback: 5000,
            ..HeightPolicy::default()
        };
        assert!(stray_fallback.validate().is_err());
    }

    #[test]
    fn host_page_is_sandboxed_and_escaped() {
        let doc = SandboxedDocument::new(r#"<p class="x">a & b</p><script>go()</script>"#);
        let page = doc.host_page("Compare \"baselines\"", 900);
        assert!(page.contains(r#"sandbox="allow-scripts""#));
        assert!(page.contains(r#"height="900""#));
        assert!(page.contains("srcdoc=\"&lt;p class=&quot;x&quot;&gt;a &amp; b&lt;/p&gt;"));
        assert!(!page.contains("<script>"));
        assert!(page.contains("Compare &quot;baselines&quot;"));
        assert!(!page.contains("allow-same-origin"));
    }

    #[test]
    fn estimate_uses_explicit_heights() {
        let markup = r#"<html><body>
            <div style="width: 100%; height: 1800px"><p>chart</p></div>
            <svg height="600"></svg>
        </body></html>"#;
        assert_eq!(estimate_height(markup), Ok(2400));
    }

    #[test]
    fn estimate_counts_text_and_skips_scripts() {
        let long = "x".repeat(250);
        let markup = format!("<body><p>{long}</p><script>{long}</script></body>");
        assert_eq!(estimate_height(&markup), Ok(3 * LINE_HEIGHT));
    }

    #[test]
    fn unloaded_frame_reports_not_loaded() {
        assert_eq!(
            LayoutEstimateFrame::new().content_height(),
            Err(MeasureError::NotLoaded)
        );
    }

    #[test]
    fn render_measures_then_resizes() {
        let renderer = SandboxRenderer::default();
        let mut frame = LayoutEstimateFrame::new();
        let size = renderer.render(&mut frame, &result(r#"<div style="height: 1500px"></div>"#));
        assert_eq!(size.height, 1550);
        assert_eq!(frame.height(), Some(1550));
    }

    #[test]
    fn render_empty_markup_falls_back() {
        let mut frame = LayoutEstimateFrame::new();
        let size = SandboxRenderer::default().render(&mut frame, &result("  "));
        assert_eq!(size.source, HeightSource::Fallback);
        assert_eq!(frame.height(), Some(1000));
    }

    #[test]
    fn deeply_nested_markup_is_measured_without_recursion() {
        let depth = 20_000;
        let markup = format!("{}<p>deep</p>{}", "<div>".repeat(depth), "</div>".repeat(depth));
        let mut frame = LayoutEstimateFrame::new();
        let size = SandboxRenderer::default().render(&mut frame, &result(&markup));
        assert_eq!(size.source, HeightSource::Minimum);
        assert_eq!(readable_text(&markup), vec!["deep".to_string()]);

        let unclosed = "<div>".repeat(depth);
        let size = SandboxRenderer::default().render(&mut LayoutEstimateFrame::new(), &result(&unclosed));
        assert_eq!(size.height, 700);
        assert!(readable_text(&unclosed).is_empty());
    }

    #[test]
    fn readable_text_skips_styles() {
        let blocks = readable_text(
            "<html><head><title>t</title></head><body><style>p{}</style><h1>Results</h1><p>Method  A\n beats B</p></body></html>",
        );
        assert_eq!(blocks, vec!["Results".to_string(), "Method A beats B".to_string()]);
    }
}
