//! Automatic annotation of a screenshot by an external image-analysis model.
//!
//! The model is asked for a small JSON array of issues with fractional
//! positions. Its reply is parsed leniently (code fences are stripped, bad
//! items skipped) and normalized into store-ready annotations in the
//! surface's pixel space.

use crate::annotation::{next_id, Annotation, AnnotationKind};
use crate::critique::client::{GenerateRequest, GenerativeClient};
use crate::{Error, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

pub const DEFAULT_ISSUE_TEXT: &str = "UI/UX issue detected";
/// Dimensions assumed when the caller reports none
pub const DEFAULT_WIDTH: u32 = 1200;
pub const DEFAULT_HEIGHT: u32 = 900;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FractionalPosition {
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

/// One issue as reported by the model. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisItem {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Position as fractions of the image size
    #[serde(default)]
    pub position: Option<FractionalPosition>,
    /// Raw pixel position, used as-is when present
    #[serde(default)]
    pub x: Option<f64>,
    #[serde(default)]
    pub y: Option<f64>,
}

impl AnalysisItem {
    pub fn fractional(text: &str, kind: &str, x: f64, y: f64) -> Self {
        Self {
            text: Some(text.to_string()),
            kind: Some(kind.to_string()),
            position: Some(FractionalPosition {
                x: Some(x),
                y: Some(y),
            }),
            ..Default::default()
        }
    }

    pub fn pixels(text: &str, kind: &str, x: f64, y: f64) -> Self {
        Self {
            text: Some(text.to_string()),
            kind: Some(kind.to_string()),
            x: Some(x),
            y: Some(y),
            ..Default::default()
        }
    }
}

pub fn analysis_prompt(width: u32, height: u32) -> String {
    format!(
        r#"Analyze this website screenshot and identify 3-5 UX/UI issues.
The image dimensions are {width}x{height} pixels.

For each issue:
1. Describe the issue briefly (max 10 words)
2. Classify as "error" (serious problem), "warning" (moderate issue), or "suggestion" (improvement)
3. Give approximate x,y coordinates as fractions of the image width/height where the issue is located

Respond with JSON only, in this format:
[
  {{
    "text": "Issue description",
    "type": "error|warning|suggestion",
    "position": {{ "x": 0.5, "y": 0.3 }}
  }}
]

Look especially for:
- Unclear call-to-action buttons
- Low contrast text
- Overwhelming amount of text
- Poor visual hierarchy
- Confusing navigation
- Mobile responsiveness issues
- Accessibility concerns
- Slow-loading elements
- Inconsistent design"#
    )
}

static JSON_FENCE: OnceLock<Option<Regex>> = OnceLock::new();
static ANY_FENCE: OnceLock<Option<Regex>> = OnceLock::new();

/// Body of the first ```json (or bare ```) fenced block, else the whole text
pub fn strip_code_fence(text: &str) -> &str {
    let json = JSON_FENCE.get_or_init(|| Regex::new(r"```json\s*([\s\S]*?)\s*```").ok());
    let any = ANY_FENCE.get_or_init(|| Regex::new(r"```\s*([\s\S]*?)\s*```").ok());
    for re in [json, any].into_iter().flatten() {
        if let Some(m) = re.captures(text).and_then(|c| c.get(1)) {
            return m.as_str();
        }
    }
    text.trim()
}

/// Parse the model's reply into issue items.
///
/// Items that are not objects of the expected shape are skipped; a reply
/// that is not a JSON array at all is an `AnalysisError`.
pub fn parse_analysis_response(text: &str) -> Result<Vec<AnalysisItem>> {
    let body = strip_code_fence(text);
    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| Error::AnalysisError(format!("response is not JSON: {}", e)))?;
    let array = match value {
        serde_json::Value::Array(items) => items,
        // Some replies wrap the list as {"annotations": [...]}
        serde_json::Value::Object(mut obj) => match obj.remove("annotations") {
            Some(serde_json::Value::Array(items)) => items,
            _ => {
                return Err(Error::AnalysisError(
                    "response object has no annotations array".into(),
                ))
            }
        },
        other => {
            return Err(Error::AnalysisError(format!(
                "expected a JSON array, got {}",
                other
            )))
        }
    };

    let mut items = Vec::with_capacity(array.len());
    for (i, v) in array.into_iter().enumerate() {
        match serde_json::from_value::<AnalysisItem>(v) {
            Ok(item) => items.push(item),
            Err(e) => log::warn!("skipping malformed analysis item {}: {}", i, e),
        }
    }
    Ok(items)
}

// A missing, zero or non-finite fraction means "centre"; a result that rounds
// to zero also falls back to the centre.
fn place(raw: Option<f64>, fraction: Option<f64>, extent: u32) -> f32 {
    if let Some(px) = raw.filter(|v| v.is_finite()) {
        return px.round() as f32;
    }
    let extent = extent as f64;
    let f = fraction
        .filter(|v| v.is_finite() && *v != 0.0)
        .unwrap_or(0.5);
    let px = (f * extent).round();
    if px == 0.0 {
        (extent / 2.0).round() as f32
    } else {
        px as f32
    }
}

/// Turn model items into annotations on a `width` x `height` surface, each
/// with a fresh `ai-anno-` id.
pub fn normalize_items(items: &[AnalysisItem], width: u32, height: u32) -> Vec<Annotation> {
    items
        .iter()
        .map(|item| {
            let text = item
                .text
                .as_deref()
                .filter(|t| !t.is_empty())
                .unwrap_or(DEFAULT_ISSUE_TEXT);
            let kind = AnnotationKind::parse_or_default(item.kind.as_deref());
            let pos = item.position.unwrap_or_default();
            Annotation::new(
                next_id("ai-anno"),
                place(item.x, pos.x, width),
                place(item.y, pos.y, height),
                text,
                kind,
            )
        })
        .collect()
}

/// Sends a rendered screenshot to a generative model and returns annotations
pub struct ScreenshotAnalyzer<C: GenerativeClient> {
    client: C,
}

impl<C: GenerativeClient> ScreenshotAnalyzer<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn analyze_png(&self, png: &[u8], width: u32, height: u32) -> Result<Vec<Annotation>> {
        let width = if width == 0 { DEFAULT_WIDTH } else { width };
        let height = if height == 0 { DEFAULT_HEIGHT } else { height };
        let request = GenerateRequest::with_image(
            analysis_prompt(width, height),
            "image/png",
            STANDARD.encode(png),
        );
        let reply = self.client.generate(&request)?;
        let items = parse_analysis_response(&reply)?;
        log::info!("screenshot analysis returned {} issues", items.len());
        Ok(normalize_items(&items, width, height))
    }

    /// Same as [`analyze_png`](Self::analyze_png) for a `data:image/...;base64,` URL
    pub fn analyze_data_url(
        &self,
        data_url: &str,
        width: u32,
        height: u32,
    ) -> Result<Vec<Annotation>> {
        if !data_url.starts_with("data:image/") {
            return Err(Error::AnalysisError(
                "invalid image format, expected a base64 data URL".into(),
            ));
        }
        let bytes = crate::compositor::decode_data_url(data_url)?;
        self.analyze_png(&bytes, width, height)
    }
}
