//! Structural and style signals extracted from a fetched page

use crate::{CritiqueConfig, Error, Result};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::OnceLock;

/// One inline `style` attribute or one `<style>` block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StyleData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub element: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleInfo {
    pub inline_styles: Vec<StyleData>,
    pub stylesheet_urls: Vec<String>,
    pub color_palette: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutInfo {
    pub has_header: bool,
    pub has_footer: bool,
    pub has_navigation: bool,
    pub has_sidebar: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct UiComponents {
    pub buttons: usize,
    pub forms: usize,
    pub images: usize,
    pub videos: usize,
    pub carousels: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteAnalysis {
    pub url: String,
    pub body_text: String,
    pub style_info: StyleInfo,
    pub layout: LayoutInfo,
    pub ui_components: UiComponents,
}

static WHITESPACE: OnceLock<Option<Regex>> = OnceLock::new();
static COLOR: OnceLock<Option<Regex>> = OnceLock::new();

fn whitespace_re() -> Result<&'static Regex> {
    WHITESPACE
        .get_or_init(|| Regex::new(r"\s+").ok())
        .as_ref()
        .ok_or_else(|| Error::Other("whitespace pattern failed to compile".into()))
}

fn color_re() -> Result<&'static Regex> {
    COLOR
        .get_or_init(|| {
            Regex::new(
                r"(?i)#(?:[0-9a-f]{3}){1,2}\b|rgb\([\d,\s]+\)|rgba\([\d,\s.]+\)|hsl\([\d,\s%.]+\)|hsla\([\d,\s%.]+\)",
            )
            .ok()
        })
        .as_ref()
        .ok_or_else(|| Error::Other("colour pattern failed to compile".into()))
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| Error::Other(format!("invalid selector '{}': {:?}", css, e)))
}

fn count(doc: &Html, css: &str) -> Result<usize> {
    Ok(doc.select(&selector(css)?).count())
}

/// Colour tokens in `css`, added to `palette` in first-seen order
fn collect_colors(css: &str, seen: &mut HashSet<String>, palette: &mut Vec<String>) -> Result<()> {
    for m in color_re()?.find_iter(css) {
        let token = m.as_str().to_string();
        if seen.insert(token.clone()) {
            palette.push(token);
        }
    }
    Ok(())
}

fn resolve_href(base: Option<&url::Url>, href: &str) -> String {
    base.and_then(|b| b.join(href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| href.to_string())
}

impl SiteAnalysis {
    /// Extract signals from `html` served at `url`.
    ///
    /// Relative stylesheet hrefs are resolved against `url` when it parses.
    pub fn from_html(url: &str, html: &str, config: &CritiqueConfig) -> Result<Self> {
        let doc = Html::parse_document(html);
        let ws = whitespace_re()?;

        let raw_body: String = doc
            .select(&selector("body")?)
            .next()
            .map(|b| b.text().collect())
            .unwrap_or_default();
        let body_text: String = ws
            .replace_all(&raw_body, " ")
            .chars()
            .take(config.body_text_limit)
            .collect();

        let style_attr = selector("[style]")?;
        let style_tag = selector("style")?;
        let inline: Vec<ElementRef> = doc.select(&style_attr).collect();
        let blocks: Vec<String> = doc.select(&style_tag).map(|e| e.inner_html()).collect();

        let mut styles: Vec<StyleData> = inline
            .iter()
            .map(|el| StyleData {
                element: Some(el.value().name().to_uppercase()),
                class: Some(el.value().attr("class").unwrap_or_default().to_string()),
                style: el.value().attr("style").map(str::to_string),
                ..Default::default()
            })
            .collect();
        styles.extend(blocks.iter().map(|content| StyleData {
            kind: Some("style tag".into()),
            content: Some(content.clone()),
            ..Default::default()
        }));
        styles.truncate(config.inline_style_limit);

        let base = url::Url::parse(url).ok();
        let stylesheet_urls: Vec<String> = doc
            .select(&selector("link[rel='stylesheet']")?)
            .filter_map(|e| e.value().attr("href"))
            .filter(|h| !h.is_empty())
            .take(config.stylesheet_limit)
            .map(|h| resolve_href(base.as_ref(), h))
            .collect();

        let mut seen = HashSet::new();
        let mut palette = Vec::new();
        for block in &blocks {
            collect_colors(block, &mut seen, &mut palette)?;
        }
        for el in &inline {
            collect_colors(el.value().attr("style").unwrap_or_default(), &mut seen, &mut palette)?;
        }
        palette.truncate(config.palette_limit);

        let layout = LayoutInfo {
            has_header: count(&doc, "header")? > 0,
            has_footer: count(&doc, "footer")? > 0,
            has_navigation: count(&doc, "nav")? > 0,
            has_sidebar: count(&doc, ".sidebar, aside, [class*='sidebar']")? > 0,
        };
        let ui_components = UiComponents {
            buttons: count(&doc, "button, .btn, [class*='button']")?,
            forms: count(&doc, "form")?,
            images: count(&doc, "img")?,
            videos: count(&doc, "video, iframe[src*='youtube'], iframe[src*='vimeo']")?,
            carousels: count(
                &doc,
                "[class*='carousel'], [class*='slider'], [class*='slideshow']",
            )?,
        };

        Ok(Self {
            url: url.to_string(),
            body_text,
            style_info: StyleInfo {
                inline_styles: styles,
                stylesheet_urls,
                color_palette: palette,
            },
            layout,
            ui_components,
        })
    }
}

/// GET `url` and extract its signals
#[cfg(feature = "remote")]
pub fn fetch_site(url: &str, config: &CritiqueConfig) -> Result<SiteAnalysis> {
    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_millis(config.timeout_ms))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| Error::ConfigError(format!("Failed to build HTTP client: {}", e)))?;
    let html = client
        .get(url)
        .send()
        .and_then(|r| r.error_for_status())
        .map_err(|e| Error::NetworkError(format!("HTTP GET {} failed: {}", url, e)))?
        .text()
        .map_err(|e| Error::NetworkError(format!("Failed to read response body: {}", e)))?;
    log::info!("fetched {} ({} bytes)", url, html.len());
    SiteAnalysis::from_html(url, &html, config)
}
