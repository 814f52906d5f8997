//! UX critique pipeline: page signals -> prompt -> model -> structured report

pub mod client;
pub mod report;
pub mod site;

pub use client::{GenerateRequest, GenerativeClient};
#[cfg(feature = "remote")]
pub use client::GeminiClient;
pub use report::{coerce_report, critique_prompt, CritiqueReport, Priority};
pub use site::SiteAnalysis;

use crate::{CritiqueConfig, Result};

pub struct Critic<C: GenerativeClient> {
    client: C,
    config: CritiqueConfig,
}

impl<C: GenerativeClient> Critic<C> {
    pub fn new(client: C, config: CritiqueConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &CritiqueConfig {
        &self.config
    }

    /// Critique already-extracted signals
    pub fn critique_analysis(&self, analysis: &SiteAnalysis) -> Result<CritiqueReport> {
        let prompt = critique_prompt(analysis)?;
        let reply = self.client.generate(&GenerateRequest::text(prompt))?;
        log::info!("critique for {} received ({} chars)", analysis.url, reply.len());
        Ok(coerce_report(&reply))
    }

    /// Critique a page whose HTML the caller already has
    pub fn critique_html(&self, url: &str, html: &str) -> Result<CritiqueReport> {
        let analysis = SiteAnalysis::from_html(url, html, &self.config)?;
        self.critique_analysis(&analysis)
    }

    /// Fetch `url` and critique it
    #[cfg(feature = "remote")]
    pub fn critique_url(&self, url: &str) -> Result<CritiqueReport> {
        let analysis = site::fetch_site(url, &self.config)?;
        self.critique_analysis(&analysis)
    }
}
