use crate::analysis::strip_code_fence;
use crate::critique::site::SiteAnalysis;
use crate::Result;
use serde::{Deserialize, Serialize};

const SEE_FULL_ANALYSIS: &str = "See full analysis";
const FALLBACK_SCORE: f64 = 7.0;
const FALLBACK_SUMMARY_CHARS: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", from = "String")]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl From<String> for Priority {
    fn from(s: String) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "high" => Priority::High,
            "low" => Priority::Low,
            _ => Priority::Medium,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CategoryScores {
    pub user_experience: f64,
    pub visual_design: f64,
    pub performance: f64,
    pub accessibility: f64,
    pub conversion: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Strength {
    pub title: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Improvement {
    pub title: String,
    pub description: String,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DetailedAnalysis {
    pub homepage_effectiveness: String,
    pub brand_clarity: String,
    pub usability_issues: String,
    pub mobile_experience: String,
    pub checkout_process: String,
    pub color_scheme: String,
}

/// Structured UX critique of one site
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CritiqueReport {
    pub overall_score: f64,
    pub summary: String,
    pub category_scores: CategoryScores,
    pub strengths: Vec<Strength>,
    pub improvements: Vec<Improvement>,
    pub detailed_analysis: DetailedAnalysis,
    pub actionable_recommendations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_feedback: Option<String>,
}

impl CritiqueReport {
    /// Report used when the model reply cannot be parsed; keeps the reply as
    /// raw feedback.
    pub fn fallback(reply: &str) -> Self {
        let head: String = reply.chars().take(FALLBACK_SUMMARY_CHARS).collect();
        let see = || SEE_FULL_ANALYSIS.to_string();
        Self {
            overall_score: FALLBACK_SCORE,
            summary: format!("{}...", head),
            category_scores: CategoryScores {
                user_experience: FALLBACK_SCORE,
                visual_design: FALLBACK_SCORE,
                performance: FALLBACK_SCORE,
                accessibility: FALLBACK_SCORE,
                conversion: FALLBACK_SCORE,
            },
            strengths: vec![Strength {
                title: "Analysis Available".into(),
                description: "The full analysis is available as unstructured text. Please check the detailed feedback.".into(),
            }],
            improvements: vec![Improvement {
                title: "Parsing Error".into(),
                description: "The structured data couldn't be parsed correctly. The raw analysis is still available.".into(),
                priority: Priority::Medium,
            }],
            detailed_analysis: DetailedAnalysis {
                homepage_effectiveness: see(),
                brand_clarity: see(),
                usability_issues: see(),
                mobile_experience: see(),
                checkout_process: see(),
                color_scheme: see(),
            },
            actionable_recommendations: vec![see()],
            raw_feedback: Some(reply.to_string()),
        }
    }
}

/// Turn a model reply into a report. Never fails: unparseable replies yield
/// [`CritiqueReport::fallback`].
pub fn coerce_report(reply: &str) -> CritiqueReport {
    let body = strip_code_fence(reply).trim();
    match serde_json::from_str::<CritiqueReport>(body) {
        Ok(mut report) => {
            if report.raw_feedback.as_deref().map_or(true, str::is_empty) {
                report.raw_feedback = Some(body.to_string());
            }
            report
        }
        Err(e) => {
            log::warn!("critique reply is not valid report JSON ({}), using fallback", e);
            CritiqueReport::fallback(body)
        }
    }
}

pub fn critique_prompt(analysis: &SiteAnalysis) -> Result<String> {
    let data = serde_json::to_string_pretty(analysis)?;
    Ok(format!(
        r#"
You are a world-class UX consultant providing detailed analysis of online storefronts.
Analyze the provided data about this store and generate a comprehensive report in a structured JSON format.

You need to:
1. Assess how well the site follows UX best practices
2. Evaluate visual design, layout and usability
3. Identify strengths and areas for improvement
4. Assign specific scores on a scale of 1-10 for different aspects of the site
5. Provide clear, actionable recommendations

Return ONLY valid JSON, with no code fences or other formatting, in exactly this shape:

{{
  "overallScore": <number between 1-10 with one decimal point>,
  "summary": "<brief executive summary of the analysis - about 150 words>",
  "categoryScores": {{
    "userExperience": <score from 1-10>,
    "visualDesign": <score from 1-10>,
    "performance": <score from 1-10>,
    "accessibility": <score from 1-10>,
    "conversion": <score from 1-10>
  }},
  "strengths": [
    {{ "title": "<strength title>", "description": "<brief description>" }}
  ],
  "improvements": [
    {{ "title": "<improvement area title>", "description": "<brief description>", "priority": "<high|medium|low>" }}
  ],
  "detailedAnalysis": {{
    "homepageEffectiveness": "<analysis of homepage>",
    "brandClarity": "<analysis of brand messaging>",
    "usabilityIssues": "<potential friction points>",
    "mobileExperience": "<assessment of mobile-friendliness>",
    "checkoutProcess": "<analysis of checkout if detectable>",
    "colorScheme": "<analysis of color palette and visual hierarchy>"
  }},
  "actionableRecommendations": ["<specific recommendation>"]
}}

Give 3-5 strengths, improvements and recommendations. Keep textual fields detailed but concise and score values realistic.

Site Analysis Data:
{}
"#,
        data
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPLY: &str = r#"{
        "overallScore": 7.8,
        "summary": "Solid store.",
        "categoryScores": {"userExperience": 8, "visualDesign": 7.5, "performance": 6, "accessibility": 5, "conversion": 8},
        "strengths": [{"title": "Clear nav", "description": "Easy to move around"}],
        "improvements": [{"title": "Contrast", "description": "Grey on grey", "priority": "HIGH"}],
        "detailedAnalysis": {"homepageEffectiveness": "Good", "brandClarity": "Clear", "usabilityIssues": "Few",
            "mobileExperience": "Fine", "checkoutProcess": "Unknown", "colorScheme": "Muted"},
        "actionableRecommendations": ["Raise contrast"]
    }"#;

    #[test]
    fn parses_plain_reply_and_keeps_raw_text() {
        let r = coerce_report(REPLY);
        assert_eq!(r.overall_score, 7.8);
        assert_eq!(r.category_scores.visual_design, 7.5);
        assert_eq!(r.improvements[0].priority, Priority::High);
        assert_eq!(r.raw_feedback.as_deref(), Some(REPLY.trim()));
    }

    #[test]
    fn strips_fences() {
        let fenced = format!("```json\n{}\n```", REPLY);
        let r = coerce_report(&fenced);
        assert_eq!(r.summary, "Solid store.");
        assert!(!r.raw_feedback.unwrap().contains("```"));
    }

    #[test]
    fn garbage_falls_back() {
        let text = "x".repeat(400);
        let r = coerce_report(&text);
        assert_eq!(r.overall_score, 7.0);
        assert_eq!(r.category_scores.conversion, 7.0);
        assert_eq!(r.summary.len(), 303);
        assert!(r.summary.ends_with("..."));
        assert_eq!(r.improvements[0].title, "Parsing Error");
        assert_eq!(r.improvements[0].priority, Priority::Medium);
        assert_eq!(r.detailed_analysis.color_scheme, "See full analysis");
        assert_eq!(r.raw_feedback.as_deref(), Some(text.as_str()));
    }

    #[test]
    fn serializes_camel_case() {
        let v = serde_json::to_value(CritiqueReport::fallback("oops")).unwrap();
        assert_eq!(v["overallScore"], 7.0);
        assert_eq!(v["categoryScores"]["userExperience"], 7.0);
        assert_eq!(v["improvements"][0]["priority"], "medium");
        assert_eq!(v["rawFeedback"], "oops");
    }

    #[test]
    fn prompt_embeds_pretty_analysis() {
        let analysis = SiteAnalysis {
            url: "https://shop.test".into(),
            ..Default::default()
        };
        let p = critique_prompt(&analysis).unwrap();
        assert!(p.contains("\"url\": \"https://shop.test\""));
        assert!(p.contains("\"overallScore\""));
    }
}
