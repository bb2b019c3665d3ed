//! Single-call LLM enrichment of extracted signals.

use std::collections::BTreeSet;
use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use serde::Deserialize;
use ytintel_core::{Insight, LanguageModel, SignalSet};

use crate::error::EnrichError;

/// Raw text beyond this many characters is cut from the prompt.
pub const MAX_RAW_TEXT_CHARS: usize = 6_000;
const MAX_THEMES: usize = 8;

/// An insight plus the provider-reported token usage, when known.
#[derive(Debug, Clone, PartialEq)]
pub struct Enrichment {
    pub insight: Insight,
    pub tokens_used: Option<u64>,
}

#[derive(Deserialize)]
struct InsightReply {
    #[serde(default)]
    summary: String,
    #[serde(default)]
    key_themes: Vec<String>,
    confidence: f64,
}

/// Wraps one [`LanguageModel`] call. Has no timeout of its own: callers
/// bound it and cancel it by dropping the future.
#[derive(Clone)]
pub struct InsightEnricher {
    model: Arc<dyn LanguageModel>,
    max_tokens: u32,
}

impl InsightEnricher {
    #[must_use]
    pub fn new(model: Arc<dyn LanguageModel>, max_tokens: u32) -> Self {
        Self { model, max_tokens }
    }

    #[must_use]
    pub fn model_id(&self) -> &str {
        self.model.model_id()
    }

    /// Token budget to reserve for `prompt`: about four characters per
    /// token in, plus the full completion allowance out.
    #[must_use]
    pub fn estimate_cost(&self, prompt: &str) -> u64 {
        let prompt_tokens = u64::try_from(prompt.chars().count() / 4).unwrap_or(u64::MAX);
        prompt_tokens.saturating_add(u64::from(self.max_tokens))
    }

    /// Send a prompt from [`build_prompt`] and parse the reply.
    ///
    /// Takes the prompt rather than its parts so the caller can price it
    /// with [`InsightEnricher::estimate_cost`] first.
    ///
    /// # Errors
    ///
    /// [`EnrichError::Rejected`] when the reply is not a usable insight,
    /// otherwise the model's own failure.
    pub async fn enrich(&self, prompt: &str) -> Result<Enrichment, EnrichError> {
        let completion = self.model.complete(prompt).await?;
        let insight = parse_reply(&completion.text, self.model.model_id())?;
        Ok(Enrichment {
            insight,
            tokens_used: completion.tokens_used,
        })
    }
}

#[must_use]
pub fn build_prompt(title: &str, signals: &SignalSet, raw_text: &str) -> String {
    let mut prompt = String::with_capacity(MAX_RAW_TEXT_CHARS + 1_024);
    prompt.push_str(
        "You are analysing audience reaction to a YouTube video. \
         Using the signals and text below, reply with only a JSON object of the form \
         {\"summary\": string, \"key_themes\": [string], \"confidence\": number between 0 and 1}.\n\n",
    );
    let _ = writeln!(prompt, "Title: {title}");
    let _ = writeln!(prompt, "Category: {}", signals.category);
    let _ = writeln!(prompt, "Sentiment: {:.3}", signals.sentiment_score);
    let _ = writeln!(prompt, "Subjectivity: {:.3}", signals.subjectivity_score);
    let _ = writeln!(prompt, "Engagement rate: {:.4}", signals.engagement_rate);

    let keywords: Vec<&str> = signals
        .top_keywords
        .iter()
        .map(|(term, _)| term.as_str())
        .collect();
    let _ = writeln!(prompt, "Top keywords: {}", keywords.join(", "));

    prompt.push_str("\nText:\n");
    prompt.extend(raw_text.chars().take(MAX_RAW_TEXT_CHARS));
    prompt.push('\n');
    prompt
}

/// Parse the first JSON object in `text` into an [`Insight`].
///
/// # Errors
///
/// [`EnrichError::Rejected`] for missing or invalid JSON, an empty summary,
/// or a non-finite confidence.
pub fn parse_reply(text: &str, model_id: &str) -> Result<Insight, EnrichError> {
    let object = first_json_object(text)
        .ok_or_else(|| EnrichError::Rejected("reply contains no JSON object".to_owned()))?;
    let reply: InsightReply = serde_json::from_str(object)
        .map_err(|e| EnrichError::Rejected(format!("invalid insight JSON: {e}")))?;

    let summary = reply.summary.trim();
    if summary.is_empty() {
        return Err(EnrichError::Rejected("empty summary".to_owned()));
    }
    if !reply.confidence.is_finite() {
        return Err(EnrichError::Rejected("non-finite confidence".to_owned()));
    }

    let mut key_themes = BTreeSet::new();
    for theme in reply.key_themes {
        if key_themes.len() == MAX_THEMES {
            break;
        }
        let theme = theme.trim().to_lowercase();
        if !theme.is_empty() {
            key_themes.insert(theme);
        }
    }

    Ok(Insight {
        summary: summary.to_owned(),
        key_themes,
        confidence: reply.confidence.clamp(0.0, 1.0),
        model_id: model_id.to_owned(),
        generated_at: Utc::now(),
    })
}

/// Slice of the first balanced `{ ... }` block, skipping braces in strings.
fn first_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=start + offset]);
                }
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use ytintel_core::{Completion, LlmError, VideoCategory};

    use super::*;

    struct CannedModel(Result<Completion, LlmError>);

    #[async_trait]
    impl LanguageModel for CannedModel {
        async fn complete(&self, _prompt: &str) -> Result<Completion, LlmError> {
            self.0.clone()
        }

        fn model_id(&self) -> &str {
            "canned-1"
        }
    }

    fn signals() -> SignalSet {
        SignalSet {
            sentiment_score: 0.42,
            subjectivity_score: 0.6,
            top_keywords: vec![("sourdough".into(), 0.2), ("starter".into(), 0.1)],
            engagement_rate: 0.1,
            category: VideoCategory::Education,
        }
    }

    #[test]
    fn prompt_includes_signals_and_truncates_text() {
        let long = "~".repeat(MAX_RAW_TEXT_CHARS + 500);
        let prompt = build_prompt("Bread basics", &signals(), &long);
        assert!(prompt.contains("Title: Bread basics"));
        assert!(prompt.contains("Category: education"));
        assert!(prompt.contains("Sentiment: 0.420"));
        assert!(prompt.contains("Top keywords: sourdough, starter"));
        assert_eq!(prompt.matches('~').count(), MAX_RAW_TEXT_CHARS);
    }

    #[test]
    fn parses_fenced_reply() {
        let reply = "Here you go:\n```json\n{\"summary\": \"Viewers love the {simple} method\", \
                     \"key_themes\": [\" Baking \", \"baking\", \"patience\"], \"confidence\": 0.8}\n```";
        let insight = parse_reply(reply, "m").unwrap();
        assert_eq!(insight.summary, "Viewers love the {simple} method");
        assert_eq!(
            insight.key_themes.into_iter().collect::<Vec<_>>(),
            vec!["baking", "patience"]
        );
        assert!((insight.confidence - 0.8).abs() < f64::EPSILON);
        assert_eq!(insight.model_id, "m");
    }

    #[test]
    fn confidence_is_clamped() {
        let insight =
            parse_reply(r#"{"summary":"ok","key_themes":[],"confidence":4.5}"#, "m").unwrap();
        assert!((insight.confidence - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn themes_are_capped() {
        let themes: Vec<String> = (0..20).map(|i| format!("\"t{i}\"")).collect();
        let reply = format!(
            r#"{{"summary":"ok","key_themes":[{}],"confidence":0.5}}"#,
            themes.join(",")
        );
        assert_eq!(parse_reply(&reply, "m").unwrap().key_themes.len(), MAX_THEMES);
    }

    #[test]
    fn rejects_empty_summary_and_missing_json() {
        assert!(matches!(
            parse_reply(r#"{"summary":"  ","confidence":0.5}"#, "m"),
            Err(EnrichError::Rejected(_))
        ));
        assert!(matches!(
            parse_reply("I cannot help with that.", "m"),
            Err(EnrichError::Rejected(_))
        ));
        assert!(matches!(
            parse_reply(r#"{"summary":"ok"}"#, "m"),
            Err(EnrichError::Rejected(_))
        ));
    }

    #[test]
    fn estimate_counts_prompt_and_completion() {
        let enricher = InsightEnricher::new(
            Arc::new(CannedModel(Err(LlmError::Timeout))),
            1_024,
        );
        assert_eq!(enricher.estimate_cost(&"a".repeat(400)), 100 + 1_024);
    }

    #[tokio::test]
    async fn enrich_returns_insight_and_usage() {
        let model = CannedModel(Ok(Completion {
            text: r#"{"summary":"Warm reception","key_themes":["bread"],"confidence":0.7}"#.into(),
            tokens_used: Some(321),
        }));
        let enricher = InsightEnricher::new(Arc::new(model), 256);
        let out = enricher
            .enrich(&build_prompt("Bread basics", &signals(), "great video"))
            .await
            .unwrap();
        assert_eq!(out.insight.summary, "Warm reception");
        assert_eq!(out.insight.model_id, "canned-1");
        assert_eq!(out.tokens_used, Some(321));
    }

    #[tokio::test]
    async fn model_failure_propagates() {
        let enricher = InsightEnricher::new(
            Arc::new(CannedModel(Err(LlmError::Timeout))),
            256,
        );
        let err = enricher
            .enrich(&build_prompt("t", &signals(), ""))
            .await
            .unwrap_err();
        assert_eq!(err, EnrichError::Timeout);
    }
}
