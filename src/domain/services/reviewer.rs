#[cfg(test)]
#[path = "reviewer_test.rs"]
mod tests;

use once_cell::sync::Lazy;
use regex::Regex;

use super::images;
use crate::domain::models::ChatRequest;
use crate::domain::models::ConversationMessage;
use crate::domain::models::GatewayBox;
use crate::domain::models::PipelineError;
use crate::domain::models::PublicationReadiness;
use crate::domain::models::ReviewResult;
use crate::domain::models::Scores;

const SYSTEM_PROMPT: &str = r#"You are a senior academic reviewer evaluating figures for publication in top-tier venues. You have extremely high standards and provide thorough, constructive evaluations.

Your evaluation should assess the figure against publication standards expected at venues like NeurIPS, ICML, Nature, Science, or similar top-tier publications."#;

fn build_user_message(original_task: &str, total_iterations: usize) -> String {
    return format!(
        r#"**FINAL IMAGE REVIEW**

This is the final version of an academic figure after {total_iterations} iteration(s) of refinement. Please provide a comprehensive evaluation.

**Original Task:**
{original_task}

Please evaluate this final image based on the following criteria:

## Evaluation Criteria

### 1. Requirements Fulfillment (Does it meet all the user's requirements?)
- Check if all requested components are present
- Verify the figure accurately represents the described concept
- Ensure all specific requests from the original task are addressed

### 2. Academic Rigor and Professionalism
- Is the figure suitable for publication in a top-tier academic venue?
- Does it follow academic conventions for the field?
- Is the visual style professional and consistent?

### 3. Accuracy and Correctness
- Are all labels, text, and terminology correct?
- Are any equations or mathematical notation accurate and complete?
- Are there any spelling errors or inconsistencies?

### 4. Visual Clarity and Reader-Friendliness
- Can a reader understand the figure at a glance?
- Is the visual hierarchy clear?
- Is the color scheme effective and accessible?
- Is the layout well-organized and balanced?

## Output Format

Please provide your evaluation in the following format:

### Overall Assessment
[Brief 2-3 sentence summary]

### Scores (1-10)
- Requirements Fulfillment: X/10
- Academic Rigor: X/10
- Accuracy: X/10
- Visual Clarity: X/10
- **Overall Score: X/10**

### Strengths
[Bullet points of what works well]

### Areas for Improvement
[Bullet points of what could be better]

### Specific Recommendations
[Concrete, actionable suggestions for further improvement if needed]

### Publication Readiness
[State whether the figure is ready for publication as-is, needs minor revisions, or needs major revisions]"#
    );
}

// Scores arrive in free text in formats like "9/10", "**9/10**", "9 / 10",
// "**9**/10". Each label is scanned independently; the first match wins.
static SCORE_PATTERNS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    return vec![
        (
            "requirements",
            Regex::new(r"(?i)Requirements\s*Fulfillment[:\s]*\**(\d+(?:\.\d+)?)\**\s*/\s*10")
                .unwrap(),
        ),
        (
            "rigor",
            Regex::new(r"(?i)Academic\s*Rigor[:\s]*\**(\d+(?:\.\d+)?)\**\s*/\s*10").unwrap(),
        ),
        (
            "accuracy",
            Regex::new(r"(?i)Accuracy[:\s]*\**(\d+(?:\.\d+)?)\**\s*/\s*10").unwrap(),
        ),
        (
            "clarity",
            Regex::new(r"(?i)Visual\s*Clarity[:\s]*\**(\d+(?:\.\d+)?)\**\s*/\s*10").unwrap(),
        ),
        (
            "overall",
            Regex::new(r"(?i)Overall\s*Score[:\s]*\**(\d+(?:\.\d+)?)\**\s*/\s*10").unwrap(),
        ),
    ];
});

/// Best-effort score extraction. A label that never appears yields an
/// absent score, not an error.
pub fn extract_scores(review_text: &str) -> Scores {
    let mut scores = Scores::default();

    for (key, pattern) in SCORE_PATTERNS.iter() {
        let value = pattern
            .captures(review_text)
            .and_then(|caps| return caps.get(1))
            .and_then(|m| return m.as_str().parse::<f64>().ok());

        match *key {
            "requirements" => scores.requirements = value,
            "rigor" => scores.rigor = value,
            "accuracy" => scores.accuracy = value,
            "clarity" => scores.clarity = value,
            "overall" => scores.overall = value,
            _ => {}
        }
    }

    return scores;
}

/// Ordered phrase scan; the first phrase found decides.
pub fn extract_readiness(review_text: &str) -> PublicationReadiness {
    let lowered = review_text.to_lowercase();

    if lowered.contains("ready for publication as-is") {
        return PublicationReadiness::Ready;
    }
    if lowered.contains("minor revisions") {
        return PublicationReadiness::MinorRevisions;
    }
    if lowered.contains("major revisions") {
        return PublicationReadiness::MajorRevisions;
    }

    return PublicationReadiness::Unknown;
}

/// Scores a final image against the publication rubric.
pub async fn review(
    gateway: &GatewayBox,
    image: &str,
    original_task: &str,
    total_iterations: usize,
    model: &str,
) -> Result<ReviewResult, PipelineError> {
    if image.trim().is_empty() {
        return Err(PipelineError::MissingInput("imageBase64"));
    }

    let request = ChatRequest::new(
        model,
        vec![
            ConversationMessage::system(SYSTEM_PROMPT),
            ConversationMessage::user_with_image(
                &build_user_message(original_task, total_iterations),
                &images::normalize_data_uri(image),
            ),
        ],
    )
    .with_temperature(0.3)
    .with_max_tokens(3000);

    let reply = gateway.complete(request).await?;
    let review_text = reply.content_text().ok_or(PipelineError::EmptyReply)?;

    let scores = extract_scores(&review_text);
    let publication_readiness = extract_readiness(&review_text);

    tracing::debug!(
        model = model,
        overall = scores.overall,
        readiness = %publication_readiness,
        "review complete"
    );

    return Ok(ReviewResult {
        scores,
        publication_readiness,
        review_text,
        model: model.to_string(),
    });
}
