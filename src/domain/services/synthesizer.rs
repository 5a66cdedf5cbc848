#[cfg(test)]
#[path = "synthesizer_test.rs"]
mod tests;

use super::images;
use crate::domain::models::ChatRequest;
use crate::domain::models::ConversationMessage;
use crate::domain::models::GatewayBox;
use crate::domain::models::PipelineError;
use crate::infrastructure::gateway::extract;

pub struct SynthesizedImage {
    /// Data URI or http(s) URL, exactly as the provider returned it.
    pub image: String,
    pub model: String,
}

fn enhance_prompt(prompt: &str) -> String {
    return format!(
        r#"Generate an image: Create a professional academic figure with the following specifications:

{prompt}

Important requirements:
- Use a clean white or very light gray background
- Ensure all text is crisp, readable, and properly spelled
- Use professional academic styling suitable for publication
- Maintain clear visual hierarchy and alignment
- Use consistent color scheme throughout
- Make sure arrows and connections are clear and properly directed"#
    );
}

/// Turns a prompt into an image. A reply that carries text instead of image
/// data is a `NoImageReturned`, distinct from upstream failures, so the
/// caller can retry with another model.
pub async fn generate(
    gateway: &GatewayBox,
    prompt: &str,
    model: &str,
    temperature: f64,
) -> Result<SynthesizedImage, PipelineError> {
    if prompt.trim().is_empty() {
        return Err(PipelineError::MissingInput("prompt"));
    }

    let request = ChatRequest::new(
        model,
        vec![ConversationMessage::user(&enhance_prompt(prompt))],
    )
    .with_temperature(temperature);

    let reply = gateway.complete(request).await?;

    if let Some(image) = extract::extract_image(&reply) {
        let image = images::normalize_data_uri(&image);
        // A reply can carry a non-image payload in an image slot; treat it
        // the same as no image at all.
        if images::looks_like_image(&image) {
            tracing::debug!(model = model, "image synthesized");
            return Ok(SynthesizedImage {
                image,
                model: model.to_string(),
            });
        }
    }

    tracing::warn!(model = model, "reply carried no image data");
    return Err(PipelineError::NoImageReturned {
        text_response: reply.content_text(),
    });
}
