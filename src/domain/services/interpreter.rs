#[cfg(test)]
#[path = "interpreter_test.rs"]
mod tests;

use crate::domain::models::ChatRequest;
use crate::domain::models::ConversationMessage;
use crate::domain::models::GatewayBox;
use crate::domain::models::PipelineError;

const SYSTEM_PROMPT: &str = r#"You are an expert at creating detailed, professional prompts for academic image generation. Your task is to take a user's high-level description of an academic figure they want to create, and transform it into a comprehensive, detailed prompt that an image generation model can use to create a publication-quality figure.

Your prompts should be:
1. **Rigorous and Professional**: Use precise terminology, proper formatting, and academic standards
2. **Detailed**: Specify exact layouts, components, colors, typography, and visual hierarchies
3. **Structured**: Organize the prompt with clear sections (Layout, Components, Styling, etc.)
4. **Implementation-aware**: If code is provided, extract specific class names, function names, data flows, and relationships to ensure accuracy

Guidelines for the output prompt:
- Describe the overall layout (horizontal/vertical flow, grid structure)
- List each component with exact labels, positions, and connections
- Specify color schemes (use professional academic colors: blues, grays, with accent colors for emphasis)
- Include typography requirements (clean, readable, professional fonts)
- Describe arrows, connections, and data flow directions
- Highlight key innovations or important elements that should stand out
- Request a clean, minimalist style suitable for academic publications
- Specify any mathematical notation or equations that should appear"#;

pub struct Interpretation {
    pub prompt: String,
    pub conversation_history: Vec<ConversationMessage>,
}

fn build_user_message(task_description: &str, code_content: Option<&str>) -> String {
    let mut message = format!(
        "Please create a detailed image generation prompt for the following academic figure:\n\n**Task Description:**\n{task_description}"
    );

    if let Some(code) = code_content {
        if !code.trim().is_empty() {
            message += &format!(
                "\n\n**Related Code (for context and accuracy):**\n```\n{code}\n```\n\nPlease analyze the code to extract:\n- Specific component/class/function names\n- Data flow and relationships\n- Key algorithms or processes\n- Any specific terminology used\n\nUse these details to make the prompt accurate and aligned with the actual implementation."
            );
        }
    }

    message += "\n\nPlease generate a comprehensive, detailed prompt that an image generation model can use to create this figure. The prompt should be self-contained and include all necessary details for creating a professional, publication-ready academic figure.";

    return message;
}

/// Turns a free-text task description (plus optional source code) into a
/// detailed image-generation prompt.
pub async fn interpret(
    gateway: &GatewayBox,
    task_description: &str,
    code_content: Option<&str>,
    model: &str,
) -> Result<Interpretation, PipelineError> {
    if task_description.trim().is_empty() {
        return Err(PipelineError::MissingInput("taskDescription"));
    }

    let user_message = build_user_message(task_description, code_content);
    let messages = vec![
        ConversationMessage::system(SYSTEM_PROMPT),
        ConversationMessage::user(&user_message),
    ];

    let request = ChatRequest::new(model, messages.clone())
        .with_temperature(0.7)
        .with_max_tokens(4000);

    let reply = gateway.complete(request).await?;
    let prompt = reply.content_text().ok_or(PipelineError::EmptyReply)?;

    let mut conversation_history = messages;
    conversation_history.push(ConversationMessage::assistant(&prompt));

    tracing::debug!(model = model, prompt_chars = prompt.len(), "interpreted task");

    return Ok(Interpretation {
        prompt,
        conversation_history,
    });
}
