#[cfg(test)]
#[path = "supervisor_test.rs"]
mod tests;

use super::images;
use crate::domain::models::ChatRequest;
use crate::domain::models::ConversationMessage;
use crate::domain::models::GatewayBox;
use crate::domain::models::Inventory;
use crate::domain::models::PipelineError;

const PHASE_A_SYSTEM_PROMPT: &str = r#"You are an expert academic figure supervisor with extremely high standards for publication-quality visuals. Your task in this phase is to build a complete structural inventory of the figure you are shown.

**CRITICAL: You must be PROACTIVE in finding errors.** Assume there ARE errors until proven otherwise. Examine every single piece of text, every label, every equation, every arrow, every color choice.

You MUST check for these common issues:

TEXT & LABELS: spelling errors, inconsistent terminology, missing or duplicate labels, text too small or blurry, labels that contradict the task description.
MATHEMATICAL NOTATION: incomplete equations, wrong symbols, inconsistent notation, formulas that do not match the task.
VISUAL ELEMENTS: arrows pointing the wrong way, missing connections, inconsistent color coding, poor hierarchy, overlapping or misaligned elements.
ACCURACY: components that do not match the described architecture, missing phases or steps, incorrect flow or sequence.

Respond with a single JSON object and NOTHING else. The exact shape:

{
  "coordinate_system": "percentage of image dimensions, origin top-left, x 0-100 rightward, y 0-100 downward",
  "blocks": [
    {
      "id": "block_1",
      "name": "visible label or short description",
      "position": {"x_range": [x1, x2], "y_range": [y1, y2], "center": [cx, cy]},
      "style": "fill, border, shape notes",
      "content": ["each line of text inside the block"],
      "sub_elements": null,
      "status": "CORRECT" or "NEEDS_FIX",
      "issues": ["one entry per problem; empty when status is CORRECT"]
    }
  ],
  "connections": [
    {
      "id": "conn_1",
      "type": "arrow | line | bracket",
      "from": {"element_id": "block_1", "position": {"center": [x, y]}},
      "to": {"element_id": "block_2", "position": {"center": [x, y]}},
      "style": "stroke notes",
      "label": "edge label or null",
      "status": "CORRECT" or "NEEDS_FIX",
      "issues": []
    }
  ],
  "text_elements": [
    {
      "id": "text_1",
      "content": "standalone text not inside a block",
      "position": {"center": [x, y]},
      "orientation": "horizontal | vertical",
      "style": "font notes",
      "status": "CORRECT" or "NEEDS_FIX",
      "issues": []
    }
  ],
  "background": {"color": "what the background actually is"},
  "summary": {"total_blocks": 0, "total_connections": 0, "total_text_elements": 0, "needs_fix": 0}
}

Every element with status NEEDS_FIX must carry at least one issue. Every CORRECT element must carry none."#;

const PHASE_B_SYSTEM_PROMPT: &str = r#"You are an expert academic figure supervisor. You are given a structural inventory of a generated figure plus the user's feedback, and you must produce the refinement instructions for the next image generation pass.

**The image generation model cannot interpret coordinates, percentages, or element ids.** Never reference them in your output. Name elements by their visible labels and approximate locations in plain words ("the top-left box labeled 'Encoder'", "the arrow between 'Encoder' and 'Decoder'").

Your output must contain exactly these four sections:

1. **User Feedback** - address every point from the user's feedback, one bullet each, stating the concrete change it translates to.
2. **Supervisor Findings** - every NEEDS_FIX issue from the inventory the user did not mention. Be thorough, the user's feedback is a starting point, not a complete list.
3. **Modifications** - the full itemized list of changes for the next pass, combining both sections above. Prefix the most important ones with **CRITICAL:**. Specify exactly what corrected text, labels, and equations should say.
4. **Do Not Change** - explicitly list every region that is correct and must be preserved. Under-specifying this section risks the image model silently altering correct regions.

Begin your reply with "Refine this academic figure with the following corrections:" and keep it self-contained so it can be fed to the image model directly."#;

pub struct Supervision {
    /// Exactly Phase B's text output, handed to the synthesizer untouched.
    pub refinement_prompt: String,
    pub inventory: Inventory,
    pub phase_a_raw: String,
    pub phase_b_raw: String,
    pub conversation_history: Vec<ConversationMessage>,
}

type ParseStrategy = fn(&str) -> Option<Inventory>;

// Direct parse first, then the fenced-block and brace-span recoveries for
// models that wrap their JSON in prose.
const PARSE_STRATEGIES: [(&str, ParseStrategy); 3] = [
    ("direct", parse_direct),
    ("fenced-block", parse_fenced_block),
    ("brace-span", parse_brace_span),
];

fn parse_direct(text: &str) -> Option<Inventory> {
    return serde_json::from_str::<Inventory>(text.trim()).ok();
}

fn parse_fenced_block(text: &str) -> Option<Inventory> {
    let mut current_block: Vec<&str> = vec![];
    let mut in_block = false;

    for line in text.split('\n') {
        if line.trim().starts_with("```") {
            if in_block {
                if let Some(inventory) = parse_direct(&current_block.join("\n")) {
                    return Some(inventory);
                }
                current_block = vec![];
                in_block = false;
            } else {
                in_block = true;
            }
            continue;
        }

        if in_block {
            current_block.push(line);
        }
    }

    return None;
}

fn parse_brace_span(text: &str) -> Option<Inventory> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }

    return parse_direct(&text[start..=end]);
}

/// Recovers the inventory from a Phase A reply. First strategy that yields
/// valid JSON wins; none succeeding means Phase B cannot run.
pub fn parse_inventory(text: &str) -> Result<Inventory, PipelineError> {
    for (name, strategy) in PARSE_STRATEGIES {
        if let Some(mut inventory) = strategy(text) {
            tracing::debug!(strategy = name, elements = inventory.element_count(), "inventory parsed");
            inventory.normalize();
            return Ok(inventory);
        }
    }

    return Err(PipelineError::MalformedInventory {
        details: "no parse strategy yielded valid inventory JSON".to_string(),
    });
}

/// Phase A: catalog the image's visual elements with positions and
/// correctness flags.
pub async fn analyze_structure(
    gateway: &GatewayBox,
    image: &str,
    original_task: &str,
    model: &str,
) -> Result<(Inventory, String), PipelineError> {
    if image.trim().is_empty() {
        return Err(PipelineError::MissingInput("imageBase64"));
    }

    let user_text = format!(
        "**Structural Analysis Request**\n\nCatalog every visual element of this generated academic figure, with positions in percentage coordinates and a correctness verdict per element.\n\n**Original Task:**\n{original_task}"
    );

    let request = ChatRequest::new(
        model,
        vec![
            ConversationMessage::system(PHASE_A_SYSTEM_PROMPT),
            ConversationMessage::user_with_image(&user_text, &images::normalize_data_uri(image)),
        ],
    )
    .with_temperature(0.3)
    .with_max_tokens(4000);

    let reply = gateway.complete(request).await?;
    let raw = reply.content_text().ok_or(PipelineError::EmptyReply)?;
    let inventory = parse_inventory(&raw)?;

    return Ok((inventory, raw));
}

/// Phase B: turn the inventory plus user feedback into natural-language
/// refinement instructions.
pub async fn generate_operations(
    gateway: &GatewayBox,
    inventory: &Inventory,
    user_feedback: &str,
    original_task: &str,
    iteration: usize,
    model: &str,
) -> Result<String, PipelineError> {
    let serialized = serde_json::to_string_pretty(inventory).map_err(|err| {
        return PipelineError::MalformedInventory {
            details: err.to_string(),
        };
    })?;

    let feedback = if user_feedback.trim().is_empty() {
        "No specific feedback provided - rely on the inventory findings."
    } else {
        user_feedback
    };

    let user_text = format!(
        "**Iteration {iteration} - Refinement Request**\n\n**Original Task:**\n{original_task}\n\n**Structural Inventory:**\n```json\n{serialized}\n```\n\n**User Feedback:**\n{feedback}"
    );

    let request = ChatRequest::new(
        model,
        vec![
            ConversationMessage::system(PHASE_B_SYSTEM_PROMPT),
            ConversationMessage::user(&user_text),
        ],
    )
    .with_temperature(0.5)
    .with_max_tokens(4000);

    let reply = gateway.complete(request).await?;

    return reply.content_text().ok_or(PipelineError::EmptyReply);
}

/// Runs both phases in order. A failed Phase A is terminal: no partial
/// result reaches Phase B.
pub async fn supervise(
    gateway: &GatewayBox,
    image: &str,
    user_feedback: &str,
    history: &[ConversationMessage],
    original_task: &str,
    iteration: usize,
    model: &str,
) -> Result<Supervision, PipelineError> {
    let (inventory, phase_a_raw) = analyze_structure(gateway, image, original_task, model).await?;

    let phase_b_raw = generate_operations(
        gateway,
        &inventory,
        user_feedback,
        original_task,
        iteration,
        model,
    )
    .await?;

    tracing::debug!(
        iteration = iteration,
        needs_fix = inventory.needs_fix_count(),
        "supervision complete"
    );

    let mut conversation_history = history.to_vec();
    conversation_history.push(ConversationMessage::user(&format!(
        "**Iteration {iteration} - Image Analysis Request**\n\n**User Feedback:**\n{user_feedback}"
    )));
    conversation_history.push(ConversationMessage::assistant(&phase_b_raw));

    return Ok(Supervision {
        refinement_prompt: phase_b_raw.clone(),
        inventory,
        phase_a_raw,
        phase_b_raw,
        conversation_history,
    });
}
