#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use std::collections::BTreeMap;

use serde_derive::Deserialize;
use serde_derive::Serialize;

use super::ConversationMessage;
use super::ReviewResult;

/// One generated image. Immutable once appended to the history.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ImageVersion {
    /// 1-based, gapless, in insertion order.
    pub version: usize,
    /// Data URI or http(s) URL.
    pub image: String,
    /// The exact prompt that produced this image.
    pub prompt: String,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Interpreting,
    Synthesizing,
    AwaitingFeedback,
    Analyzing,
    Editing,
    GalleryReady,
    Reviewing,
}

/// Settings a session starts from. Kept separate from the session itself so
/// a restart can rebuild the initial state without reaching into config.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub interpreter_model: String,
    pub image_model: String,
    pub review_model: String,
    pub image_temperature: f64,
    pub max_iterations: usize,
}

/// The orchestrator's complete working state. Created at pipeline start,
/// mutated by every step, discarded on restart.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub task_description: String,
    pub code_content: String,
    pub settings: SessionSettings,
    pub current_iteration: usize,
    pub conversation_history: Vec<ConversationMessage>,
    pub generated_prompt: String,
    pub refinement_prompt: String,
    pub current_image: Option<String>,
    pub image_history: Vec<ImageVersion>,
    pub reviews: BTreeMap<usize, ReviewResult>,
    pub gallery_index: usize,
    pub state: PipelineState,
}

impl Session {
    pub fn new(settings: SessionSettings) -> Session {
        return Session {
            task_description: "".to_string(),
            code_content: "".to_string(),
            settings,
            current_iteration: 0,
            conversation_history: vec![],
            generated_prompt: "".to_string(),
            refinement_prompt: "".to_string(),
            current_image: None,
            image_history: vec![],
            reviews: BTreeMap::new(),
            gallery_index: 0,
            state: PipelineState::Idle,
        };
    }

    /// Appends a new version numbered `len + 1` and makes it current.
    pub fn push_image(&mut self, image: &str, prompt: &str) {
        let version = self.image_history.len() + 1;
        self.current_image = Some(image.to_string());
        self.image_history.push(ImageVersion {
            version,
            image: image.to_string(),
            prompt: prompt.to_string(),
        });
    }

    /// True while another refinement cycle is allowed. With N max
    /// iterations the session holds at most N + 1 images.
    pub fn can_refine(&self) -> bool {
        return self.image_history.len() <= self.settings.max_iterations;
    }

    /// The prompt the next synthesis should use: the interpreter's prompt
    /// for the very first image, the refinement text afterwards.
    pub fn next_prompt(&self) -> &str {
        if self.image_history.is_empty() {
            return &self.generated_prompt;
        }
        return &self.refinement_prompt;
    }

    /// The 1-based number of the refinement cycle currently being prepared.
    pub fn next_iteration(&self) -> usize {
        return self.current_iteration + 1;
    }

    pub fn selected_version(&self) -> Option<&ImageVersion> {
        return self.image_history.get(self.gallery_index);
    }

    /// Unconditional reset to the initial empty state. All history is
    /// discarded, including cached reviews.
    pub fn restart(&mut self) {
        *self = Session::new(self.settings.clone());
    }
}
