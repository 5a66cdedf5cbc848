#[cfg(test)]
#[path = "pipeline_test.rs"]
mod tests;

use crate::domain::models::ConversationMessage;
use crate::domain::models::PipelineError;
use crate::domain::models::PipelineState;
use crate::domain::models::ReviewResult;
use crate::domain::models::Session;
use crate::domain::models::SessionSettings;

/// Everything that can happen to a running pipeline. Gateway results enter
/// as `*Ready` events; the user's choices enter as the rest.
#[derive(Clone, Debug)]
pub enum PipelineEvent {
    Start {
        task_description: String,
        code_content: String,
    },
    PromptReady {
        prompt: String,
        history: Vec<ConversationMessage>,
    },
    ImageReady {
        image: String,
        prompt: String,
    },
    FeedbackSubmitted {
        feedback: String,
    },
    AnalysisReady {
        refinement_prompt: String,
        history: Vec<ConversationMessage>,
    },
    RefinementConfirmed {
        refinement_prompt: String,
    },
    BackToFeedback,
    SkipToGallery,
    GallerySelect {
        index: usize,
    },
    ReviewRequested,
    ReviewReady {
        version: usize,
        review: ReviewResult,
    },
    StepFailed,
    Restart,
}

impl PipelineEvent {
    fn name(&self) -> &'static str {
        return match self {
            PipelineEvent::Start { .. } => "Start",
            PipelineEvent::PromptReady { .. } => "PromptReady",
            PipelineEvent::ImageReady { .. } => "ImageReady",
            PipelineEvent::FeedbackSubmitted { .. } => "FeedbackSubmitted",
            PipelineEvent::AnalysisReady { .. } => "AnalysisReady",
            PipelineEvent::RefinementConfirmed { .. } => "RefinementConfirmed",
            PipelineEvent::BackToFeedback => "BackToFeedback",
            PipelineEvent::SkipToGallery => "SkipToGallery",
            PipelineEvent::GallerySelect { .. } => "GallerySelect",
            PipelineEvent::ReviewRequested => "ReviewRequested",
            PipelineEvent::ReviewReady { .. } => "ReviewReady",
            PipelineEvent::StepFailed => "StepFailed",
            PipelineEvent::Restart => "Restart",
        };
    }
}

/// The single gateway-backed call (if any) the driver must perform after a
/// transition. Transitions themselves never touch the network.
#[derive(Clone, Debug, PartialEq)]
pub enum StepEffect {
    None,
    CallInterpreter,
    CallSynthesizer,
    CallSupervisor { feedback: String },
    CallReviewer { version: usize },
    UseCachedReview { version: usize },
}

/// The orchestrator's pure core: one mutable `Session`, advanced one event
/// at a time. All side effects live in the drivers.
pub struct Pipeline {
    pub session: Session,
}

impl Pipeline {
    pub fn new(settings: SessionSettings) -> Pipeline {
        return Pipeline {
            session: Session::new(settings),
        };
    }

    pub fn apply(&mut self, event: PipelineEvent) -> Result<StepEffect, PipelineError> {
        let state = self.session.state;
        tracing::debug!(state = ?state, event = event.name(), "pipeline event");

        match event {
            PipelineEvent::Start {
                task_description,
                code_content,
            } => {
                self.expect(state, PipelineState::Idle, "Start")?;
                if task_description.trim().is_empty() {
                    return Err(PipelineError::MissingInput("taskDescription"));
                }

                self.session.task_description = task_description;
                self.session.code_content = code_content;
                self.session.state = PipelineState::Interpreting;
                return Ok(StepEffect::CallInterpreter);
            }

            PipelineEvent::PromptReady { prompt, history } => {
                self.expect(state, PipelineState::Interpreting, "PromptReady")?;

                self.session.generated_prompt = prompt;
                self.session.conversation_history = history;
                self.session.state = PipelineState::Synthesizing;
                return Ok(StepEffect::CallSynthesizer);
            }

            PipelineEvent::ImageReady { image, prompt } => {
                self.expect(state, PipelineState::Synthesizing, "ImageReady")?;

                self.session.push_image(&image, &prompt);
                self.session.state = PipelineState::AwaitingFeedback;
                return Ok(StepEffect::None);
            }

            PipelineEvent::FeedbackSubmitted { feedback } => {
                self.expect(state, PipelineState::AwaitingFeedback, "FeedbackSubmitted")?;

                // The loop bound wins over any remaining feedback.
                if !self.session.can_refine() {
                    self.enter_gallery();
                    return Ok(StepEffect::None);
                }

                self.session.state = PipelineState::Analyzing;
                return Ok(StepEffect::CallSupervisor { feedback });
            }

            PipelineEvent::AnalysisReady {
                refinement_prompt,
                history,
            } => {
                self.expect(state, PipelineState::Analyzing, "AnalysisReady")?;

                // The iteration commits with its analysis; a failed
                // supervisor call leaves the counter untouched.
                self.session.current_iteration += 1;
                self.session.refinement_prompt = refinement_prompt;
                self.session.conversation_history = history;
                self.session.state = PipelineState::Editing;
                return Ok(StepEffect::None);
            }

            PipelineEvent::RefinementConfirmed { refinement_prompt } => {
                self.expect(state, PipelineState::Editing, "RefinementConfirmed")?;
                if refinement_prompt.trim().is_empty() {
                    return Err(PipelineError::MissingInput("refinementPrompt"));
                }

                self.session.refinement_prompt = refinement_prompt;
                self.session.state = PipelineState::Synthesizing;
                return Ok(StepEffect::CallSynthesizer);
            }

            PipelineEvent::BackToFeedback => {
                self.expect(state, PipelineState::Editing, "BackToFeedback")?;

                self.session.state = PipelineState::AwaitingFeedback;
                return Ok(StepEffect::None);
            }

            PipelineEvent::SkipToGallery => {
                self.expect(state, PipelineState::AwaitingFeedback, "SkipToGallery")?;

                self.enter_gallery();
                return Ok(StepEffect::None);
            }

            PipelineEvent::GallerySelect { index } => {
                self.expect(state, PipelineState::GalleryReady, "GallerySelect")?;

                if !self.session.image_history.is_empty() {
                    self.session.gallery_index =
                        index.min(self.session.image_history.len() - 1);
                }
                return Ok(StepEffect::None);
            }

            PipelineEvent::ReviewRequested => {
                self.expect(state, PipelineState::GalleryReady, "ReviewRequested")?;

                let version = match self.session.selected_version() {
                    Some(item) => item.version,
                    None => return Err(PipelineError::MissingInput("imageBase64")),
                };

                // Reviews are cached per version; a cache hit never goes
                // back to the gateway.
                if self.session.reviews.contains_key(&version) {
                    return Ok(StepEffect::UseCachedReview { version });
                }

                self.session.state = PipelineState::Reviewing;
                return Ok(StepEffect::CallReviewer { version });
            }

            PipelineEvent::ReviewReady { version, review } => {
                self.expect(state, PipelineState::Reviewing, "ReviewReady")?;

                self.session.reviews.insert(version, review);
                self.session.state = PipelineState::GalleryReady;
                return Ok(StepEffect::None);
            }

            PipelineEvent::StepFailed => {
                self.recover();
                return Ok(StepEffect::None);
            }

            PipelineEvent::Restart => {
                self.session.restart();
                return Ok(StepEffect::None);
            }
        }
    }

    fn expect(
        &self,
        actual: PipelineState,
        expected: PipelineState,
        event: &'static str,
    ) -> Result<(), PipelineError> {
        if actual != expected {
            return Err(PipelineError::InvalidTransition { event });
        }
        return Ok(());
    }

    fn enter_gallery(&mut self) {
        self.session.state = PipelineState::GalleryReady;
        if !self.session.image_history.is_empty() {
            self.session.gallery_index = self.session.image_history.len() - 1;
        }
    }

    /// Rolls an in-flight state back to the last successfully-completed
    /// one, leaving the step retryable. No partial mutation survives a
    /// failed call because result events are only applied on success.
    fn recover(&mut self) {
        let recovered = match self.session.state {
            PipelineState::Interpreting => PipelineState::Idle,
            PipelineState::Synthesizing => {
                if self.session.image_history.is_empty() {
                    PipelineState::Idle
                } else {
                    PipelineState::Editing
                }
            }
            PipelineState::Analyzing => PipelineState::AwaitingFeedback,
            PipelineState::Reviewing => PipelineState::GalleryReady,
            other => other,
        };

        tracing::warn!(from = ?self.session.state, to = ?recovered, "step failed, recovering");
        self.session.state = recovered;
    }
}
