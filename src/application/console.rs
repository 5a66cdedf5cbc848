use std::io::Write;
use std::path;

use anyhow::Context;
use anyhow::Result;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::io::Stdin;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::GatewayBox;
use crate::domain::models::PipelineError;
use crate::domain::models::PipelineState;
use crate::domain::models::ReviewResult;
use crate::domain::models::SessionSettings;
use crate::domain::services::images;
use crate::domain::services::interpreter;
use crate::domain::services::reviewer;
use crate::domain::services::supervisor;
use crate::domain::services::synthesizer;
use crate::domain::services::Pipeline;
use crate::domain::services::PipelineEvent;
use crate::domain::services::StepEffect;
use crate::infrastructure::gateway::GatewayManager;

fn settings_from_config() -> SessionSettings {
    return SessionSettings {
        interpreter_model: Config::get(ConfigKey::InterpreterModel),
        image_model: Config::get(ConfigKey::ImageModel),
        review_model: Config::get(ConfigKey::ReviewModel),
        image_temperature: Config::image_temperature(),
        max_iterations: Config::max_iterations(),
    };
}

struct Console {
    gateway: GatewayBox,
    pipeline: Pipeline,
    lines: Lines<BufReader<Stdin>>,
    output_dir: path::PathBuf,
    started: bool,
}

impl Console {
    async fn read_line(&mut self, prompt: &str) -> Result<String> {
        print!("{prompt}");
        std::io::stdout().flush()?;

        let line = match self.lines.next_line().await? {
            Some(line) => line,
            None => anyhow::bail!("stdin closed"),
        };
        return Ok(line.trim().to_string());
    }

    /// Reads until a line containing only "." so refinement prompts can be
    /// edited across multiple lines.
    async fn read_block(&mut self) -> Result<String> {
        let mut collected: Vec<String> = vec![];
        loop {
            let line = match self.lines.next_line().await? {
                Some(line) => line,
                None => break,
            };
            if line.trim() == "." {
                break;
            }
            collected.push(line);
        }

        return Ok(collected.join("\n").trim().to_string());
    }

    fn report_failure(&mut self, err: &PipelineError) {
        if err.is_recoverable() {
            println!("\nStep failed: {err}. The pipeline kept its last good state.");
        } else {
            println!("\nStep failed: {err}.");
        }

        // Result events are only applied on success, so recovery is just a
        // state rollback.
        let _ = self.pipeline.apply(PipelineEvent::StepFailed);
    }

    /// Executes the gateway call an effect asks for and feeds the result
    /// back into the state machine. A follow-up effect (interpretation
    /// flowing straight into the first synthesis) continues the loop.
    async fn perform(&mut self, first: StepEffect) -> Result<()> {
        let mut effect = first;

        loop {
            match effect {
                StepEffect::None => return Ok(()),

                StepEffect::CallInterpreter => {
                    println!("\nInterpreting the task into an image prompt...");
                    let session = &self.pipeline.session;
                    let code = if session.code_content.is_empty() {
                        None
                    } else {
                        Some(session.code_content.as_str())
                    };

                    let res = interpreter::interpret(
                        &self.gateway,
                        &session.task_description,
                        code,
                        &session.settings.interpreter_model,
                    )
                    .await;

                    match res {
                        Ok(interpretation) => {
                            println!("\n--- Generated prompt ---\n{}\n", interpretation.prompt);
                            effect = self.pipeline.apply(PipelineEvent::PromptReady {
                                prompt: interpretation.prompt,
                                history: interpretation.conversation_history,
                            })?;
                        }
                        Err(err) => {
                            self.report_failure(&err);
                            return Ok(());
                        }
                    }
                }

                StepEffect::CallSynthesizer => {
                    let session = &self.pipeline.session;
                    let version = session.image_history.len() + 1;
                    println!("Generating image v{version}...");

                    let res = synthesizer::generate(
                        &self.gateway,
                        session.next_prompt(),
                        &session.settings.image_model,
                        session.settings.image_temperature,
                    )
                    .await;

                    match res {
                        Ok(synthesized) => {
                            let prompt = self.pipeline.session.next_prompt().to_string();
                            effect = self.pipeline.apply(PipelineEvent::ImageReady {
                                image: synthesized.image,
                                prompt,
                            })?;
                            self.show_latest_image();
                        }
                        Err(err) => {
                            self.report_failure(&err);
                            return Ok(());
                        }
                    }
                }

                StepEffect::CallSupervisor { feedback } => {
                    println!("Analyzing the image with the supervisor...");
                    let session = &self.pipeline.session;

                    let res = supervisor::supervise(
                        &self.gateway,
                        session.current_image.as_deref().unwrap_or_default(),
                        &feedback,
                        &session.conversation_history,
                        &session.task_description,
                        session.next_iteration(),
                        &session.settings.interpreter_model,
                    )
                    .await;

                    match res {
                        Ok(supervision) => {
                            println!(
                                "Inventory: {} elements, {} flagged.",
                                supervision.inventory.element_count(),
                                supervision.inventory.needs_fix_count()
                            );
                            effect = self.pipeline.apply(PipelineEvent::AnalysisReady {
                                refinement_prompt: supervision.refinement_prompt,
                                history: supervision.conversation_history,
                            })?;
                        }
                        Err(err) => {
                            self.report_failure(&err);
                            return Ok(());
                        }
                    }
                }

                StepEffect::CallReviewer { version } => {
                    println!("Reviewing image v{version}...");
                    let session = &self.pipeline.session;
                    let image = session
                        .selected_version()
                        .map(|item| return item.image.to_string())
                        .unwrap_or_default();

                    let res = reviewer::review(
                        &self.gateway,
                        &image,
                        &session.task_description,
                        session.image_history.len(),
                        &session.settings.review_model,
                    )
                    .await;

                    match res {
                        Ok(review) => {
                            print_review(version, &review);
                            effect = self
                                .pipeline
                                .apply(PipelineEvent::ReviewReady { version, review })?;
                        }
                        Err(err) => {
                            self.report_failure(&err);
                            return Ok(());
                        }
                    }
                }

                StepEffect::UseCachedReview { version } => {
                    if let Some(review) = self.pipeline.session.reviews.get(&version) {
                        print_review(version, review);
                    }
                    return Ok(());
                }
            }
        }
    }

    fn show_latest_image(&self) {
        let session = &self.pipeline.session;
        let item = match session.image_history.last() {
            Some(item) => item,
            None => return,
        };

        match images::save_version(&item.image, &self.output_dir, item.version) {
            Ok(path) => println!("Image v{} saved to {}", item.version, path.display()),
            Err(_) => println!("Image v{} is available at {}", item.version, item.image),
        }
    }

    async fn feedback_round(&mut self) -> Result<()> {
        if !self.pipeline.session.can_refine() {
            println!("\nIteration limit reached, moving to the gallery.");
            let effect = self.pipeline.apply(PipelineEvent::FeedbackSubmitted {
                feedback: "".to_string(),
            })?;
            return self.perform(effect).await;
        }

        let remaining = self.pipeline.session.settings.max_iterations + 1
            - self.pipeline.session.image_history.len();
        println!("\n{remaining} refinement(s) left.");
        let line = self
            .read_line("Feedback for the next refinement (or /skip to finish): ")
            .await?;

        let effect = if line == "/skip" {
            self.pipeline.apply(PipelineEvent::SkipToGallery)?
        } else {
            self.pipeline
                .apply(PipelineEvent::FeedbackSubmitted { feedback: line })?
        };

        return self.perform(effect).await;
    }

    async fn editing_round(&mut self) -> Result<()> {
        println!(
            "\n--- Proposed refinement prompt ---\n{}\n",
            self.pipeline.session.refinement_prompt
        );
        let choice = self
            .read_line("[Enter] generate with this prompt, (e)dit it, (b)ack to feedback: ")
            .await?;

        match choice.as_str() {
            "e" => {
                println!("Enter the replacement prompt, end with a line containing only '.':");
                let edited = self.read_block().await?;
                let res = self.pipeline.apply(PipelineEvent::RefinementConfirmed {
                    refinement_prompt: edited,
                });
                match res {
                    Ok(effect) => return self.perform(effect).await,
                    Err(err) => {
                        println!("{err}");
                        return Ok(());
                    }
                }
            }
            "b" => {
                self.pipeline.apply(PipelineEvent::BackToFeedback)?;
                return Ok(());
            }
            _ => {
                let prompt = self.pipeline.session.refinement_prompt.clone();
                let effect = self.pipeline.apply(PipelineEvent::RefinementConfirmed {
                    refinement_prompt: prompt,
                })?;
                return self.perform(effect).await;
            }
        }
    }

    /// Gallery loop. Returns false when the user is done.
    async fn gallery_round(&mut self) -> Result<bool> {
        let session = &self.pipeline.session;
        println!("\n--- Gallery ---");
        for item in session.image_history.iter() {
            let marker = if item.version - 1 == session.gallery_index {
                "*"
            } else {
                " "
            };
            let reviewed = if session.reviews.contains_key(&item.version) {
                " [reviewed]"
            } else {
                ""
            };
            println!("{marker} v{}{reviewed}", item.version);
        }

        let line = self
            .read_line("Select (number), (r)eview selected, (p)rompt, (n)ew session, (q)uit: ")
            .await?;

        match line.as_str() {
            "q" => return Ok(false),
            "n" => {
                self.pipeline.apply(PipelineEvent::Restart)?;
                self.started = false;
                return Ok(true);
            }
            "r" => {
                let effect = self.pipeline.apply(PipelineEvent::ReviewRequested)?;
                self.perform(effect).await?;
                return Ok(true);
            }
            "p" => {
                if let Some(item) = self.pipeline.session.selected_version() {
                    println!("\n--- Prompt for v{} ---\n{}", item.version, item.prompt);
                }
                return Ok(true);
            }
            other => {
                if let Ok(version) = other.parse::<usize>() {
                    if version >= 1 {
                        self.pipeline
                            .apply(PipelineEvent::GallerySelect { index: version - 1 })?;
                    }
                }
                return Ok(true);
            }
        }
    }

    async fn idle_round(&mut self, task: &Option<String>, code: &Option<String>) -> Result<bool> {
        // Idle after a start means the interpreter or first synthesis
        // failed; do not retry without being asked to.
        if self.started {
            let answer = self.read_line("Retry from the start? [y/N]: ").await?;
            if answer.to_lowercase() != "y" {
                return Ok(false);
            }
        }

        let task_description = match task {
            Some(task) => task.to_string(),
            None => {
                self.read_line("Describe the academic figure to generate: ")
                    .await?
            }
        };

        let res = self.pipeline.apply(PipelineEvent::Start {
            task_description,
            code_content: code.clone().unwrap_or_default(),
        });

        match res {
            Ok(effect) => {
                self.started = true;
                self.perform(effect).await?;
                return Ok(true);
            }
            Err(PipelineError::MissingInput(_)) => {
                println!("A task description is required.");
                return Ok(task.is_none());
            }
            Err(err) => return Err(err.into()),
        }
    }
}

fn print_review(version: usize, review: &ReviewResult) {
    println!("\n--- Review of v{version} ({}) ---", review.model);

    let fmt = |score: Option<f64>| {
        return score
            .map(|s| return format!("{s}/10"))
            .unwrap_or_else(|| return "-".to_string());
    };
    println!("Requirements: {}", fmt(review.scores.requirements));
    println!("Academic rigor: {}", fmt(review.scores.rigor));
    println!("Accuracy: {}", fmt(review.scores.accuracy));
    println!("Visual clarity: {}", fmt(review.scores.clarity));
    println!("Overall: {}", fmt(review.scores.overall));
    println!("Publication readiness: {}", review.publication_readiness);
    println!("\n{}", review.review_text);
}

pub async fn start(task: Option<String>, code: Option<String>) -> Result<()> {
    let gateway = GatewayManager::get()?;
    gateway
        .health_check()
        .await
        .context("set OPENROUTER_API_KEY before running the pipeline")?;

    let mut console = Console {
        gateway,
        pipeline: Pipeline::new(settings_from_config()),
        lines: BufReader::new(tokio::io::stdin()).lines(),
        output_dir: path::PathBuf::from(Config::get(ConfigKey::OutputDir)),
        started: false,
    };

    // One stable state per turn of the loop; in-flight states only exist
    // inside perform().
    loop {
        match console.pipeline.session.state {
            PipelineState::Idle => {
                if !console.idle_round(&task, &code).await? {
                    return Ok(());
                }
            }
            PipelineState::AwaitingFeedback => console.feedback_round().await?,
            PipelineState::Editing => console.editing_round().await?,
            PipelineState::GalleryReady => {
                if !console.gallery_round().await? {
                    return Ok(());
                }
            }
            state => {
                // A stalled in-flight state means a step failed without
                // recovery; bail rather than spin.
                anyhow::bail!("pipeline stalled in state {state:?}");
            }
        }
    }
}
