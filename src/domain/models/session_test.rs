use std::collections::BTreeMap;

use super::PipelineState;
use super::super::PublicationReadiness;
use super::ReviewResult;
use super::super::Scores;
use super::Session;
use super::SessionSettings;

pub fn test_settings() -> SessionSettings {
    return SessionSettings {
        interpreter_model: "anthropic/claude-opus-4.5".to_string(),
        image_model: "google/gemini-3-pro-image-preview".to_string(),
        review_model: "anthropic/claude-opus-4.5".to_string(),
        image_temperature: 0.7,
        max_iterations: 2,
    };
}

fn stub_review() -> ReviewResult {
    return ReviewResult {
        scores: Scores {
            overall: Some(8.0),
            ..Scores::default()
        },
        publication_readiness: PublicationReadiness::Ready,
        review_text: "solid".to_string(),
        model: "anthropic/claude-opus-4.5".to_string(),
    };
}

mod push_image {
    use super::*;

    #[test]
    fn it_numbers_versions_gapless_from_one() {
        let mut session = Session::new(test_settings());

        session.push_image("data:image/png;base64,a", "first prompt");
        session.push_image("data:image/png;base64,b", "second prompt");
        session.push_image("data:image/png;base64,c", "third prompt");

        let versions = session
            .image_history
            .iter()
            .map(|v| return v.version)
            .collect::<Vec<usize>>();
        assert_eq!(versions, vec![1, 2, 3]);
        assert_eq!(
            session.current_image,
            Some("data:image/png;base64,c".to_string())
        );
    }

    #[test]
    fn it_records_the_prompt_that_produced_each_version() {
        let mut session = Session::new(test_settings());

        session.push_image("img-a", "prompt a");
        session.push_image("img-b", "prompt b");

        assert_eq!(session.image_history[0].prompt, "prompt a");
        assert_eq!(session.image_history[1].prompt, "prompt b");
    }
}

mod can_refine {
    use super::*;

    #[test]
    fn it_allows_refinement_up_to_the_iteration_bound() {
        let mut session = Session::new(test_settings());
        session.settings.max_iterations = 1;

        session.push_image("img-1", "p1");
        assert!(session.can_refine());

        session.push_image("img-2", "p2");
        assert!(!session.can_refine());
    }

    #[test]
    fn it_never_exceeds_max_iterations_plus_one_images() {
        let mut session = Session::new(test_settings());
        session.settings.max_iterations = 2;

        while session.can_refine() {
            let prompt = session.next_prompt().to_string();
            session.push_image("img", &prompt);
            session.refinement_prompt = "refined".to_string();
        }

        assert_eq!(
            session.image_history.len(),
            session.settings.max_iterations + 1
        );
    }
}

mod next_prompt {
    use super::*;

    #[test]
    fn it_uses_the_generated_prompt_for_the_first_image() {
        let mut session = Session::new(test_settings());
        session.generated_prompt = "original".to_string();
        session.refinement_prompt = "refined".to_string();

        assert_eq!(session.next_prompt(), "original");
    }

    #[test]
    fn it_uses_the_refinement_prompt_afterwards() {
        let mut session = Session::new(test_settings());
        session.generated_prompt = "original".to_string();
        session.push_image("img-1", "original");
        session.refinement_prompt = "refined".to_string();

        assert_eq!(session.next_prompt(), "refined");
    }
}

mod restart {
    use super::*;

    #[test]
    fn it_resets_every_field_to_the_initial_state() {
        let mut session = Session::new(test_settings());
        session.task_description = "draw a pipeline".to_string();
        session.code_content = "fn main() {}".to_string();
        session.generated_prompt = "prompt".to_string();
        session.refinement_prompt = "refined".to_string();
        session.current_iteration = 2;
        session.push_image("img-1", "prompt");
        session.reviews.insert(1, stub_review());
        session.gallery_index = 1;
        session.state = PipelineState::GalleryReady;

        session.restart();

        assert_eq!(session, Session::new(test_settings()));
        assert_eq!(session.reviews, BTreeMap::new());
        assert_eq!(session.state, PipelineState::Idle);
    }
}
