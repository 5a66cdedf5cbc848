use anyhow::Result;
use mockito::Matcher;
use serde_json::json;

use super::analyze_structure;
use super::generate_operations;
use super::parse_inventory;
use super::supervise;
use crate::domain::models::ConversationMessage;
use crate::domain::models::ElementStatus;
use crate::domain::models::GatewayBox;
use crate::domain::models::PipelineError;
use crate::domain::models::Role;
use crate::infrastructure::gateway::openrouter::OpenRouter;

fn gateway_for(server: &mockito::Server) -> GatewayBox {
    return Box::new(OpenRouter::with_url(server.url()));
}

fn inventory_json() -> String {
    return json!({
        "coordinate_system": "percentage of image dimensions, origin top-left",
        "blocks": [
            {"id": "block_1", "name": "A", "status": "CORRECT", "issues": []},
            {"id": "block_2", "name": "B", "status": "NEEDS_FIX", "issues": ["label is misspelled"]}
        ],
        "connections": [],
        "text_elements": []
    })
    .to_string();
}

fn chat_body(content: &str) -> String {
    return json!({"choices": [{"message": {"content": content}}]}).to_string();
}

mod parse_inventory {
    use super::*;

    #[test]
    fn it_parses_a_bare_json_reply() -> Result<()> {
        let inventory = parse_inventory(&inventory_json())?;

        assert_eq!(inventory.blocks.len(), 2);
        assert_eq!(inventory.blocks[1].status, ElementStatus::NeedsFix);

        return Ok(());
    }

    #[test]
    fn it_recovers_json_from_a_fenced_block_with_leading_prose() -> Result<()> {
        let reply = format!(
            "Here is the structural inventory you asked for:\n\n```json\n{}\n```\n\nLet me know if anything is unclear.",
            inventory_json()
        );

        let inventory = parse_inventory(&reply)?;

        assert_eq!(inventory.blocks.len(), 2);

        return Ok(());
    }

    #[test]
    fn it_recovers_json_from_an_unfenced_brace_span() -> Result<()> {
        let reply = format!("The inventory follows. {} That is everything.", inventory_json());

        let inventory = parse_inventory(&reply)?;

        assert_eq!(inventory.blocks.len(), 2);

        return Ok(());
    }

    #[test]
    fn it_normalizes_the_status_invariant_on_parse() -> Result<()> {
        let reply = json!({
            "blocks": [{"id": "b1", "status": "NEEDS_FIX", "issues": []}]
        })
        .to_string();

        let inventory = parse_inventory(&reply)?;

        assert!(!inventory.blocks[0].issues.is_empty());

        return Ok(());
    }

    #[test]
    fn it_fails_on_json_without_a_blocks_array() {
        let res = parse_inventory(r#"{"summary": {"total_blocks": 3}}"#);
        assert!(matches!(res, Err(PipelineError::MalformedInventory { .. })));
    }

    #[test]
    fn it_fails_on_prose_with_no_json_at_all() {
        let res = parse_inventory("The image looks great, nothing to report.");
        assert!(matches!(res, Err(PipelineError::MalformedInventory { .. })));
    }
}

mod analyze_structure {
    use super::*;

    #[tokio::test]
    async fn it_sends_the_image_and_parses_the_inventory() -> Result<()> {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("Structural Analysis Request".to_string()),
                Matcher::Regex("data:image/png;base64,abc".to_string()),
                Matcher::PartialJson(json!({"temperature": 0.3, "max_tokens": 4000})),
            ]))
            .with_status(200)
            .with_body(chat_body(&inventory_json()))
            .create();

        let gateway = gateway_for(&server);
        let (inventory, raw) =
            analyze_structure(&gateway, "abc", "draw a pipeline", "anthropic/claude-opus-4.5")
                .await?;
        mock.assert();

        assert_eq!(inventory.blocks.len(), 2);
        assert!(raw.contains("block_1"));

        return Ok(());
    }

    #[tokio::test]
    async fn it_rejects_a_missing_image_without_calling_the_gateway() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .expect(0)
            .create();

        let gateway = gateway_for(&server);
        let res = analyze_structure(&gateway, "", "task", "anthropic/claude-opus-4.5").await;
        mock.assert();

        assert!(matches!(
            res,
            Err(PipelineError::MissingInput("imageBase64"))
        ));
    }

    #[tokio::test]
    async fn it_fails_with_malformed_inventory_on_unstructured_replies() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(chat_body("Looks good to me!"))
            .create();

        let gateway = gateway_for(&server);
        let res = analyze_structure(&gateway, "abc", "task", "anthropic/claude-opus-4.5").await;
        mock.assert();

        assert!(matches!(
            res,
            Err(PipelineError::MalformedInventory { .. })
        ));
    }
}

mod generate_operations {
    use super::*;

    #[tokio::test]
    async fn it_serializes_the_inventory_and_returns_the_script() -> Result<()> {
        let inventory = parse_inventory(&inventory_json())?;

        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::AllOf(vec![
                Matcher::Regex("Iteration 1 - Refinement Request".to_string()),
                Matcher::Regex("label is misspelled".to_string()),
                Matcher::Regex("my feedback".to_string()),
                Matcher::PartialJson(json!({"temperature": 0.5})),
            ]))
            .with_status(200)
            .with_body(chat_body(
                "Refine this academic figure with the following corrections: fix the label.",
            ))
            .create();

        let gateway = gateway_for(&server);
        let script = generate_operations(
            &gateway,
            &inventory,
            "my feedback",
            "draw a pipeline",
            1,
            "anthropic/claude-opus-4.5",
        )
        .await?;
        mock.assert();

        assert!(script.starts_with("Refine this academic figure"));

        return Ok(());
    }
}

mod supervise {
    use super::*;

    #[tokio::test]
    async fn it_chains_both_phases_and_updates_the_history() -> Result<()> {
        let mut server = mockito::Server::new();
        let phase_a = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Regex("Structural Analysis Request".to_string()))
            .with_status(200)
            .with_body(chat_body(&inventory_json()))
            .create();
        let phase_b = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Regex("Refinement Request".to_string()))
            .with_status(200)
            .with_body(chat_body(
                "Refine this academic figure with the following corrections: fix B.",
            ))
            .create();

        let history = vec![
            ConversationMessage::system("interpreter rules"),
            ConversationMessage::user("draw a pipeline"),
            ConversationMessage::assistant("a prompt"),
        ];

        let gateway = gateway_for(&server);
        let res = supervise(
            &gateway,
            "data:image/png;base64,abc",
            "fix the second box",
            &history,
            "draw a pipeline",
            1,
            "anthropic/claude-opus-4.5",
        )
        .await?;
        phase_a.assert();
        phase_b.assert();

        assert!(res
            .refinement_prompt
            .starts_with("Refine this academic figure"));
        assert_eq!(res.refinement_prompt, res.phase_b_raw);
        assert_eq!(res.inventory.blocks.len(), 2);
        assert!(res.phase_a_raw.contains("block_1"));

        assert_eq!(res.conversation_history.len(), 5);
        assert_eq!(res.conversation_history[3].role, Role::User);
        assert!(res.conversation_history[3].text().contains("fix the second box"));
        assert_eq!(res.conversation_history[4].role, Role::Assistant);

        return Ok(());
    }

    #[tokio::test]
    async fn it_never_reaches_phase_b_when_phase_a_fails() {
        let mut server = mockito::Server::new();
        let phase_a = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Regex("Structural Analysis Request".to_string()))
            .with_status(200)
            .with_body(chat_body("not an inventory"))
            .create();
        let phase_b = server
            .mock("POST", "/v1/chat/completions")
            .match_body(Matcher::Regex("Refinement Request".to_string()))
            .expect(0)
            .create();

        let gateway = gateway_for(&server);
        let res = supervise(
            &gateway,
            "data:image/png;base64,abc",
            "feedback",
            &[],
            "task",
            1,
            "anthropic/claude-opus-4.5",
        )
        .await;
        phase_a.assert();
        phase_b.assert();

        assert!(matches!(
            res,
            Err(PipelineError::MalformedInventory { .. })
        ));
    }
}
