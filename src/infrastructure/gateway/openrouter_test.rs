use anyhow::Result;
use mockito::Matcher;
use serde_json::json;

use super::clip;
use super::OpenRouter;
use crate::domain::models::ChatRequest;
use crate::domain::models::ConversationMessage;
use crate::domain::models::Gateway;
use crate::domain::models::PipelineError;

fn request() -> ChatRequest {
    return ChatRequest::new(
        "anthropic/claude-opus-4.5",
        vec![
            ConversationMessage::system("be helpful"),
            ConversationMessage::user("say hi"),
        ],
    )
    .with_temperature(0.7)
    .with_max_tokens(4000);
}

mod health_check {
    use super::*;

    #[tokio::test]
    async fn it_passes_with_a_credential() {
        let gateway = OpenRouter::with_url("http://localhost".to_string());
        assert!(gateway.health_check().await.is_ok());
    }

    #[tokio::test]
    async fn it_fails_without_a_credential() {
        let gateway = OpenRouter {
            url: "http://localhost".to_string(),
            api_key: "".to_string(),
        };

        let res = gateway.health_check().await;
        assert!(matches!(res, Err(PipelineError::MissingCredential)));
    }
}

mod complete {
    use super::*;

    #[tokio::test]
    async fn it_posts_chat_completions_and_parses_the_reply() -> Result<()> {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("Authorization", "Bearer abc")
            .match_header("X-Title", "Easel")
            .match_body(Matcher::PartialJson(json!({
                "model": "anthropic/claude-opus-4.5",
                "temperature": 0.7,
                "max_tokens": 4000
            })))
            .with_status(200)
            .with_body(
                json!({"choices": [{"message": {"role": "assistant", "content": "hi"}}]})
                    .to_string(),
            )
            .create();

        let gateway = OpenRouter::with_url(server.url());
        let reply = gateway.complete(request()).await?;
        mock.assert();

        assert_eq!(reply.content_text(), Some("hi".to_string()));

        return Ok(());
    }

    #[tokio::test]
    async fn it_relays_upstream_failures_with_status_and_body() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(402)
            .with_body(r#"{"error": {"message": "insufficient credits"}}"#)
            .create();

        let gateway = OpenRouter::with_url(server.url());
        let res = gateway.complete(request()).await;
        mock.assert();

        match res {
            Err(PipelineError::Upstream { status, body }) => {
                assert_eq!(status, 402);
                assert!(body.contains("insufficient credits"));
            }
            _ => panic!("expected upstream error"),
        }
    }

    #[tokio::test]
    async fn it_reports_non_json_replies_as_malformed() {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body("<html>gateway timeout</html>")
            .create();

        let gateway = OpenRouter::with_url(server.url());
        let res = gateway.complete(request()).await;
        mock.assert();

        match res {
            Err(PipelineError::MalformedReply { details }) => {
                assert!(details.contains("gateway timeout"));
            }
            _ => panic!("expected malformed reply error"),
        }
    }

    #[tokio::test]
    async fn it_refuses_empty_message_lists() {
        let gateway = OpenRouter::with_url("http://localhost:1".to_string());
        let req = ChatRequest::new("anthropic/claude-opus-4.5", vec![]);

        let res = gateway.complete(req).await;
        assert!(matches!(res, Err(PipelineError::MissingInput("messages"))));
    }

    #[tokio::test]
    async fn it_fails_without_a_credential_before_any_call() {
        let gateway = OpenRouter {
            url: "http://localhost:1".to_string(),
            api_key: "".to_string(),
        };

        let res = gateway.complete(request()).await;
        assert!(matches!(res, Err(PipelineError::MissingCredential)));
    }
}

mod clip_text {
    use super::*;

    #[test]
    fn it_leaves_short_text_untouched() {
        assert_eq!(clip("short", 500), "short");
    }

    #[test]
    fn it_truncates_on_char_boundaries() {
        let text = "é".repeat(600);
        let clipped = clip(&text, 500);
        assert_eq!(clipped.chars().count(), 500);
    }
}
