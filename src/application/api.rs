#[cfg(test)]
#[path = "api_test.rs"]
mod tests;

use std::net::IpAddr;
use std::sync::Arc;

use anyhow::Context;
use anyhow::Result;
use chrono::SecondsFormat;
use chrono::Utc;
use serde_derive::Deserialize;
use serde_json::json;
use serde_json::Value;
use warp::http::StatusCode;
use warp::Filter;
use warp::Rejection;
use warp::Reply;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::ConversationMessage;
use crate::domain::models::GatewayBox;
use crate::domain::models::PipelineError;
use crate::domain::services::interpreter;
use crate::domain::services::reviewer;
use crate::domain::services::supervisor;
use crate::domain::services::synthesizer;
use crate::infrastructure::gateway::openrouter;
use crate::infrastructure::gateway::GatewayManager;

type SharedGateway = Arc<GatewayBox>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InterpretRequest {
    task_description: Option<String>,
    code_content: Option<String>,
    interpreter_model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateImageRequest {
    prompt: Option<String>,
    image_model: Option<String>,
    temperature: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SuperviseRequest {
    image_base64: Option<String>,
    user_feedback: Option<String>,
    conversation_history: Option<Vec<ConversationMessage>>,
    original_task: Option<String>,
    iteration_number: Option<usize>,
    interpreter_model: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FinalReviewRequest {
    image_base64: Option<String>,
    original_task: Option<String>,
    total_iterations: Option<usize>,
    interpreter_model: Option<String>,
}

fn reply_json(status: StatusCode, body: &Value) -> warp::reply::WithStatus<warp::reply::Json> {
    return warp::reply::with_status(warp::reply::json(body), status);
}

fn bad_request(message: &str) -> warp::reply::WithStatus<warp::reply::Json> {
    return reply_json(StatusCode::BAD_REQUEST, &json!({"error": message}));
}

fn upstream_status(status: u16) -> StatusCode {
    return StatusCode::from_u16(status).unwrap_or(StatusCode::BAD_GATEWAY);
}

/// Upstream error bodies are usually JSON with a nested message; fall back
/// to the raw text when they are not.
fn mine_upstream_details(body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(message) = parsed
            .get("error")
            .and_then(|e| return e.get("message"))
            .and_then(|m| return m.as_str())
        {
            return message.to_string();
        }
        if let Some(message) = parsed.get("message").and_then(|m| return m.as_str()) {
            return message.to_string();
        }
    }

    return body.to_string();
}

async fn handle_interpret(
    req: InterpretRequest,
    gateway: SharedGateway,
) -> Result<impl Reply, Rejection> {
    let task = req.task_description.unwrap_or_default();
    if task.trim().is_empty() {
        return Ok(bad_request("Task description is required"));
    }

    let model = req
        .interpreter_model
        .unwrap_or_else(|| return Config::get(ConfigKey::InterpreterModel));

    let res = interpreter::interpret(&gateway, &task, req.code_content.as_deref(), &model).await;

    match res {
        Ok(interpretation) => {
            return Ok(reply_json(
                StatusCode::OK,
                &json!({
                    "success": true,
                    "prompt": interpretation.prompt,
                    "model": model,
                    "conversationHistory": interpretation.conversation_history,
                }),
            ));
        }
        Err(PipelineError::MissingCredential) => {
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "API key not configured"}),
            ));
        }
        Err(PipelineError::Upstream { status, body }) => {
            return Ok(reply_json(
                upstream_status(status),
                &json!({
                    "error": "Failed to generate prompt",
                    "details": body,
                    "model": model,
                }),
            ));
        }
        Err(PipelineError::MalformedReply { details }) => {
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "Invalid JSON response from API", "details": details}),
            ));
        }
        Err(PipelineError::EmptyReply) => {
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "No prompt generated"}),
            ));
        }
        Err(err) => {
            tracing::error!(error = %err, "interpret endpoint failed");
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "Internal server error", "details": err.to_string()}),
            ));
        }
    }
}

async fn handle_generate_image(
    req: GenerateImageRequest,
    gateway: SharedGateway,
) -> Result<impl Reply, Rejection> {
    let prompt = req.prompt.unwrap_or_default();
    if prompt.trim().is_empty() {
        return Ok(bad_request("Prompt is required"));
    }

    let model = req
        .image_model
        .unwrap_or_else(|| return Config::get(ConfigKey::ImageModel));
    let temperature = req.temperature.unwrap_or_else(Config::image_temperature);

    let res = synthesizer::generate(&gateway, &prompt, &model, temperature).await;

    match res {
        Ok(synthesized) => {
            return Ok(reply_json(
                StatusCode::OK,
                &json!({
                    "success": true,
                    "image": synthesized.image,
                    "model": model,
                }),
            ));
        }
        // Not an HTTP error: the caller inspects `success` and may retry
        // with a different model.
        Err(PipelineError::NoImageReturned { text_response }) => {
            let details = if text_response.is_some() {
                "Model returned text instead of image. This model may not support image generation."
            } else {
                "Could not find image data in the response."
            };

            return Ok(reply_json(
                StatusCode::OK,
                &json!({
                    "success": false,
                    "error": "No image in response",
                    "details": details,
                    "textResponse": text_response.map(|text| return openrouter::clip(&text, 300)),
                    "model": model,
                }),
            ));
        }
        Err(PipelineError::MissingCredential) => {
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "API key not configured"}),
            ));
        }
        Err(PipelineError::Upstream { status, body }) => {
            return Ok(reply_json(
                upstream_status(status),
                &json!({
                    "success": false,
                    "error": "API request failed",
                    "details": mine_upstream_details(&body),
                    "model": model,
                }),
            ));
        }
        Err(PipelineError::MalformedReply { details }) => {
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"success": false, "error": "Invalid JSON response", "details": details}),
            ));
        }
        Err(err) => {
            tracing::error!(error = %err, "generate-image endpoint failed");
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({
                    "success": false,
                    "error": "Internal server error",
                    "details": err.to_string(),
                }),
            ));
        }
    }
}

async fn handle_supervise(
    req: SuperviseRequest,
    gateway: SharedGateway,
) -> Result<impl Reply, Rejection> {
    let image = req.image_base64.unwrap_or_default();
    if image.trim().is_empty() {
        return Ok(bad_request("Image is required"));
    }

    let model = req
        .interpreter_model
        .unwrap_or_else(|| return Config::get(ConfigKey::InterpreterModel));
    let feedback = req.user_feedback.unwrap_or_default();
    let history = req.conversation_history.unwrap_or_default();
    let original_task = req
        .original_task
        .unwrap_or_else(|| return "Not provided".to_string());
    let iteration = req.iteration_number.unwrap_or(1);

    let res = supervisor::supervise(
        &gateway,
        &image,
        &feedback,
        &history,
        &original_task,
        iteration,
        &model,
    )
    .await;

    match res {
        Ok(supervision) => {
            return Ok(reply_json(
                StatusCode::OK,
                &json!({
                    "success": true,
                    "phaseA": {
                        "inventory": supervision.inventory,
                        "rawResponse": supervision.phase_a_raw,
                    },
                    "phaseB": {
                        "modificationScript": supervision.phase_b_raw,
                        "rawResponse": supervision.phase_b_raw,
                    },
                    "refinementPrompt": supervision.refinement_prompt,
                    "conversationHistory": supervision.conversation_history,
                }),
            ));
        }
        Err(PipelineError::MissingCredential) => {
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "API key not configured"}),
            ));
        }
        Err(PipelineError::MalformedInventory { details }) => {
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "Failed to analyze image structure", "details": details}),
            ));
        }
        Err(PipelineError::Upstream { status, body }) => {
            return Ok(reply_json(
                upstream_status(status),
                &json!({"error": "Failed to analyze image", "details": body}),
            ));
        }
        Err(PipelineError::EmptyReply) => {
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "No analysis generated"}),
            ));
        }
        Err(err) => {
            tracing::error!(error = %err, "supervise endpoint failed");
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "Internal server error", "details": err.to_string()}),
            ));
        }
    }
}

async fn handle_final_review(
    req: FinalReviewRequest,
    gateway: SharedGateway,
) -> Result<impl Reply, Rejection> {
    let image = req.image_base64.unwrap_or_default();
    if image.trim().is_empty() {
        return Ok(bad_request("Final image is required"));
    }

    let original_task = req.original_task.unwrap_or_default();
    if original_task.trim().is_empty() {
        return Ok(bad_request("Original task is required"));
    }

    let model = req
        .interpreter_model
        .unwrap_or_else(|| return Config::get(ConfigKey::ReviewModel));
    let total_iterations = req.total_iterations.unwrap_or(1);

    let res = reviewer::review(&gateway, &image, &original_task, total_iterations, &model).await;

    match res {
        Ok(review) => {
            return Ok(reply_json(
                StatusCode::OK,
                &json!({
                    "success": true,
                    "review": review.review_text,
                    "scores": review.scores,
                    "publicationReadiness": review.publication_readiness,
                    "model": model,
                }),
            ));
        }
        Err(PipelineError::MissingCredential) => {
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "API key not configured"}),
            ));
        }
        Err(PipelineError::EmptyReply) => {
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "No review generated"}),
            ));
        }
        Err(PipelineError::Upstream { status, body }) => {
            return Ok(reply_json(
                upstream_status(status),
                &json!({"error": "Failed to generate review", "details": body}),
            ));
        }
        Err(err) => {
            tracing::error!(error = %err, "final-review endpoint failed");
            return Ok(reply_json(
                StatusCode::INTERNAL_SERVER_ERROR,
                &json!({"error": "Internal server error", "details": err.to_string()}),
            ));
        }
    }
}

async fn handle_health() -> Result<impl Reply, Rejection> {
    let api_key = if Config::get(ConfigKey::ApiKey).is_empty() {
        "NOT SET"
    } else {
        "configured"
    };

    return Ok(reply_json(
        StatusCode::OK,
        &json!({
            "status": "ok",
            "timestamp": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            "apiKey": api_key,
        }),
    ));
}

async fn handle_rejection(rejection: Rejection) -> Result<impl Reply, Rejection> {
    if rejection.is_not_found() {
        return Ok(reply_json(
            StatusCode::NOT_FOUND,
            &json!({"error": "Not found"}),
        ));
    }
    if rejection
        .find::<warp::reject::MethodNotAllowed>()
        .is_some()
    {
        return Ok(reply_json(
            StatusCode::METHOD_NOT_ALLOWED,
            &json!({"error": "Method not allowed"}),
        ));
    }
    if rejection.find::<warp::body::BodyDeserializeError>().is_some() {
        return Ok(reply_json(
            StatusCode::BAD_REQUEST,
            &json!({"error": "Invalid request body"}),
        ));
    }

    return Err(rejection);
}

pub fn routes(
    gateway: SharedGateway,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let with_gateway = warp::any().map(move || return gateway.clone());

    let interpret = warp::path("interpret")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_gateway.clone())
        .and_then(handle_interpret);

    let generate_image = warp::path("generate-image")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_gateway.clone())
        .and_then(handle_generate_image);

    let supervise = warp::path("supervise")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_gateway.clone())
        .and_then(handle_supervise);

    let final_review = warp::path("final-review")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::json())
        .and(with_gateway)
        .and_then(handle_final_review);

    let health = warp::path("health")
        .and(warp::path::end())
        .and(warp::get())
        .and_then(handle_health);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_headers(vec!["content-type"])
        .allow_methods(vec!["GET", "POST", "OPTIONS"]);

    return interpret
        .or(generate_image)
        .or(supervise)
        .or(final_review)
        .or(health)
        .recover(handle_rejection)
        .with(cors);
}

pub async fn serve() -> Result<()> {
    let gateway: SharedGateway = Arc::new(GatewayManager::get()?);

    if let Err(err) = gateway.health_check().await {
        tracing::warn!(error = %err, "gateway health check failed, calls will be rejected");
        eprintln!("Warning: {err}. Calls will fail until OPENROUTER_API_KEY is set.");
    }

    let host = Config::get(ConfigKey::ServerHost)
        .parse::<IpAddr>()
        .context("server host is not a valid IP address")?;
    let port = Config::server_port();

    tracing::debug!(host = %host, port = port, "starting http api");
    println!("Easel API listening on http://{host}:{port}");

    warp::serve(routes(gateway)).run((host, port)).await;

    return Ok(());
}
