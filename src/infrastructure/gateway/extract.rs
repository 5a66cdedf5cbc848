#[cfg(test)]
#[path = "extract_test.rs"]
mod tests;

use serde_json::Value;

use crate::domain::models::ChatReply;

/// Image-bearing reply shapes vary per model, so extraction is an ordered
/// list of strategies. The order is a priority list, not a preference:
/// the first strategy that yields a value short-circuits the scan.
type Strategy = fn(&Value) -> Option<String>;

const STRATEGIES: [(&str, Strategy); 5] = [
    ("message.images.image_url", from_images_image_url),
    ("message.images.url", from_images_url),
    ("message.content.parts", from_content_parts),
    ("message.content.string", from_content_string),
    ("reply.alternates", from_alternates),
];

pub fn extract_image(reply: &ChatReply) -> Option<String> {
    for (name, strategy) in STRATEGIES {
        if let Some(image) = strategy(reply.raw()) {
            tracing::debug!(strategy = name, "image extracted");
            return Some(image);
        }
    }

    return None;
}

fn message(raw: &Value) -> Option<&Value> {
    return raw.get("choices")?.get(0)?.get("message");
}

fn from_images_image_url(raw: &Value) -> Option<String> {
    let url = message(raw)?
        .get("images")?
        .get(0)?
        .get("image_url")?
        .get("url")?
        .as_str()?;

    return Some(url.to_string());
}

fn from_images_url(raw: &Value) -> Option<String> {
    let url = message(raw)?.get("images")?.get(0)?.get("url")?.as_str()?;

    return Some(url.to_string());
}

fn from_content_parts(raw: &Value) -> Option<String> {
    let parts = message(raw)?.get("content")?.as_array()?;

    for part in parts {
        let kind = match part.get("type").and_then(|v| return v.as_str()) {
            Some(kind) => kind,
            None => continue,
        };

        match kind {
            "image_url" => {
                let url = part
                    .get("image_url")
                    .and_then(|v| return v.get("url"))
                    .and_then(|v| return v.as_str());
                if let Some(url) = url {
                    return Some(url.to_string());
                }
            }
            "image" => {
                if let Some(url) = part.get("url").and_then(|v| return v.as_str()) {
                    return Some(url.to_string());
                }
                if let Some(data) = part.get("data").and_then(|v| return v.as_str()) {
                    return Some(format!("data:image/png;base64,{data}"));
                }
            }
            _ => continue,
        }
    }

    return None;
}

fn from_content_string(raw: &Value) -> Option<String> {
    let content = message(raw)?.get("content")?.as_str()?;

    if content.starts_with("data:image/") || content.starts_with("http") {
        return Some(content.to_string());
    }

    return None;
}

fn from_alternates(raw: &Value) -> Option<String> {
    if let Some(image) = raw.get("image").and_then(|v| return v.as_str()) {
        return Some(image.to_string());
    }

    let url = raw.get("data")?.get(0)?.get("url")?.as_str()?;

    return Some(url.to_string());
}
