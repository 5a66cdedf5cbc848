#[cfg(test)]
#[path = "images_test.rs"]
mod tests;

use std::fs;
use std::path;

use anyhow::bail;
use anyhow::Context;
use anyhow::Result;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Accepts raw base64 or an already-prefixed data URI and returns a data
/// URI. Pass-through for http(s) URLs.
pub fn normalize_data_uri(raw: &str) -> String {
    if raw.starts_with("data:") || raw.starts_with("http") {
        return raw.to_string();
    }
    return format!("data:image/png;base64,{raw}");
}

/// True for strings a browser could render directly as an image source.
pub fn looks_like_image(value: &str) -> bool {
    return value.starts_with("data:image/")
        || value.starts_with("http://")
        || value.starts_with("https://");
}

/// Writes a data-URI image to `<dir>/academic-figure-v<version>.png` and
/// returns the path. Remote URLs are not fetched; the caller should show
/// them instead.
pub fn save_version(image: &str, dir: &path::Path, version: usize) -> Result<path::PathBuf> {
    let encoded = match image.split("base64,").nth(1) {
        Some(encoded) => encoded,
        None => bail!("image v{version} is not a data URI and cannot be saved locally"),
    };

    let bytes = BASE64
        .decode(encoded)
        .with_context(|| return format!("image v{version} carries invalid base64 data"))?;

    fs::create_dir_all(dir)?;
    let path = dir.join(format!("academic-figure-v{version}.png"));
    fs::write(&path, bytes)?;

    return Ok(path);
}
