pub mod extract;
pub mod openrouter;

use anyhow::Result;

use crate::domain::models::GatewayBox;

pub struct GatewayManager {}

impl GatewayManager {
    pub fn get() -> Result<GatewayBox> {
        return Ok(Box::<openrouter::OpenRouter>::default());
    }
}
