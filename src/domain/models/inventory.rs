#[cfg(test)]
#[path = "inventory_test.rs"]
mod tests;

use serde_derive::Deserialize;
use serde_derive::Serialize;
use serde_json::Map;
use serde_json::Value;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ElementStatus {
    Correct,
    NeedsFix,
}

/// Coordinates in percentage units, 0-100, origin at the top-left.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x_range: Vec<f64>,
    #[serde(default)]
    pub y_range: Vec<f64>,
    #[serde(default)]
    pub center: Vec<f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub style: Option<Value>,
    #[serde(default)]
    pub content: Vec<String>,
    #[serde(default)]
    pub sub_elements: Option<Value>,
    pub status: ElementStatus,
    #[serde(default)]
    pub issues: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub element_id: Option<String>,
    #[serde(default)]
    pub position: Option<Position>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Connection {
    pub id: String,
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub from: Endpoint,
    #[serde(default)]
    pub to: Endpoint,
    #[serde(default)]
    pub style: Option<Value>,
    #[serde(default)]
    pub label: Option<String>,
    pub status: ElementStatus,
    #[serde(default)]
    pub issues: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TextElement {
    pub id: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub position: Option<Position>,
    #[serde(default)]
    pub orientation: Option<String>,
    #[serde(default)]
    pub style: Option<Value>,
    pub status: ElementStatus,
    #[serde(default)]
    pub issues: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Background {
    #[serde(default)]
    pub color: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Phase A's structured catalog of everything visible in the image. The
/// `blocks` field is deliberately mandatory: a reply without it is not an
/// inventory, no matter how much other JSON it contains.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(default)]
    pub coordinate_system: String,
    pub blocks: Vec<Block>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub text_elements: Vec<TextElement>,
    #[serde(default)]
    pub background: Option<Background>,
    #[serde(default)]
    pub summary: Map<String, Value>,
}

const UNSPECIFIED_ISSUE: &str = "flagged by the supervisor without detail";

fn normalize_element(status: &mut ElementStatus, issues: &mut Vec<String>) {
    if *status == ElementStatus::Correct && !issues.is_empty() {
        *status = ElementStatus::NeedsFix;
    }
    if *status == ElementStatus::NeedsFix && issues.is_empty() {
        issues.push(UNSPECIFIED_ISSUE.to_string());
    }
}

impl Inventory {
    /// Restores the status/issues invariant on model output: an element is
    /// NEEDS_FIX iff it carries at least one issue. Models occasionally
    /// violate it in both directions.
    pub fn normalize(&mut self) {
        for block in self.blocks.iter_mut() {
            normalize_element(&mut block.status, &mut block.issues);
        }
        for connection in self.connections.iter_mut() {
            normalize_element(&mut connection.status, &mut connection.issues);
        }
        for text in self.text_elements.iter_mut() {
            normalize_element(&mut text.status, &mut text.issues);
        }
    }

    pub fn needs_fix_count(&self) -> usize {
        let blocks = self
            .blocks
            .iter()
            .filter(|e| return e.status == ElementStatus::NeedsFix)
            .count();
        let connections = self
            .connections
            .iter()
            .filter(|e| return e.status == ElementStatus::NeedsFix)
            .count();
        let texts = self
            .text_elements
            .iter()
            .filter(|e| return e.status == ElementStatus::NeedsFix)
            .count();

        return blocks + connections + texts;
    }

    pub fn element_count(&self) -> usize {
        return self.blocks.len() + self.connections.len() + self.text_elements.len();
    }
}
