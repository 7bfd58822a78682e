use serde::{Deserialize, Serialize};

use crate::perception::types::RelativePoint;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Pc,
    Mobile,
}

impl DeviceType {
    pub fn parse(s: &str) -> Self {
        if s.eq_ignore_ascii_case("mobile") {
            DeviceType::Mobile
        } else {
            DeviceType::Pc
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
    Left,
    Right,
}

impl ScrollDirection {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "up" => Some(ScrollDirection::Up),
            "down" => Some(ScrollDirection::Down),
            "left" => Some(ScrollDirection::Left),
            "right" => Some(ScrollDirection::Right),
            _ => None,
        }
    }
}

/// Closed set of actions the service may ask for.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Action {
    /// Point is absent when the service sent no usable coordinates.
    Click { point: Option<RelativePoint> },
    Type { text: String, needs_enter: bool },
    Scroll { direction: ScrollDirection, amount: u32 },
    KeyPress { key: String },
    Finish { summary: Option<String> },
    Fail { reason: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    Click,
    Type,
    Scroll,
    KeyPress,
    Finish,
    Fail,
}

impl Action {
    pub fn kind(&self) -> ActionKind {
        match self {
            Action::Click { .. } => ActionKind::Click,
            Action::Type { .. } => ActionKind::Type,
            Action::Scroll { .. } => ActionKind::Scroll,
            Action::KeyPress { .. } => ActionKind::KeyPress,
            Action::Finish { .. } => ActionKind::Finish,
            Action::Fail { .. } => ActionKind::Fail,
        }
    }

    /// Parameter bag in wire shape, as recorded in history.
    pub fn parameters(&self) -> serde_json::Value {
        match self {
            Action::Click { point: Some(p) } => serde_json::json!({ "x": p.x, "y": p.y }),
            Action::Click { point: None } => serde_json::json!({}),
            Action::Type { text, needs_enter } => {
                serde_json::json!({ "text": text, "needs_enter": needs_enter })
            }
            Action::Scroll { direction, amount } => {
                serde_json::json!({ "direction": direction, "amount": amount })
            }
            Action::KeyPress { key } => serde_json::json!({ "key": key }),
            Action::Finish { summary } => serde_json::json!({ "summary": summary }),
            Action::Fail { reason } => serde_json::json!({ "reason": reason }),
        }
    }
}

/// Normalized output of one inference call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub thought: String,
    pub action: Action,
    /// True when produced locally instead of by the live service.
    #[serde(default)]
    pub simulated: bool,
}

impl ActionResponse {
    pub fn fail(thought: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            thought: thought.into(),
            action: Action::Fail { reason: reason.into() },
            simulated: false,
        }
    }
}

/// One past step as sent to the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryItem {
    pub step: u32,
    pub action: ActionKind,
    pub parameters: serde_json::Value,
    pub thought: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Request body of the vision-to-action service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRequest {
    /// Base64 data URL of the frame, or empty when no frame is sent.
    pub image: String,
    pub instruction: String,
    pub history: Vec<HistoryItem>,
    pub device_type: DeviceType,
}
