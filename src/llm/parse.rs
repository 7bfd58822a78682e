//! Defensive normalization of service output into [`ActionResponse`].
//!
//! Accepts the plain wire shape `{thought, action, parameters}` or an
//! OpenAI-style chat envelope whose message text carries that object,
//! optionally inside a markdown fence.
use serde_json::Value;

use crate::errors::{PilotError, PilotResult};
use crate::llm::types::{Action, ActionResponse, ScrollDirection};
use crate::perception::types::RelativePoint;

const DEFAULT_SCROLL_AMOUNT: u32 = 3;
/// Wheel notches accepted per scroll; larger requests are clamped.
pub const MAX_SCROLL_AMOUNT: u32 = 50;

/// Parse a raw response body.
///
/// Errors only when no JSON object can be found at all; anything that is
/// JSON but not a valid action becomes [`Action::Fail`].
pub fn parse_body(body: &str) -> PilotResult<ActionResponse> {
    let value = extract_json(body)
        .ok_or_else(|| PilotError::Parse(format!("no JSON object in response ({} bytes)", body.len())))?;
    parse_value(&value)
}

fn extract_json(text: &str) -> Option<Value> {
    let trimmed = text
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let Ok(v) = serde_json::from_str::<Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }
    // Prose around the object: take the outermost braces.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str::<Value>(&trimmed[start..=end])
        .ok()
        .filter(Value::is_object)
}

pub fn parse_value(value: &Value) -> PilotResult<ActionResponse> {
    if let Some(content) = value["choices"][0]["message"]["content"].as_str() {
        return parse_body(content);
    }
    Ok(normalize(value))
}

fn normalize(value: &Value) -> ActionResponse {
    let thought = value["thought"]
        .as_str()
        .or_else(|| value["reasoning"].as_str())
        .unwrap_or_default()
        .to_string();

    let params = match value.get("parameters") {
        Some(p) if p.is_object() => p,
        _ => value,
    };

    let Some(raw_action) = value["action"].as_str() else {
        tracing::warn!("response has no action field, normalizing to FAIL");
        return ActionResponse::fail(thought, "missing action");
    };

    let action = match raw_action.trim().to_ascii_uppercase().as_str() {
        "CLICK" | "POINTER_CLICK" | "TAP" => Action::Click {
            point: read_point(params),
        },
        "TYPE" | "TEXT_INPUT" | "INPUT" => Action::Type {
            text: params["text"].as_str().unwrap_or_default().to_string(),
            needs_enter: params["needs_enter"].as_bool().unwrap_or(false),
        },
        "SCROLL" | "SWIPE" => Action::Scroll {
            direction: params["direction"]
                .as_str()
                .and_then(ScrollDirection::parse)
                .unwrap_or(ScrollDirection::Down),
            amount: read_amount(&params["amount"]).unwrap_or(DEFAULT_SCROLL_AMOUNT),
        },
        "KEY_PRESS" | "KEY" | "PRESS" => Action::KeyPress {
            key: params["key"].as_str().unwrap_or_default().to_string(),
        },
        "FINISH" | "DONE" => Action::Finish {
            summary: params["summary"]
                .as_str()
                .or_else(|| params["message"].as_str())
                .map(str::to_string),
        },
        "FAIL" => Action::Fail {
            reason: params["reason"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| thought.clone()),
        },
        other => {
            tracing::warn!(action = other, "unknown action, normalizing to FAIL");
            Action::Fail {
                reason: format!("unknown action '{other}'"),
            }
        }
    };

    ActionResponse {
        thought,
        action,
        simulated: false,
    }
}

/// Coordinates must be JSON numbers; anything else counts as absent.
fn read_point(params: &Value) -> Option<RelativePoint> {
    let num = |v: &Value| v.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i32);
    if let (Some(x), Some(y)) = (num(&params["x"]), num(&params["y"])) {
        return Some(RelativePoint::new(x, y));
    }
    for key in ["element", "point"] {
        if let Some([x, y]) = params[key].as_array().map(Vec::as_slice) {
            if let (Some(x), Some(y)) = (num(x), num(y)) {
                return Some(RelativePoint::new(x, y));
            }
        }
    }
    None
}

fn read_amount(v: &Value) -> Option<u32> {
    let n = match v.as_u64() {
        Some(n) => n,
        None => v
            .as_f64()
            .filter(|f| f.is_finite() && *f >= 0.0)
            .map(|f| f.round() as u64)?,
    };
    Some(n.min(MAX_SCROLL_AMOUNT as u64) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_wire_shape() {
        let r = parse_body(
            r#"{"thought":"open the listing","action":"CLICK","parameters":{"x":420,"y":317.6}}"#,
        )
        .unwrap();
        assert_eq!(r.thought, "open the listing");
        assert_eq!(
            r.action,
            Action::Click {
                point: Some(RelativePoint::new(420, 318))
            }
        );
    }

    #[test]
    fn chat_envelope_with_fenced_json() {
        let body = serde_json::json!({
            "choices": [{
                "message": {
                    "content": "Sure.\n```json\n{\"thought\":\"type it\",\"action\":\"TYPE\",\"parameters\":{\"text\":\"rust\",\"needs_enter\":true}}\n```"
                }
            }]
        })
        .to_string();
        let r = parse_body(&body).unwrap();
        assert_eq!(
            r.action,
            Action::Type {
                text: "rust".into(),
                needs_enter: true
            }
        );
    }

    #[test]
    fn unknown_action_normalizes_to_fail() {
        let r = parse_body(r#"{"thought":"hmm","action":"LAUNCH_ROCKET"}"#).unwrap();
        assert!(matches!(r.action, Action::Fail { .. }));

        let r = parse_body(r#"{"thought":"no action here"}"#).unwrap();
        assert!(matches!(r.action, Action::Fail { .. }));
    }

    #[test]
    fn non_numeric_parameters_are_dropped() {
        let r = parse_body(r#"{"action":"click","parameters":{"x":"left","y":10}}"#).unwrap();
        assert_eq!(r.action, Action::Click { point: None });

        let r = parse_body(r#"{"action":"SCROLL","parameters":{"direction":"sideways","amount":"lots"}}"#)
            .unwrap();
        assert_eq!(
            r.action,
            Action::Scroll {
                direction: ScrollDirection::Down,
                amount: DEFAULT_SCROLL_AMOUNT
            }
        );
    }

    #[test]
    fn scroll_amount_is_clamped() {
        let r = parse_body(r#"{"action":"SCROLL","parameters":{"direction":"down","amount":3000000000}}"#)
            .unwrap();
        assert_eq!(
            r.action,
            Action::Scroll {
                direction: ScrollDirection::Down,
                amount: MAX_SCROLL_AMOUNT
            }
        );
        let r = parse_body(r#"{"action":"SCROLL","parameters":{"direction":"up","amount":1e30}}"#).unwrap();
        assert_eq!(
            r.action,
            Action::Scroll {
                direction: ScrollDirection::Up,
                amount: MAX_SCROLL_AMOUNT
            }
        );
    }

    #[test]
    fn element_array_is_accepted() {
        let r = parse_body(r#"{"action":"TAP","parameters":{"element":[120,880]}}"#).unwrap();
        assert_eq!(
            r.action,
            Action::Click {
                point: Some(RelativePoint::new(120, 880))
            }
        );
    }

    #[test]
    fn prose_without_json_is_an_error() {
        assert!(parse_body("I am sorry, I cannot help with that.").is_err());
        assert!(parse_body("").is_err());
    }
}
