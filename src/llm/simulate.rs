// Network-free stand-in for the inference service.
//
// Output depends only on the instruction text, so identical instructions
// always produce identical responses.
use crate::llm::types::{Action, ActionResponse, ScrollDirection};
use crate::perception::types::RelativePoint;

const FINISH_WORDS: &[&str] = &["finish", "complete", "done", "完成", "结束"];
const CLICK_WORDS: &[&str] = &["click", "tap", "open", "点击", "打开", "选择"];
const TYPE_WORDS: &[&str] = &["type", "enter text", "input", "输入", "填写"];
const SCROLL_WORDS: &[&str] = &["scroll", "browse", "滚动", "浏览", "下滑"];
const KEY_WORDS: &[&str] = &["press", "按下", "按键"];

const SIMULATED_TEXT: &str = "hello";

/// 32-bit FNV-1a; stable across runs and platforms.
fn fnv1a(text: &str) -> u32 {
    text.bytes().fold(0x811c_9dc5u32, |h, b| (h ^ b as u32).wrapping_mul(0x0100_0193))
}

/// First `"…"`, `“…”` or `「…」` quoted span in `text`.
pub(crate) fn first_quoted(text: &str) -> Option<&str> {
    for (open, close) in [('"', '"'), ('“', '”'), ('「', '」')] {
        if let Some(start) = text.find(open) {
            let rest = &text[start + open.len_utf8()..];
            if let Some(end) = rest.find(close) {
                let quoted = rest[..end].trim();
                if !quoted.is_empty() {
                    return Some(quoted);
                }
            }
        }
    }
    None
}

/// `text` with every quoted span removed. Quoted spans carry caller data
/// such as search keywords and must not steer the action choice.
fn unquoted(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut close = None;
    for c in text.chars() {
        match close {
            Some(end) if c == end => close = None,
            Some(_) => {}
            None => match c {
                '"' => close = Some('"'),
                '“' => close = Some('”'),
                '「' => close = Some('」'),
                _ => out.push(c),
            },
        }
    }
    out
}

fn mentions(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| text.contains(w))
}

/// Deterministic response derived from keywords in the unquoted part of
/// `instruction`.
pub fn simulate(instruction: &str) -> ActionResponse {
    let lower = unquoted(instruction).to_lowercase();

    let action = if mentions(&lower, FINISH_WORDS) {
        Action::Finish {
            summary: Some("simulated completion".into()),
        }
    } else if mentions(&lower, CLICK_WORDS) {
        let h = fnv1a(instruction);
        Action::Click {
            point: Some(RelativePoint::new(
                100 + (h % 801) as i32,
                100 + ((h >> 16) % 801) as i32,
            )),
        }
    } else if mentions(&lower, TYPE_WORDS) {
        Action::Type {
            text: first_quoted(instruction).unwrap_or(SIMULATED_TEXT).to_string(),
            needs_enter: true,
        }
    } else if mentions(&lower, SCROLL_WORDS) {
        Action::Scroll {
            direction: ScrollDirection::Down,
            amount: 3,
        }
    } else if mentions(&lower, KEY_WORDS) {
        Action::KeyPress { key: "Enter".into() }
    } else {
        Action::Scroll {
            direction: ScrollDirection::Down,
            amount: 1,
        }
    };

    ActionResponse {
        thought: format!("[simulated] {instruction}"),
        action,
        simulated: true,
    }
}
