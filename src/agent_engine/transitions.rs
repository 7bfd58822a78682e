// Fixed substring heuristics mapping a step's reasoning onto the next state.
use crate::agent_engine::state::TaskState;
use crate::llm::types::ActionKind;

struct Rule {
    from: TaskState,
    to: TaskState,
    /// Any of these in the lowercased thought fires the rule. Empty = always.
    needles: &'static [&'static str],
    /// Action kind that fires the rule regardless of the thought.
    on_action: Option<ActionKind>,
}

const RULES: &[Rule] = &[
    Rule {
        from: TaskState::Initializing,
        to: TaskState::Navigating,
        needles: &[],
        on_action: None,
    },
    Rule {
        from: TaskState::Navigating,
        to: TaskState::Searching,
        needles: &["search", "搜索"],
        on_action: None,
    },
    Rule {
        from: TaskState::Navigating,
        to: TaskState::ViewingDetail,
        needles: &["detail", "详情"],
        on_action: None,
    },
    Rule {
        from: TaskState::Searching,
        to: TaskState::Filtering,
        needles: &["results", "结果", "filter", "筛选"],
        on_action: None,
    },
    Rule {
        from: TaskState::Filtering,
        to: TaskState::ViewingDetail,
        needles: &["listing", "职位", "detail", "详情"],
        on_action: None,
    },
    Rule {
        from: TaskState::ViewingDetail,
        to: TaskState::InitiatingDialogue,
        needles: &["chat", "沟通", "contact", "联系"],
        on_action: None,
    },
    Rule {
        from: TaskState::InitiatingDialogue,
        to: TaskState::Conversing,
        needles: &["greeting", "打招呼", "message", "消息"],
        on_action: Some(ActionKind::Type),
    },
    Rule {
        from: TaskState::Conversing,
        to: TaskState::AwaitingResponse,
        needles: &["sent", "已发送", "wait", "等待"],
        on_action: None,
    },
    Rule {
        from: TaskState::AwaitingResponse,
        to: TaskState::Conversing,
        needles: &["replied", "回复了", "new message", "新消息"],
        on_action: None,
    },
    Rule {
        from: TaskState::AwaitingResponse,
        to: TaskState::Searching,
        needles: &["next listing", "next job", "下一个"],
        on_action: None,
    },
];

/// State to enter after a successful step, or `None` to stay put.
/// `Finish` is handled by the loop itself and never matched here.
pub fn infer_transition(current: TaskState, thought: &str, action: ActionKind) -> Option<TaskState> {
    let lower = thought.to_lowercase();
    RULES
        .iter()
        .filter(|r| r.from == current)
        .find(|r| {
            r.needles.is_empty()
                || r.on_action == Some(action)
                || r.needles.iter().any(|n| lower.contains(n))
        })
        .map(|r| r.to)
}
