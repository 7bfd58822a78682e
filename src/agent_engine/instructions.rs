// Natural-language instruction sent with each step, keyed by task state.
// Goal values are always quoted so they stay out of keyword matching.
use crate::agent_engine::state::{TaskGoal, TaskState};

pub fn instruction_for(state: TaskState, goal: &TaskGoal, base_url: &str) -> String {
    match state {
        TaskState::Idle | TaskState::Initializing => {
            format!("Click the search box on the job board home page at \"{base_url}\".")
        }
        TaskState::Navigating => format!(
            "Click the search box and prepare to search for \"{}\" jobs in \"{}\".",
            goal.keywords, goal.city
        ),
        TaskState::Searching => format!(
            "Type \"{}\" into the search box and press Enter to show the results.",
            goal.keywords
        ),
        TaskState::Filtering => format!(
            "Scroll the \"{}\" results and narrow them by city \"{}\"; look for a matching listing.",
            goal.keywords, goal.city
        ),
        TaskState::ViewingDetail => {
            "Click the most relevant listing to open its detail page, then look for the chat button."
                .to_string()
        }
        TaskState::InitiatingDialogue => {
            "Click the chat button to start a conversation and prepare a greeting.".to_string()
        }
        TaskState::Conversing => format!(
            "Type \"{}\" as the first message and send it, then wait for a reply.",
            goal.greeting
        ),
        TaskState::AwaitingResponse => {
            "Scroll the conversation to check for a reply; if none, move on to the next listing."
                .to_string()
        }
        // Never asked for in practice: the loop exits on these.
        TaskState::Completed | TaskState::Failed | TaskState::Paused => {
            "The task is complete. Finish.".to_string()
        }
    }
}
