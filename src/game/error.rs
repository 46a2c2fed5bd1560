use thiserror::Error;

use crate::game::node::PassageId;

/// The story graph is inconsistent. This is an authoring bug, never a
/// player error, so nothing retries or falls back on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContentError {
    #[error("passage {0} does not exist in the story graph")]
    UnknownPassage(PassageId),
    #[error("passage id {0} is defined more than once")]
    DuplicatePassage(PassageId),
    #[error("passage id {0} is not a positive integer")]
    InvalidPassageId(PassageId),
    #[error("story graph has no entry passage (id {})", PassageId::ENTRY)]
    MissingEntry,
    #[error("passage {from}, option {option}: transition to unknown passage {to}")]
    DanglingTransition {
        from: PassageId,
        option: usize,
        to: PassageId,
    },
}

/// The caller asked for a choice the engine cannot accept right now.
/// Rejected without touching session state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidChoiceError {
    #[error("no playthrough is awaiting a choice")]
    NotAwaitingChoice,
    #[error("choice refers to passage {got}, but the current passage is {expected}")]
    StalePassage {
        expected: PassageId,
        got: PassageId,
    },
    #[error("passage {passage} has no option #{index}")]
    NoSuchOption { passage: PassageId, index: usize },
    #[error("option #{index} of passage {passage} is not available")]
    Hidden { passage: PassageId, index: usize },
}

#[derive(Debug, Error)]
pub enum NarrativeError {
    #[error(transparent)]
    Content(#[from] ContentError),
    #[error(transparent)]
    InvalidChoice(#[from] InvalidChoiceError),
}

#[derive(Debug, Error)]
pub enum StoryLoadError {
    #[error("failed to parse story JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("story content is inconsistent: {0}")]
    Content(#[from] ContentError),
}
