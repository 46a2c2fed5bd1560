use std::fmt;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};

use crate::game::state::{FlagValue, SessionState, StateDelta};

/// Token in passage text that is replaced by the player's display name.
pub const NAME_PLACEHOLDER: &str = "{playerName}";

/// Identifier of a passage. Always positive in a validated graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PassageId(pub u32);

impl PassageId {
    /// Every playthrough begins here.
    pub const ENTRY: PassageId = PassageId(1);

    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for PassageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where an option leads.
///
/// Story files spell this as the integer `nextText`: a positive value names
/// the next passage, zero or any negative value ends the playthrough.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum Transition {
    Goto(PassageId),
    End,
}

impl TryFrom<i64> for Transition {
    type Error = String;

    fn try_from(raw: i64) -> Result<Self, Self::Error> {
        if raw <= 0 {
            return Ok(Transition::End);
        }
        u32::try_from(raw)
            .map(|id| Transition::Goto(PassageId(id)))
            .map_err(|_| format!("nextText {raw} is out of range"))
    }
}

impl From<Transition> for i64 {
    fn from(transition: Transition) -> Self {
        match transition {
            Transition::Goto(id) => i64::from(id.0),
            Transition::End => -1,
        }
    }
}

/// Declarative gate on an option's visibility.
///
/// ```json
/// {"flag": "device", "equals": true}
/// {"all": [{"flag": "key", "present": true}, {"not": {"flag": "door", "equals": "open"}}]}
/// ```
///
/// Each object must spell exactly one form; mixed or unknown keys are rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Condition {
    FlagEquals { flag: String, equals: FlagValue },
    FlagPresent { flag: String, present: bool },
    All { all: Vec<Condition> },
    Any { any: Vec<Condition> },
    Not { not: Box<Condition> },
}

/// Every key any condition form may use.
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCondition {
    flag: Option<String>,
    equals: Option<FlagValue>,
    present: Option<bool>,
    all: Option<Vec<Condition>>,
    any: Option<Vec<Condition>>,
    not: Option<Box<Condition>>,
}

impl TryFrom<RawCondition> for Condition {
    type Error = &'static str;

    fn try_from(raw: RawCondition) -> Result<Self, Self::Error> {
        match raw {
            RawCondition {
                flag: Some(flag),
                equals: Some(equals),
                present: None,
                all: None,
                any: None,
                not: None,
            } => Ok(Condition::FlagEquals { flag, equals }),
            RawCondition {
                flag: Some(flag),
                equals: None,
                present: Some(present),
                all: None,
                any: None,
                not: None,
            } => Ok(Condition::FlagPresent { flag, present }),
            RawCondition {
                flag: None,
                equals: None,
                present: None,
                all: Some(all),
                any: None,
                not: None,
            } => Ok(Condition::All { all }),
            RawCondition {
                flag: None,
                equals: None,
                present: None,
                all: None,
                any: Some(any),
                not: None,
            } => Ok(Condition::Any { any }),
            RawCondition {
                flag: None,
                equals: None,
                present: None,
                all: None,
                any: None,
                not: Some(not),
            } => Ok(Condition::Not { not }),
            _ => Err("condition must be exactly one of {flag, equals}, {flag, present}, \
                 {all}, {any} or {not}"),
        }
    }
}

impl<'de> Deserialize<'de> for Condition {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = RawCondition::deserialize(deserializer)?;
        Condition::try_from(raw).map_err(D::Error::custom)
    }
}

impl Condition {
    pub fn flag_equals(flag: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        Condition::FlagEquals {
            flag: flag.into(),
            equals: value.into(),
        }
    }

    pub fn flag_present(flag: impl Into<String>, present: bool) -> Self {
        Condition::FlagPresent {
            flag: flag.into(),
            present,
        }
    }

    /// Pure; an unset flag equals nothing.
    pub fn evaluate(&self, state: &SessionState) -> bool {
        match self {
            Condition::FlagEquals { flag, equals } => state.get(flag) == Some(equals),
            Condition::FlagPresent { flag, present } => state.contains(flag) == *present,
            Condition::All { all } => all.iter().all(|c| c.evaluate(state)),
            Condition::Any { any } => any.iter().any(|c| c.evaluate(state)),
            Condition::Not { not } => !not.evaluate(state),
        }
    }
}

/// A choice attached to a passage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoryOption {
    /// Label shown to the player.
    pub text: String,
    pub next_text: Transition,
    /// When present, the option is only offered while this holds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_state: Option<Condition>,
    /// Merged into session state when the option is taken.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set_state: Option<StateDelta>,
}

impl StoryOption {
    pub fn new(text: impl Into<String>, next_text: Transition) -> Self {
        Self {
            text: text.into(),
            next_text,
            required_state: None,
            set_state: None,
        }
    }

    pub fn goto(text: impl Into<String>, id: u32) -> Self {
        Self::new(text, Transition::Goto(PassageId(id)))
    }

    pub fn end(text: impl Into<String>) -> Self {
        Self::new(text, Transition::End)
    }

    pub fn requires(mut self, condition: Condition) -> Self {
        self.required_state = Some(condition);
        self
    }

    pub fn sets(mut self, flag: impl Into<String>, value: impl Into<FlagValue>) -> Self {
        self.set_state
            .get_or_insert_with(StateDelta::new)
            .insert(flag.into(), value.into());
        self
    }

    pub fn is_visible(&self, state: &SessionState) -> bool {
        self.required_state
            .as_ref()
            .map_or(true, |condition| condition.evaluate(state))
    }
}

/// A single node in the story graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Passage {
    pub id: PassageId,
    /// Body text; may contain [`NAME_PLACEHOLDER`].
    pub text: String,
    /// Display order is significant.
    #[serde(default)]
    pub options: Vec<StoryOption>,
}

impl Passage {
    pub fn new(id: u32, text: impl Into<String>, options: Vec<StoryOption>) -> Self {
        Self {
            id: PassageId(id),
            text: text.into(),
            options,
        }
    }

    /// Substitutes the first placeholder occurrence with `player_name`.
    pub fn render_text(&self, player_name: &str) -> String {
        self.text.replacen(NAME_PLACEHOLDER, player_name, 1)
    }
}
