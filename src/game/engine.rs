use log::{debug, info};

use crate::game::error::{ContentError, InvalidChoiceError, NarrativeError};
use crate::game::node::{PassageId, StoryOption, Transition};
use crate::game::state::SessionState;
use crate::game::tree::StoryGraph;

/// Stable handle to an option: the passage it belongs to and its position in
/// that passage's full option list (not the filtered list).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OptionRef {
    pub passage: PassageId,
    pub index: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptionView {
    pub label: String,
    pub option: OptionRef,
}

/// What the front end should draw for the current passage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct View {
    pub passage: PassageId,
    /// Passage text with the player's name substituted.
    pub text: String,
    /// Visible options in display order.
    pub options: Vec<OptionView>,
}

impl View {
    /// Nothing left to pick; the front end treats this like an ending.
    pub fn is_dead_end(&self) -> bool {
        self.options.is_empty()
    }
}

/// Result of a successful [`Engine::choose`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    Continue(View),
    Ended,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    AwaitingChoice {
        passage: PassageId,
        state: SessionState,
    },
    Ended,
}

/// Options of `passage` that are visible under `state`, with their indices in
/// the passage's full option list. Pure.
pub fn visible_options<'g>(
    graph: &'g StoryGraph,
    passage: PassageId,
    state: &SessionState,
) -> Result<Vec<(usize, &'g StoryOption)>, ContentError> {
    let passage = graph.find_passage(passage)?;
    Ok(passage
        .options
        .iter()
        .enumerate()
        .filter(|(_, option)| option.is_visible(state))
        .collect())
}

/// One playthrough over a shared story graph.
///
/// Session state lives inside the engine and nowhere else, so independent
/// engines over the same graph never interfere.
pub struct Engine<'g> {
    graph: &'g StoryGraph,
    phase: Phase,
    player_name: String,
}

impl<'g> Engine<'g> {
    pub fn new(graph: &'g StoryGraph) -> Self {
        Self {
            graph,
            phase: Phase::NotStarted,
            player_name: String::new(),
        }
    }

    pub fn with_player_name(mut self, name: impl Into<String>) -> Self {
        self.player_name = name.into();
        self
    }

    pub fn set_player_name(&mut self, name: impl Into<String>) {
        self.player_name = name.into();
    }

    pub fn player_name(&self) -> &str {
        &self.player_name
    }

    pub fn graph(&self) -> &'g StoryGraph {
        self.graph
    }

    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    pub fn is_ended(&self) -> bool {
        matches!(self.phase, Phase::Ended)
    }

    pub fn current_passage(&self) -> Option<PassageId> {
        match &self.phase {
            Phase::AwaitingChoice { passage, .. } => Some(*passage),
            _ => None,
        }
    }

    pub fn session_state(&self) -> Option<&SessionState> {
        match &self.phase {
            Phase::AwaitingChoice { state, .. } => Some(state),
            _ => None,
        }
    }

    /// Begin, or restart from any phase, with empty state at the entry passage.
    pub fn start(&mut self) -> Result<View, ContentError> {
        let entry = self.graph.find_passage(PassageId::ENTRY)?;
        self.phase = Phase::AwaitingChoice {
            passage: entry.id,
            state: SessionState::new(),
        };
        info!("Playthrough started at passage {}", entry.id);
        self.render(entry.id, &SessionState::new())
    }

    pub fn visible_options(
        &self,
        passage: PassageId,
        state: &SessionState,
    ) -> Result<Vec<(usize, &'g StoryOption)>, ContentError> {
        visible_options(self.graph, passage, state)
    }

    /// Re-render the current passage without changing anything.
    pub fn view(&self) -> Result<View, NarrativeError> {
        match &self.phase {
            Phase::AwaitingChoice { passage, state } => Ok(self.render(*passage, state)?),
            _ => Err(InvalidChoiceError::NotAwaitingChoice.into()),
        }
    }

    /// Take an option. Rejected choices leave the engine untouched.
    pub fn choose(&mut self, choice: OptionRef) -> Result<Step, NarrativeError> {
        let graph = self.graph;
        let (from, option) = match &self.phase {
            Phase::AwaitingChoice { passage, state } => {
                if choice.passage != *passage {
                    return Err(InvalidChoiceError::StalePassage {
                        expected: *passage,
                        got: choice.passage,
                    }
                    .into());
                }
                let current = graph.find_passage(*passage)?;
                let option = current.options.get(choice.index).ok_or(
                    InvalidChoiceError::NoSuchOption {
                        passage: *passage,
                        index: choice.index,
                    },
                )?;
                if !option.is_visible(state) {
                    return Err(InvalidChoiceError::Hidden {
                        passage: *passage,
                        index: choice.index,
                    }
                    .into());
                }
                (*passage, option)
            }
            _ => return Err(InvalidChoiceError::NotAwaitingChoice.into()),
        };

        let next = match option.next_text {
            Transition::End => {
                info!("Transition: {from} -> end (\"{}\")", option.text);
                self.phase = Phase::Ended;
                return Ok(Step::Ended);
            }
            Transition::Goto(next) => next,
        };

        // Fail before mutating so a corrupt graph cannot leave half-applied state.
        graph.find_passage(next)?;

        if let Phase::AwaitingChoice { passage, state } = &mut self.phase {
            if let Some(delta) = &option.set_state {
                state.merge(delta);
                debug!("Merged {delta:?}; session state is now {state}");
            }
            *passage = next;
        }
        info!("Transition: {from} -> {next} (\"{}\")", option.text);

        Ok(Step::Continue(self.view()?))
    }

    fn render(&self, passage: PassageId, state: &SessionState) -> Result<View, ContentError> {
        let node = self.graph.find_passage(passage)?;
        let options: Vec<OptionView> = visible_options(self.graph, passage, state)?
            .into_iter()
            .map(|(index, option)| OptionView {
                label: option.text.clone(),
                option: OptionRef { passage, index },
            })
            .collect();
        debug!(
            "Passage {passage}: {} of {} options visible under {state}",
            options.len(),
            node.options.len()
        );
        Ok(View {
            passage,
            text: node.render_text(&self.player_name),
            options,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::node::{Condition, Passage, StoryOption};

    /// Passage 1: Take (sets device) / Leave. Passage 2: gated "Use device"
    /// (swaps device for sword) plus an always-visible path. Passage 3: end.
    fn scenario_graph() -> StoryGraph {
        StoryGraph::new(
            "scenario",
            vec![
                Passage::new(
                    1,
                    "Hello {playerName}. A device lies here.",
                    vec![
                        StoryOption::goto("Take", 2).sets("device", true),
                        StoryOption::goto("Leave", 2),
                    ],
                ),
                Passage::new(
                    2,
                    "A merchant waves.",
                    vec![
                        StoryOption::goto("Trade the device for a sword", 3)
                            .requires(Condition::flag_equals("device", true))
                            .sets("device", false)
                            .sets("sword", true),
                        StoryOption::goto("Walk on", 3),
                    ],
                ),
                Passage::new(
                    3,
                    "The road ends.",
                    vec![StoryOption::end("Die"), StoryOption::new("Win", Transition::End)],
                ),
            ],
        )
        .unwrap()
    }

    fn pick(view: &View, label: &str) -> OptionRef {
        view.options
            .iter()
            .find(|o| o.label == label)
            .unwrap_or_else(|| panic!("option {label:?} not visible"))
            .option
    }

    fn continued(step: Step) -> View {
        match step {
            Step::Continue(view) => view,
            Step::Ended => panic!("unexpected end"),
        }
    }

    fn flags(pairs: &[(&str, bool)]) -> SessionState {
        pairs.iter().copied().collect()
    }

    #[test]
    fn test_initial_phase_is_not_started() {
        let graph = scenario_graph();
        let engine = Engine::new(&graph);
        assert_eq!(engine.phase(), &Phase::NotStarted);
        assert!(engine.current_passage().is_none());
    }

    #[test]
    fn test_scenario_a_take() {
        let graph = scenario_graph();
        let mut engine = Engine::new(&graph);
        let view = engine.start().unwrap();
        let view = continued(engine.choose(pick(&view, "Take")).unwrap());

        assert_eq!(view.passage, PassageId(2));
        assert_eq!(engine.session_state(), Some(&flags(&[("device", true)])));
    }

    #[test]
    fn test_scenario_a_leave() {
        let graph = scenario_graph();
        let mut engine = Engine::new(&graph);
        let view = engine.start().unwrap();
        continued(engine.choose(pick(&view, "Leave")).unwrap());

        assert_eq!(engine.current_passage(), Some(PassageId(2)));
        assert_eq!(engine.session_state(), Some(&SessionState::new()));
    }

    #[test]
    fn test_scenario_b_gated_option() {
        let graph = scenario_graph();
        let engine = Engine::new(&graph);

        let without = engine
            .visible_options(PassageId(2), &SessionState::new())
            .unwrap();
        assert_eq!(without.len(), 1);
        assert_eq!(without[0].1.text, "Walk on");

        let with = engine
            .visible_options(PassageId(2), &flags(&[("device", true)]))
            .unwrap();
        assert_eq!(with.len(), 2);
        assert_eq!(with[0].0, 0);

        let mut engine = Engine::new(&graph);
        let view = engine.start().unwrap();
        let view = continued(engine.choose(pick(&view, "Take")).unwrap());
        let view = continued(
            engine
                .choose(pick(&view, "Trade the device for a sword"))
                .unwrap(),
        );
        assert_eq!(view.passage, PassageId(3));
        assert_eq!(
            engine.session_state(),
            Some(&flags(&[("device", false), ("sword", true)]))
        );
    }

    #[test]
    fn test_scenario_c_end_then_restart() {
        let graph = scenario_graph();
        let mut engine = Engine::new(&graph);
        let view = engine.start().unwrap();
        let view = continued(engine.choose(pick(&view, "Take")).unwrap());
        let view = continued(engine.choose(pick(&view, "Walk on")).unwrap());

        assert_eq!(engine.choose(pick(&view, "Win")).unwrap(), Step::Ended);
        assert!(engine.is_ended());

        let view = engine.start().unwrap();
        assert_eq!(view.passage, PassageId::ENTRY);
        assert_eq!(engine.session_state(), Some(&SessionState::new()));
    }

    #[test]
    fn test_scenario_d_content_error_on_missing_passage() {
        let graph = StoryGraph::new_unchecked(vec![Passage::new(
            1,
            "start",
            vec![StoryOption::goto("into the void", 42).sets("brave", true)],
        )])
        .unwrap();
        assert_eq!(
            graph.find_passage(PassageId(42)).unwrap_err(),
            ContentError::UnknownPassage(PassageId(42))
        );

        let mut engine = Engine::new(&graph);
        let view = engine.start().unwrap();
        let err = engine.choose(view.options[0].option).unwrap_err();
        assert!(matches!(
            err,
            NarrativeError::Content(ContentError::UnknownPassage(PassageId(42)))
        ));
        // Nothing was applied.
        assert_eq!(engine.current_passage(), Some(PassageId(1)));
        assert_eq!(engine.session_state(), Some(&SessionState::new()));
    }

    #[test]
    fn test_start_without_entry_passage_fails() {
        let graph = StoryGraph::new_unchecked(vec![Passage::new(2, "orphan", vec![])]).unwrap();
        let mut engine = Engine::new(&graph);
        assert_eq!(
            engine.start().unwrap_err(),
            ContentError::UnknownPassage(PassageId::ENTRY)
        );
        assert_eq!(engine.phase(), &Phase::NotStarted);
    }

    #[test]
    fn test_hidden_option_is_rejected_without_mutation() {
        let graph = scenario_graph();
        let mut engine = Engine::new(&graph);
        let view = engine.start().unwrap();
        continued(engine.choose(pick(&view, "Leave")).unwrap());

        let before = engine.phase().clone();
        let err = engine
            .choose(OptionRef {
                passage: PassageId(2),
                index: 0,
            })
            .unwrap_err();
        assert!(matches!(
            err,
            NarrativeError::InvalidChoice(InvalidChoiceError::Hidden { index: 0, .. })
        ));
        assert_eq!(engine.phase(), &before);
    }

    #[test]
    fn test_stale_and_out_of_range_choices_rejected() {
        let graph = scenario_graph();
        let mut engine = Engine::new(&graph);
        let first = engine.start().unwrap();
        let take = pick(&first, "Take");
        continued(engine.choose(take).unwrap());

        // A control from the previous passage.
        assert!(matches!(
            engine.choose(take).unwrap_err(),
            NarrativeError::InvalidChoice(InvalidChoiceError::StalePassage { .. })
        ));
        assert!(matches!(
            engine
                .choose(OptionRef {
                    passage: PassageId(2),
                    index: 9
                })
                .unwrap_err(),
            NarrativeError::InvalidChoice(InvalidChoiceError::NoSuchOption { index: 9, .. })
        ));
        assert_eq!(engine.session_state(), Some(&flags(&[("device", true)])));
    }

    #[test]
    fn test_choose_requires_awaiting_choice() {
        let graph = scenario_graph();
        let mut engine = Engine::new(&graph);
        let entry_take = OptionRef {
            passage: PassageId(1),
            index: 0,
        };
        assert!(matches!(
            engine.choose(entry_take).unwrap_err(),
            NarrativeError::InvalidChoice(InvalidChoiceError::NotAwaitingChoice)
        ));

        engine.start().unwrap();
        continued(engine.choose(entry_take).unwrap());
        let end_ref = OptionRef {
            passage: PassageId(2),
            index: 1,
        };
        continued(engine.choose(end_ref).unwrap());
        let die = OptionRef {
            passage: PassageId(3),
            index: 0,
        };
        assert_eq!(engine.choose(die).unwrap(), Step::Ended);
        assert!(matches!(
            engine.choose(die).unwrap_err(),
            NarrativeError::InvalidChoice(InvalidChoiceError::NotAwaitingChoice)
        ));
        assert!(engine.view().is_err());
    }

    #[test]
    fn test_end_does_not_merge_state() {
        let graph = StoryGraph::new(
            "t",
            vec![Passage::new(
                1,
                "x",
                vec![StoryOption::end("quit").sets("quitter", true)],
            )],
        )
        .unwrap();
        let mut engine = Engine::new(&graph);
        let view = engine.start().unwrap();
        assert_eq!(engine.choose(view.options[0].option).unwrap(), Step::Ended);
        assert!(engine.session_state().is_none());

        engine.start().unwrap();
        assert_eq!(engine.session_state(), Some(&SessionState::new()));
    }

    #[test]
    fn test_unlocked_option_visible_in_same_step() {
        let graph = StoryGraph::new(
            "t",
            vec![Passage::new(
                1,
                "A lever.",
                vec![
                    StoryOption::goto("Pull", 1).sets("lever", true),
                    StoryOption::end("Walk through the open door")
                        .requires(Condition::flag_equals("lever", true)),
                ],
            )],
        )
        .unwrap();
        let mut engine = Engine::new(&graph);
        let view = engine.start().unwrap();
        assert_eq!(view.options.len(), 1);

        let view = continued(engine.choose(view.options[0].option).unwrap());
        assert_eq!(view.options.len(), 2);
        assert_eq!(view.options[1].option.index, 1);
    }

    #[test]
    fn test_visibility_is_pure_and_ordered() {
        let graph = scenario_graph();
        let engine = Engine::new(&graph);
        let state = flags(&[("device", true)]);
        let snapshot = state.clone();

        let first = engine.visible_options(PassageId(2), &state).unwrap();
        let second = engine.visible_options(PassageId(2), &state).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.iter().map(|(i, _)| *i).collect::<Vec<_>>(),
            vec![0, 1]
        );
        assert_eq!(state, snapshot);
    }

    #[test]
    fn test_determinism_across_engines() {
        let graph = scenario_graph();
        let run = || {
            let mut engine = Engine::new(&graph);
            let view = engine.start().unwrap();
            let view = continued(engine.choose(pick(&view, "Take")).unwrap());
            (view, engine.session_state().cloned())
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_independent_playthroughs() {
        let graph = scenario_graph();
        let mut a = Engine::new(&graph);
        let mut b = Engine::new(&graph);
        let va = a.start().unwrap();
        b.start().unwrap();
        continued(a.choose(pick(&va, "Take")).unwrap());

        assert_eq!(a.session_state(), Some(&flags(&[("device", true)])));
        assert_eq!(b.session_state(), Some(&SessionState::new()));
        assert_eq!(b.current_passage(), Some(PassageId(1)));
    }

    #[test]
    fn test_restart_from_middle_resets() {
        let graph = scenario_graph();
        let mut engine = Engine::new(&graph);
        let view = engine.start().unwrap();
        continued(engine.choose(pick(&view, "Take")).unwrap());

        let view = engine.start().unwrap();
        assert_eq!(view.passage, PassageId::ENTRY);
        assert_eq!(engine.session_state(), Some(&SessionState::new()));
    }

    #[test]
    fn test_player_name_substitution() {
        let graph = scenario_graph();
        let mut engine = Engine::new(&graph).with_player_name("Ripley");
        assert_eq!(engine.start().unwrap().text, "Hello Ripley. A device lies here.");

        engine.set_player_name("");
        assert_eq!(engine.view().unwrap().text, "Hello . A device lies here.");
    }

    #[test]
    fn test_dead_end_view() {
        let graph = StoryGraph::new(
            "t",
            vec![
                Passage::new(1, "a", vec![StoryOption::goto("on", 2)]),
                Passage::new(2, "You celebrate.", vec![]),
            ],
        )
        .unwrap();
        let mut engine = Engine::new(&graph);
        let view = engine.start().unwrap();
        assert!(!view.is_dead_end());
        let view = continued(engine.choose(view.options[0].option).unwrap());
        assert!(view.is_dead_end());
    }

    #[test]
    fn test_option_looping_to_own_passage_can_repeat() {
        let graph = StoryGraph::new(
            "t",
            vec![Passage::new(
                1,
                "The bell tolls.",
                vec![
                    StoryOption::goto("Ring again", 1).sets("rung", true),
                    StoryOption::end("Leave"),
                ],
            )],
        )
        .unwrap();
        let mut engine = Engine::new(&graph);
        let first = engine.start().unwrap();
        let again = pick(&first, "Ring again");

        let second = continued(engine.choose(again).unwrap());
        assert_eq!(pick(&second, "Ring again"), again);
        continued(engine.choose(again).unwrap());
        assert_eq!(engine.current_passage(), Some(PassageId(1)));
        assert_eq!(engine.session_state(), Some(&flags(&[("rung", true)])));
    }
}
