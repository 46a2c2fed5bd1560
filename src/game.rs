pub mod engine;
pub mod error;
pub mod node;
pub mod state;
pub mod tree;

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{Context, Result};
use log::{info, warn};

use crate::identity::{validate_name, NameStore};
use crate::reveal::Typewriter;
use engine::{Engine, Step, View};
use error::NarrativeError;
use node::PassageId;
use tree::StoryGraph;

// ---------------------------------------------------------------------------
// Terminal I/O
// ---------------------------------------------------------------------------

/// Line-based input plus an output sink shared with the typewriter.
pub struct Terminal<R: BufRead, W: Write + Send + 'static> {
    input: R,
    out: Arc<Mutex<W>>,
    typewriter: Typewriter<W>,
}

impl<R: BufRead, W: Write + Send + 'static> Terminal<R, W> {
    pub fn new(input: R, out: W, typing_delay: Duration) -> Self {
        let out = Arc::new(Mutex::new(out));
        let typewriter = Typewriter::new(Arc::clone(&out), typing_delay);
        Self {
            input,
            out,
            typewriter,
        }
    }

    pub fn output(&self) -> &Arc<Mutex<W>> {
        &self.out
    }

    fn say(&self, text: impl Display) -> io::Result<()> {
        let mut out = self
            .out
            .lock()
            .map_err(|_| io::Error::other("output lock poisoned"))?;
        writeln!(out, "{text}")?;
        out.flush()
    }

    /// Print a prompt and read one trimmed line. `None` on end of input.
    fn ask(&mut self, prompt: &str) -> io::Result<Option<String>> {
        {
            let mut out = self
                .out
                .lock()
                .map_err(|_| io::Error::other("output lock poisoned"))?;
            write!(out, "{prompt}")?;
            out.flush()?;
        }
        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    /// Reveal passage text; options are only listed once it has finished.
    fn show_passage(&mut self, view: &View) -> io::Result<()> {
        self.say("")?;
        self.typewriter.start(view.text.clone())?;
        self.typewriter.wait()?;
        for (i, option) in view.options.iter().enumerate() {
            self.say(format!("  [{}] {}", i + 1, option.label))?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Player name
// ---------------------------------------------------------------------------

/// Ask for a name, offering the saved one as the default, and persist it.
/// `None` if input ran out before a valid name was given.
fn ask_player_name<R: BufRead, W: Write + Send + 'static>(
    term: &mut Terminal<R, W>,
    store: &mut dyn NameStore,
) -> Result<Option<String>> {
    let saved = store.load().unwrap_or_else(|e| {
        warn!("Could not restore saved name: {e}");
        None
    });

    let prompt = match &saved {
        Some(name) => format!("What is your name, traveller? [{name}] "),
        None => "What is your name, traveller? ".to_string(),
    };

    loop {
        let Some(raw) = term.ask(&prompt)? else {
            return Ok(None);
        };
        let raw = match (&saved, raw.is_empty()) {
            (Some(name), true) => name.clone(),
            _ => raw,
        };
        match validate_name(&raw) {
            Ok(name) => {
                if saved.as_deref() != Some(name.as_str()) {
                    if let Err(e) = store.save(&name) {
                        warn!("Could not save player name: {e}");
                    }
                }
                info!("Player name: {name}");
                return Ok(Some(name));
            }
            Err(e) => term.say(format!("  {e}."))?,
        }
    }
}

// ---------------------------------------------------------------------------
// Game over screen
// ---------------------------------------------------------------------------

/// Outcome of a single playthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoundOutcome {
    /// Reached an ending option or a passage with nothing left to pick.
    Finished {
        choices_made: usize,
        last_passage: PassageId,
    },
    /// Player typed quit mid-story.
    Quit,
}

fn show_game_over<R: BufRead, W: Write + Send + 'static>(
    term: &Terminal<R, W>,
    outcome: &RoundOutcome,
    player_name: &str,
) -> io::Result<()> {
    term.say("\n========================================")?;
    term.say("             THE END")?;
    term.say("========================================")?;
    match outcome {
        RoundOutcome::Finished { choices_made, .. } => {
            term.say(format!("  Choices made: {choices_made}"))?;
            term.say(format!(
                "  Thank you for playing, {player_name}! Would you like to play again?"
            ))?;
        }
        RoundOutcome::Quit => {
            term.say(format!("  You drift off into the dark, {player_name}."))?;
        }
    }
    term.say("========================================\n")?;
    term.say("  [r] Restart    [q] Quit\n")
}

/// `true` to restart, `false` to quit (also on end of input).
fn prompt_restart<R: BufRead, W: Write + Send + 'static>(
    term: &mut Terminal<R, W>,
) -> io::Result<bool> {
    loop {
        match term.ask("> ")?.map(|s| s.to_lowercase()).as_deref() {
            Some("r") => return Ok(true),
            Some("q") | None => return Ok(false),
            _ => term.say("  Press [r] to restart or [q] to quit.")?,
        }
    }
}

// ---------------------------------------------------------------------------
// Single playthrough
// ---------------------------------------------------------------------------

pub fn play_round<R: BufRead, W: Write + Send + 'static>(
    term: &mut Terminal<R, W>,
    engine: &mut Engine<'_>,
) -> Result<RoundOutcome> {
    let mut view = engine.start().context("story content error")?;
    let mut choices_made = 0;

    loop {
        term.show_passage(&view)?;

        if view.is_dead_end() {
            info!("Dead end at passage {}", view.passage);
            return Ok(RoundOutcome::Finished {
                choices_made,
                last_passage: view.passage,
            });
        }

        let Some(input) = term.ask("\n> ")? else {
            return Ok(RoundOutcome::Quit);
        };
        if input.eq_ignore_ascii_case("q") || input.eq_ignore_ascii_case("quit") {
            return Ok(RoundOutcome::Quit);
        }

        let picked = input
            .parse::<usize>()
            .ok()
            .and_then(|n| n.checked_sub(1))
            .and_then(|i| view.options.get(i))
            .map(|option| option.option);
        let Some(choice) = picked else {
            term.say(format!(
                "  Pick a number from 1 to {}, or q to quit.",
                view.options.len()
            ))?;
            continue;
        };

        match engine.choose(choice) {
            Ok(Step::Continue(next)) => {
                choices_made += 1;
                view = next;
            }
            Ok(Step::Ended) => {
                choices_made += 1;
                return Ok(RoundOutcome::Finished {
                    choices_made,
                    last_passage: view.passage,
                });
            }
            Err(NarrativeError::InvalidChoice(e)) => {
                warn!("Rejected choice {choice:?}: {e}");
                term.say("  That choice is no longer available.")?;
            }
            Err(NarrativeError::Content(e)) => {
                return Err(e).context("story content error");
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Public entry point: plays rounds until the player quits
// ---------------------------------------------------------------------------

pub fn run<R: BufRead, W: Write + Send + 'static>(
    term: &mut Terminal<R, W>,
    graph: &StoryGraph,
    store: &mut dyn NameStore,
    banner: &[String],
) -> Result<()> {
    for line in banner {
        term.say(line)?;
    }
    term.say("========================================")?;
    term.say(format!("   {}", graph.title().to_uppercase()))?;
    term.say("========================================")?;
    term.say("Type the number of your choice, or q to quit.\n")?;

    let Some(name) = ask_player_name(term, store)? else {
        return Ok(());
    };
    let mut engine = Engine::new(graph).with_player_name(name.clone());

    loop {
        let outcome = match play_round(term, &mut engine) {
            Ok(outcome) => outcome,
            Err(e) => {
                term.say(format!("\n!! The story cannot continue: {e:#}"))?;
                return Err(e);
            }
        };
        show_game_over(term, &outcome, &name)?;

        if !prompt_restart(term)? {
            term.say(format!("Thanks for playing, {name}!"))?;
            break;
        }

        info!("Player chose to restart");
    }

    Ok(())
}
