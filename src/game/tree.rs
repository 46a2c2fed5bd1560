use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, warn};
use serde::Deserialize;

use crate::game::error::{ContentError, StoryLoadError};
use crate::game::node::{Passage, PassageId, Transition};

const SPACESHIP_JSON: &str = include_str!("../../assets/spaceship.json");
const CAVERN_JSON: &str = include_str!("../../assets/cavern.json");

/// On-disk shape of a story file.
#[derive(Debug, Deserialize)]
struct StoryFile {
    #[serde(default)]
    title: String,
    passages: Vec<Passage>,
}

/// The full story: passages in authoring order plus an id index.
///
/// Read-only once built. Every playthrough borrows the same graph.
#[derive(Debug, Clone)]
pub struct StoryGraph {
    title: String,
    passages: Vec<Passage>,
    index: HashMap<PassageId, usize>,
}

impl StoryGraph {
    /// Build and validate a graph.
    pub fn new(title: impl Into<String>, passages: Vec<Passage>) -> Result<Self, ContentError> {
        let graph = Self::build(title.into(), passages)?;
        graph.validate()?;
        Ok(graph)
    }

    pub fn from_json(raw: &str) -> Result<Self, StoryLoadError> {
        let file: StoryFile = serde_json::from_str(raw)?;
        let graph = Self::new(file.title, file.passages)?;
        debug!(
            "Loaded story '{}' with {} passages",
            graph.title,
            graph.passages.len()
        );
        for id in graph.unreachable() {
            warn!("Passage {id} cannot be reached from the entry passage");
        }
        Ok(graph)
    }

    pub fn from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read story file {}", path.display()))?;
        Self::from_json(&raw).with_context(|| format!("invalid story file {}", path.display()))
    }

    pub fn builtin(story: BuiltinStory) -> Result<Self> {
        let raw = match story {
            BuiltinStory::Spaceship => SPACESHIP_JSON,
            BuiltinStory::Cavern => CAVERN_JSON,
        };
        Self::from_json(raw)
            .with_context(|| format!("built-in story '{}' is invalid", story.name()))
    }

    /// Index only, no reference checks. Lets tests build broken graphs.
    #[cfg(test)]
    pub(crate) fn new_unchecked(passages: Vec<Passage>) -> Result<Self, ContentError> {
        Self::build(String::new(), passages)
    }

    fn build(title: String, passages: Vec<Passage>) -> Result<Self, ContentError> {
        let mut index = HashMap::with_capacity(passages.len());
        for (pos, passage) in passages.iter().enumerate() {
            if passage.id.get() == 0 {
                return Err(ContentError::InvalidPassageId(passage.id));
            }
            if index.insert(passage.id, pos).is_some() {
                return Err(ContentError::DuplicatePassage(passage.id));
            }
        }
        Ok(Self {
            title,
            passages,
            index,
        })
    }

    fn validate(&self) -> Result<(), ContentError> {
        if !self.index.contains_key(&PassageId::ENTRY) {
            return Err(ContentError::MissingEntry);
        }
        for passage in &self.passages {
            for (option, choice) in passage.options.iter().enumerate() {
                if let Transition::Goto(to) = choice.next_text {
                    if !self.index.contains_key(&to) {
                        return Err(ContentError::DanglingTransition {
                            from: passage.id,
                            option,
                            to,
                        });
                    }
                }
            }
        }
        Ok(())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn len(&self) -> usize {
        self.passages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.passages.is_empty()
    }

    pub fn passages(&self) -> &[Passage] {
        &self.passages
    }

    /// There is no fallback passage: a miss means the graph is corrupt.
    pub fn find_passage(&self, id: PassageId) -> Result<&Passage, ContentError> {
        self.index
            .get(&id)
            .map(|&pos| &self.passages[pos])
            .ok_or(ContentError::UnknownPassage(id))
    }

    /// Passages no option path leads to from the entry, ignoring gates.
    pub fn unreachable(&self) -> Vec<PassageId> {
        let mut seen = HashSet::new();
        let mut queue = VecDeque::from([PassageId::ENTRY]);
        while let Some(id) = queue.pop_front() {
            if !seen.insert(id) {
                continue;
            }
            let Some(&pos) = self.index.get(&id) else {
                continue;
            };
            for option in &self.passages[pos].options {
                if let Transition::Goto(next) = option.next_text {
                    queue.push_back(next);
                }
            }
        }
        self.passages
            .iter()
            .map(|p| p.id)
            .filter(|id| !seen.contains(id))
            .collect()
    }
}

/// Stories compiled into the binary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuiltinStory {
    Spaceship,
    Cavern,
}

impl BuiltinStory {
    pub fn name(self) -> &'static str {
        match self {
            BuiltinStory::Spaceship => "spaceship",
            BuiltinStory::Cavern => "cavern",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "spaceship" => Some(BuiltinStory::Spaceship),
            "cavern" => Some(BuiltinStory::Cavern),
            _ => None,
        }
    }
}
