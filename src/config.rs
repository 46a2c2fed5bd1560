use std::path::PathBuf;
use std::time::Duration;

use crate::game::tree::BuiltinStory;

/// Which story to play.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorySource {
    Builtin(BuiltinStory),
    File(PathBuf),
}

impl StorySource {
    /// `builtin:<name>` or a path to a JSON file.
    pub fn parse(raw: &str) -> Self {
        raw.strip_prefix("builtin:")
            .and_then(BuiltinStory::from_name)
            .map(StorySource::Builtin)
            .unwrap_or_else(|| StorySource::File(PathBuf::from(raw)))
    }
}

#[derive(Debug, Clone)]
pub struct GameConfig {
    pub story: StorySource,
    /// Delay per revealed character; zero prints passages at once.
    pub typing_delay: Duration,
    /// Decorative stars in the title banner; zero hides the banner.
    pub stars: usize,
    /// Where the saved player name lives. `None` keeps it in memory only.
    pub data_dir: Option<PathBuf>,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            story: StorySource::Builtin(BuiltinStory::Spaceship),
            typing_delay: Duration::from_millis(50),
            stars: 40,
            data_dir: dirs::data_local_dir().map(|dir| dir.join("stellar")),
        }
    }
}

impl GameConfig {
    /// Positional arguments win over environment variables, which win over
    /// defaults. Unparseable numbers fall back to the default.
    pub fn from_sources(args: &[String], env: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let arg_or_env = |pos: usize, key: &str| args.get(pos).cloned().or_else(|| env(key));

        let story = arg_or_env(1, "STELLAR_STORY")
            .map(|raw| StorySource::parse(&raw))
            .unwrap_or(defaults.story);
        let typing_delay = arg_or_env(2, "STELLAR_TYPING_MS")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.typing_delay);
        let stars = arg_or_env(3, "STELLAR_STARS")
            .and_then(|s| s.parse().ok())
            .unwrap_or(defaults.stars);
        let data_dir = env("STELLAR_DATA_DIR")
            .map(PathBuf::from)
            .or(defaults.data_dir);

        Self {
            story,
            typing_delay,
            stars,
            data_dir,
        }
    }

    pub fn from_env() -> Self {
        let args: Vec<String> = std::env::args().collect();
        Self::from_sources(&args, |key| std::env::var(key).ok())
    }
}
