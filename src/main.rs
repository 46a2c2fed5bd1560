use std::io;

use anyhow::Result;
use log::info;

use stellar::config::{GameConfig, StorySource};
use stellar::decor;
use stellar::game::{self, tree::StoryGraph, Terminal};
use stellar::identity::{FileNameStore, MemoryNameStore, NameStore};

const BANNER_WIDTH: usize = 40;
const BANNER_HEIGHT: usize = 3;

fn main() -> Result<()> {
    // Initialize logging. Control verbosity with RUST_LOG env var:
    //   RUST_LOG=info   cargo run   # transitions, name persistence
    //   RUST_LOG=debug  cargo run   # + option filtering and state merges
    //   RUST_LOG=trace  cargo run   # + reveal scheduling
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .init();

    let config = GameConfig::from_env();
    info!("Config: {config:?}");

    let graph = match &config.story {
        StorySource::Builtin(story) => StoryGraph::builtin(*story)?,
        StorySource::File(path) => StoryGraph::from_path(path)?,
    };
    info!("Story '{}' loaded ({} passages)", graph.title(), graph.len());

    let mut store: Box<dyn NameStore> = match &config.data_dir {
        Some(dir) => Box::new(FileNameStore::in_dir(dir)),
        None => Box::new(MemoryNameStore::new()),
    };

    let banner = if config.stars == 0 {
        Vec::new()
    } else {
        decor::starfield(BANNER_WIDTH, BANNER_HEIGHT, config.stars, &mut rand::rng())
    };

    let mut term = Terminal::new(io::stdin().lock(), io::stdout(), config.typing_delay);
    game::run(&mut term, &graph, store.as_mut(), &banner)
}
