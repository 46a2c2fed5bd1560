//! Branching "choose your own adventure" stories in the terminal.
//!
//! - **game**: story graph, session flags and the narrative engine, plus the
//!   terminal front end that drives it
//! - **identity**: the player's display name and where it is kept
//! - **reveal**: letter-by-letter passage reveal
//! - **decor**: the starfield banner
//! - **config**: runtime knobs from arguments and environment

pub mod config;
pub mod decor;
pub mod game;
pub mod identity;
pub mod reveal;
