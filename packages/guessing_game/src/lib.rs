#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

//! A multiplayer word-guessing game played over TCP.
//!
//! Players connect with any line-based client (for example `nc 127.0.0.1 7878`) and type either
//! a single letter or a guess of the whole word. All players share one game: correct letters are
//! revealed to everyone, wrong guesses use up a shared allowance of misses, and whoever completes
//! the word wins.
//!
//! The server is a thin layer over the [`reactor`] dispatch core. The listening socket and every
//! player connection are reactor sources read on their own threads, while all game logic runs
//! in reactor callbacks, one at a time, on a single thread.
//!
//! # Example
//!
//! ```no_run
//! use std::num::NonZeroU32;
//!
//! use guessing_game::{Game, Server, WordList};
//!
//! let words = WordList::builtin();
//! let max_misses = NonZeroU32::new(7).unwrap();
//! let game = Game::new(words.choose(&mut rand::rng()), max_misses);
//!
//! let server = Server::bind("127.0.0.1:7878", game, 64).unwrap();
//! let phase = server.run().unwrap();
//!
//! println!("game ended: {phase:?}");
//! ```

mod error;
mod game;
mod net;
mod session;
mod words;

pub use error::{Error, Result};
pub use game::{Game, Outcome, Phase};
pub use net::{Acceptor, Connection, Input, MAX_LINE_BYTES};
pub use session::Server;
pub use words::WordList;

pub(crate) const ERR_POISONED_LOCK: &str = "poisoned lock - safe execution no longer possible";
