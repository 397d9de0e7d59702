#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(coverage_nightly, coverage(off))]

//! Binary entry point for the guessing game server.

use std::net::{IpAddr, Ipv4Addr};
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::process::ExitCode;

use argh::FromArgs;
use guessing_game::{Game, Phase, Result, Server, WordList};
use tracing::level_filters::LevelFilter;
use tracing::{error, info};

const DEFAULT_MAX_MISSES: NonZeroU32 = NonZeroU32::new(7).expect("7 is not zero");

/// Runs one round of a multiplayer word-guessing game, played over TCP with any line-based
/// client such as `nc`.
#[derive(FromArgs)]
struct Args {
    /// port to listen on
    #[argh(option, default = "7878")]
    port: u16,

    /// address to listen on
    #[argh(option, default = "IpAddr::V4(Ipv4Addr::LOCALHOST)")]
    bind: IpAddr,

    /// file with one secret word per line; a built-in list is used if omitted
    #[argh(option)]
    words: Option<PathBuf>,

    /// how many wrong guesses the players may make before losing, at least 1
    #[argh(option, default = "DEFAULT_MAX_MISSES")]
    max_misses: NonZeroU32,

    /// how many player inputs may wait for processing before readers are held back
    #[argh(option, default = "64")]
    capacity: usize,

    /// log every guess and connection event
    #[argh(switch, short = 'v')]
    verbose: bool,
}

// Binary entry point - mutations would require subprocess testing which is impractical.
#[cfg_attr(test, mutants::skip)]
fn main() -> ExitCode {
    let args: Args = argh::from_env();

    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        })
        .init();

    let outcome = run(&args);

    println!("{}", nm::Report::collect());

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "server failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg_attr(test, mutants::skip)]
fn run(args: &Args) -> Result<()> {
    let words = match &args.words {
        Some(path) => WordList::load(path)?,
        None => WordList::builtin(),
    };

    let game = Game::new(words.choose(&mut rand::rng()), args.max_misses);
    let server = Server::bind((args.bind, args.port), game, args.capacity)?;

    info!(address = %server.local_addr(), "waiting for players");

    match server.run()? {
        Phase::Won { by } => info!(winner = %by, "game won"),
        Phase::Lost => info!("game lost"),
        _ => info!("server stopped before the game was decided"),
    }

    Ok(())
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Option<Args> {
        Args::from_args(&["guess_server"], args).ok()
    }

    #[test]
    fn defaults() {
        let args = parse(&[]).unwrap();

        assert_eq!(args.port, 7878);
        assert_eq!(args.bind, IpAddr::V4(Ipv4Addr::LOCALHOST));
        assert_eq!(args.max_misses.get(), 7);
        assert_eq!(args.capacity, 64);
        assert!(args.words.is_none());
        assert!(!args.verbose);
    }

    #[test]
    fn zero_max_misses_is_rejected() {
        assert!(parse(&["--max-misses", "0"]).is_none());
        assert_eq!(
            parse(&["--max-misses", "1"]).unwrap().max_misses,
            NonZeroU32::MIN
        );
    }
}
