use std::collections::BTreeSet;
use std::num::NonZeroU32;

/// Where a game stands.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Phase {
    /// Guesses are still being accepted.
    InProgress,

    /// Someone completed the word.
    Won {
        /// The player who made the winning guess.
        by: String,
    },

    /// The players ran out of misses.
    Lost,
}

/// What a single guess achieved.
#[derive(Clone, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Outcome {
    /// The letter occurs in the word, which is not yet complete.
    Hit {
        /// The guessed letter.
        letter: char,

        /// How many times it occurs in the word.
        occurrences: usize,
    },

    /// The letter or word was wrong.
    Miss {
        /// How many more misses end the game.
        misses_left: u32,
    },

    /// The letter was guessed before. Costs nothing.
    AlreadyGuessed {
        /// The repeated letter.
        letter: char,
    },

    /// The guess was neither a single letter nor a word. Costs nothing.
    Invalid,

    /// The guess completed the word.
    Won {
        /// The secret word.
        word: String,
    },

    /// The guess used up the last miss.
    Lost {
        /// The secret word.
        word: String,
    },

    /// The game had already ended before this guess.
    GameOver,
}

/// The state of one round of the guessing game, shared by all players.
///
/// Players guess either a single letter or the whole word. Every wrong guess counts as a miss;
/// the players lose together when they run out of misses. Whoever completes the word wins.
#[derive(Clone, Debug)]
pub struct Game {
    secret: String,
    guessed: BTreeSet<char>,
    misses: u32,
    max_misses: u32,
    phase: Phase,
}

impl Game {
    /// Starts a game for `secret`, lost after `max_misses` wrong guesses.
    ///
    /// At least one miss is always allowed, so a game never starts out lost.
    ///
    /// # Panics
    ///
    /// Panics if `secret` is empty or contains anything other than letters, or any uppercase
    /// letter.
    #[must_use]
    pub fn new(secret: impl Into<String>, max_misses: NonZeroU32) -> Self {
        let secret = secret.into();

        assert!(
            !secret.is_empty()
                && secret
                    .chars()
                    .all(|c| c.is_alphabetic() && !c.is_uppercase()),
            "secret must be a non-empty lowercase word, got {secret:?}"
        );

        Self {
            secret,
            guessed: BTreeSet::new(),
            misses: 0,
            max_misses: max_misses.get(),
            phase: Phase::InProgress,
        }
    }

    /// Applies a guess made by `player`.
    ///
    /// The guess is trimmed and lowercased. One letter is a letter guess, several letters a
    /// guess of the whole word.
    pub fn guess(&mut self, player: &str, guess: &str) -> Outcome {
        if self.is_over() {
            return Outcome::GameOver;
        }

        let guess = guess.trim().to_lowercase();

        if guess.is_empty() || !guess.chars().all(char::is_alphabetic) {
            return Outcome::Invalid;
        }

        let mut chars = guess.chars();

        match (chars.next(), chars.next()) {
            (Some(letter), None) => self.guess_letter(player, letter),
            _ if guess == self.secret => self.win(player),
            _ => self.miss(),
        }
    }

    fn guess_letter(&mut self, player: &str, letter: char) -> Outcome {
        if !self.guessed.insert(letter) {
            return Outcome::AlreadyGuessed { letter };
        }

        let occurrences = self.secret.chars().filter(|c| *c == letter).count();

        if occurrences == 0 {
            return self.miss();
        }

        if self.secret.chars().all(|c| self.guessed.contains(&c)) {
            return self.win(player);
        }

        Outcome::Hit {
            letter,
            occurrences,
        }
    }

    fn miss(&mut self) -> Outcome {
        self.misses = self.misses.saturating_add(1);

        if self.misses >= self.max_misses {
            self.phase = Phase::Lost;

            return Outcome::Lost {
                word: self.secret.clone(),
            };
        }

        Outcome::Miss {
            misses_left: self.misses_left(),
        }
    }

    fn win(&mut self, player: &str) -> Outcome {
        self.phase = Phase::Won {
            by: player.to_owned(),
        };

        Outcome::Won {
            word: self.secret.clone(),
        }
    }

    /// The word with every letter not yet guessed replaced by `_`, letters separated by spaces.
    #[must_use]
    pub fn masked(&self) -> String {
        let revealed = !matches!(self.phase, Phase::InProgress);

        self.secret
            .chars()
            .map(|c| {
                if revealed || self.guessed.contains(&c) {
                    c
                } else {
                    '_'
                }
            })
            .map(String::from)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Where the game stands.
    #[must_use]
    pub fn phase(&self) -> &Phase {
        &self.phase
    }

    /// Whether the game has been won or lost.
    #[must_use]
    pub fn is_over(&self) -> bool {
        !matches!(self.phase, Phase::InProgress)
    }

    /// How many wrong guesses have been made.
    #[must_use]
    pub fn misses(&self) -> u32 {
        self.misses
    }

    /// How many more wrong guesses end the game.
    #[must_use]
    pub fn misses_left(&self) -> u32 {
        self.max_misses.saturating_sub(self.misses)
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;

    fn misses(count: u32) -> NonZeroU32 {
        NonZeroU32::new(count).unwrap()
    }

    #[test]
    fn letters_reveal_the_word() {
        let mut game = Game::new("otter", misses(3));

        assert_eq!(game.masked(), "_ _ _ _ _");
        assert_eq!(
            game.guess("ann", "t"),
            Outcome::Hit {
                letter: 't',
                occurrences: 2
            }
        );
        assert_eq!(game.masked(), "_ t t _ _");
        assert_eq!(game.phase(), &Phase::InProgress);
    }

    #[test]
    fn last_letter_wins() {
        let mut game = Game::new("ox", misses(3));

        game.guess("ann", "o");
        assert_eq!(
            game.guess("bob", " X "),
            Outcome::Won {
                word: "ox".to_owned()
            }
        );
        assert_eq!(
            game.phase(),
            &Phase::Won {
                by: "bob".to_owned()
            }
        );
        assert_eq!(game.masked(), "o x");
    }

    #[test]
    fn whole_word_wins() {
        let mut game = Game::new("otter", misses(3));

        assert_eq!(
            game.guess("ann", "Otter"),
            Outcome::Won {
                word: "otter".to_owned()
            }
        );
        assert!(game.is_over());
    }

    #[test]
    fn misses_count_down_to_loss() {
        let mut game = Game::new("otter", misses(2));

        assert_eq!(game.guess("ann", "z"), Outcome::Miss { misses_left: 1 });
        assert_eq!(game.misses(), 1);
        assert_eq!(
            game.guess("ann", "beaver"),
            Outcome::Lost {
                word: "otter".to_owned()
            }
        );
        assert_eq!(game.phase(), &Phase::Lost);
        assert_eq!(game.misses_left(), 0);
        assert_eq!(game.masked(), "o t t e r");
    }

    #[test]
    fn repeats_and_nonsense_are_free() {
        let mut game = Game::new("otter", misses(1));

        game.guess("ann", "t");
        assert_eq!(
            game.guess("bob", "T"),
            Outcome::AlreadyGuessed { letter: 't' }
        );
        assert_eq!(game.guess("bob", ""), Outcome::Invalid);
        assert_eq!(game.guess("bob", "4"), Outcome::Invalid);
        assert_eq!(game.guess("bob", "two words"), Outcome::Invalid);
        assert_eq!(game.misses(), 0);
    }

    #[test]
    fn repeated_miss_is_free() {
        let mut game = Game::new("otter", misses(3));

        game.guess("ann", "z");
        assert_eq!(
            game.guess("ann", "z"),
            Outcome::AlreadyGuessed { letter: 'z' }
        );
        assert_eq!(game.misses(), 1);
    }

    #[test]
    fn no_guesses_after_the_end() {
        let mut game = Game::new("ox", misses(1));

        game.guess("ann", "q");
        assert_eq!(game.guess("ann", "ox"), Outcome::GameOver);
        assert_eq!(game.phase(), &Phase::Lost);
    }

    #[test]
    fn single_allowed_miss_starts_in_progress() {
        let mut game = Game::new("ox", NonZeroU32::MIN);

        assert_eq!(game.misses_left(), 1);
        assert_eq!(game.phase(), &Phase::InProgress);
        assert_eq!(
            game.guess("ann", "q"),
            Outcome::Lost {
                word: "ox".to_owned()
            }
        );
    }

    #[test]
    #[should_panic]
    fn rejects_uppercase_secret() {
        drop(Game::new("Otter", misses(3)));
    }
}
