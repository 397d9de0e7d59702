use std::fs;
use std::path::Path;

use rand::Rng;
use rand::seq::IndexedRandom;

use crate::{Error, Result};

// Used when no word list is given on the command line.
const BUILTIN: &str = "\
# Animals
badger
falcon
octopus
pangolin
walrus

# Things
anchor
compass
lantern
harpoon
telescope
";

/// A non-empty list of lowercase words to pick secrets from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WordList {
    words: Vec<String>,
}

impl WordList {
    /// Parses a word list with one word per line.
    ///
    /// Surrounding whitespace is ignored and words are lowercased. Blank lines and lines starting
    /// with `#` are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidWord`] if a line holds anything but letters, or
    /// [`Error::EmptyWordList`] if no words remain.
    pub fn parse(text: &str) -> Result<Self> {
        let mut words = Vec::new();

        for (index, line) in text.lines().enumerate() {
            let trimmed = line.trim();

            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            // Lowercasing may expand a letter into a letter plus a combining mark, so the check
            // applies to the lowercased form.
            let word = trimmed.to_lowercase();

            if !word.chars().all(char::is_alphabetic) {
                return Err(Error::InvalidWord {
                    line: index.saturating_add(1),
                    word: trimmed.to_owned(),
                });
            }

            words.push(word);
        }

        if words.is_empty() {
            return Err(Error::EmptyWordList);
        }

        Ok(Self { words })
    }

    /// Reads and parses a word list file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadWordList`] if the file cannot be read, otherwise as [`parse()`][Self::parse].
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| Error::ReadWordList {
            path: path.to_path_buf(),
            source,
        })?;

        Self::parse(&text)
    }

    /// The word list compiled into the server.
    #[must_use]
    pub fn builtin() -> Self {
        Self::parse(BUILTIN).expect("built-in word list is valid")
    }

    /// Picks a word at random.
    #[must_use]
    pub fn choose<R>(&self, rng: &mut R) -> &str
    where
        R: Rng + ?Sized,
    {
        self.words
            .choose(rng)
            .expect("word list is never empty")
            .as_str()
    }

    /// The words in the list, in file order.
    #[must_use]
    pub fn words(&self) -> &[String] {
        &self.words
    }
}
