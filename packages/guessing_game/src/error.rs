use std::io;
use std::path::PathBuf;

/// Errors that can stop the server from starting or running.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The word list has no usable words in it.
    #[error("the word list contains no words")]
    EmptyWordList,

    /// A word list line holds something other than a single word made of letters.
    #[error("line {line} of the word list is {word:?}, which is not a word made of letters")]
    InvalidWord {
        /// One-based line number.
        line: usize,

        /// The offending line, trimmed.
        word: String,
    },

    /// The word list file could not be read.
    #[error("cannot read word list {}", path.display())]
    ReadWordList {
        /// The file we tried to read.
        path: PathBuf,

        /// What went wrong.
        #[source]
        source: io::Error,
    },

    /// The server could not listen for connections.
    #[error("cannot listen for connections")]
    Bind(#[source] io::Error),

    /// The dispatch core failed.
    #[error(transparent)]
    Reactor(#[from] reactor::Error),
}

/// A specialized `Result` type for server operations, returning the crate's [`Error`] type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::error::Error as _;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(Error: Send, Sync);

    #[test]
    fn invalid_word_names_line() {
        let error = Error::InvalidWord {
            line: 4,
            word: "x-ray".to_owned(),
        };

        let message = error.to_string();
        assert!(message.contains('4'));
        assert!(message.contains("x-ray"));
    }

    #[test]
    fn read_failure_keeps_source() {
        let error = Error::ReadWordList {
            path: PathBuf::from("words.txt"),
            source: io::Error::from(io::ErrorKind::NotFound),
        };

        assert!(error.to_string().contains("words.txt"));
        assert!(error.source().is_some());
    }
}
