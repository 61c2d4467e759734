use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumDiscriminants};

/// Failure of one of the external collaborators.
///
/// Errors carry rendered messages rather than source errors so that a group
/// failure can be stored in the cache and replayed on a later hit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error, Serialize, Deserialize, EnumDiscriminants)]
#[strum_discriminants(name(ErrorKind), derive(Display, Hash))]
pub enum Error {
    /// The dependency could not be reached or answered with a bad status.
    #[error("{0}")]
    Transport(String),
    /// The response body did not have the expected shape.
    #[error("{0}")]
    Decode(String),
    /// The provider answered but reported business level errors.
    #[error("{0}")]
    Provider(String),
    #[error("{0}")]
    NotFound(String),
    /// Group discovery failed, nothing can be aggregated.
    #[error("discover group ids: {0}")]
    Discovery(Box<Error>),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        ErrorKind::from(self)
    }

    /// Whether trying again later could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Transport(_) => true,
            Error::Discovery(cause) => cause.is_retryable(),
            _ => false,
        }
    }

    pub(crate) fn transport(context: &str, cause: impl std::fmt::Display) -> Self {
        Error::Transport(format!("{}: {}", context, cause))
    }

    pub(crate) fn decode(context: &str, cause: impl std::fmt::Display) -> Self {
        Error::Decode(format!("{}: {}", context, cause))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
