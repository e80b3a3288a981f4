// Copyright © 2025 Tributary

use std::error;
use std::result;

#[allow(clippy::module_name_repetitions)]
pub type DynError = Box<dyn error::Error + Send + Sync>;
pub type DynResult<T> = result::Result<T, DynError>;

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    #[error("source failed: {0}")]
    Source(#[source] DynError),

    #[error("reducer operation failed: {0}")]
    Reduce(#[source] DynError),

    #[error(transparent)]
    Other(DynError),
}

impl Error {
    pub fn downcast<E: error::Error + 'static>(self) -> Result<E, Self> {
        match self {
            Self::Source(inner) => inner.downcast().map(|e| *e).map_err(Self::Source),
            Self::Reduce(inner) => inner.downcast().map(|e| *e).map_err(Self::Reduce),
            Self::Other(inner) => inner.downcast().map(|e| *e).map_err(Self::Other),
        }
    }
}

impl From<DynError> for Error {
    fn from(value: DynError) -> Self {
        match value.downcast::<Self>() {
            Ok(this) => *this,
            Err(other) => Self::Other(other),
        }
    }
}

pub type Result<T, E = Error> = result::Result<T, E>;
