use std::path::PathBuf;

use thiserror::Error;

/// Boxed error from the archive library underneath.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Broad class of an [`AlignError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Bad arguments, detected before any archive is touched
    Configuration,
    /// An archive could not be opened or created
    Open,
    /// An entry was missing or could not be written
    Entry,
}

/// Failure of an align or verify operation. All of them are fatal to the
/// operation that raised them.
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("Input and output can't be same file")]
    SamePath,

    #[error("Output file '{}' exists", .0.display())]
    OutputExists(PathBuf),

    #[error("Unable to open '{}' as zip archive", path.display())]
    Open {
        path: PathBuf,
        #[source]
        source: BoxError,
    },

    #[error("Unable to retrieve entry {0}")]
    MissingEntry(usize),

    #[error("Unable to copy entry {index} ('{name}')")]
    Copy {
        index: usize,
        name: String,
        #[source]
        source: BoxError,
    },

    #[error("Unable to finish writing '{}'", path.display())]
    Finish {
        path: PathBuf,
        #[source]
        source: BoxError,
    },
}

impl AlignError {
    pub fn class(&self) -> ErrorClass {
        match self {
            AlignError::SamePath | AlignError::OutputExists(_) => ErrorClass::Configuration,
            AlignError::Open { .. } => ErrorClass::Open,
            AlignError::MissingEntry(_) | AlignError::Copy { .. } | AlignError::Finish { .. } => {
                ErrorClass::Entry
            }
        }
    }

    pub(crate) fn open(path: impl Into<PathBuf>, source: anyhow::Error) -> Self {
        AlignError::Open {
            path: path.into(),
            source: source.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn open_error_keeps_cause() {
        let err = AlignError::open("in.zip", anyhow::anyhow!("Not a valid ZIP file"));
        assert_eq!(err.to_string(), "Unable to open 'in.zip' as zip archive");
        assert_eq!(err.source().unwrap().to_string(), "Not a valid ZIP file");
        assert_eq!(err.class(), ErrorClass::Open);
    }

    #[test]
    fn classes() {
        assert_eq!(AlignError::SamePath.class(), ErrorClass::Configuration);
        assert_eq!(
            AlignError::OutputExists(PathBuf::from("out.zip")).class(),
            ErrorClass::Configuration
        );
        assert_eq!(AlignError::MissingEntry(3).class(), ErrorClass::Entry);
    }
}
