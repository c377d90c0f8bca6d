#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Kubernetes reported error: {source}")]
    KubeError {
        #[from]
        source: kube::Error,
    },

    #[error("Invalid user input: {0}")]
    UserInputError(String),

    #[error("Failed to parse DateTime: {source}")]
    ChronoError {
        #[from]
        source: chrono::ParseError,
    },

    #[error("Json error: {source}")]
    JsonError {
        #[from]
        source: serde_json::Error,
    },

    #[error("Resource tracker has not completed its first discovery pass yet")]
    ResourceTrackerNotStarted,

    #[error("Invalid label selector: {0}")]
    InvalidSelector(String),

    #[error("Finalizer removal race: {0}")]
    FinalizerRace(String),

    #[error(
        "{context}: {first}{}",
        .rest.iter().map(|e| format!("; {e}")).collect::<String>()
    )]
    Combined {
        context: String,
        first: Box<Error>,
        rest: Vec<Error>,
    },
}

impl Error {
    /// Wraps a sequence of independent failures collected while deleting several child
    /// resources, preserving every underlying error rather than only reporting the last one.
    pub fn combine(context: impl Into<String>, mut errors: Vec<Error>) -> Option<Error> {
        if errors.is_empty() {
            return None;
        }
        let first = Box::new(errors.remove(0));
        Some(Error::Combined {
            context: context.into(),
            first,
            rest: errors,
        })
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
