use thiserror::Error;

/// Fatal errors the pipeline driver can surface as a non-zero exit.
///
/// Everything recoverable (LLM failures, schema violations, cache I/O) is handled
/// locally by the component that hit it and never reaches this type — see spec §7.
#[derive(Error, Debug)]
pub enum DigestError {
    #[error("invalid week label '{0}': expected format YYYY-Www")]
    InvalidWeekLabel(String),

    #[error("invalid calendar: {0}")]
    InvalidCalendar(String),

    #[error("unreadable article store at {path}: {source}")]
    ArticleStore {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not write digest artifact to {path}: {source}")]
    OutputWrite {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}
