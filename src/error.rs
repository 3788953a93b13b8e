use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a pipeline run.
///
/// Problems with a single annotation entry or box are never reported through
/// this type; they are logged and counted in [`crate::types::ProcessingStats`].
#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("image directory does not exist: {}", .0.display())]
    MissingImageDir(PathBuf),

    #[error("invalid annotation glob pattern '{pattern}': {source}")]
    Pattern {
        pattern: String,
        source: glob::PatternError,
    },

    #[error(
        "no '{class_name}' images found ({secondary} secondary, {negative} negative available); \
         cannot balance dataset"
    )]
    NoPrimaryImages {
        class_name: &'static str,
        secondary: usize,
        negative: usize,
    },

    #[error("failed to parse annotation document {}: {source}", path.display())]
    Xml {
        path: PathBuf,
        source: quick_xml::DeError,
    },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize dataset descriptor: {0}")]
    Descriptor(#[from] serde_yaml::Error),
}

impl DatasetError {
    /// Build a closure that wraps an [`std::io::Error`] with the path it occurred on.
    pub fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> DatasetError {
        let path = path.into();
        move |source| DatasetError::Io { path, source }
    }
}
