use std::fmt;

#[derive(Debug)]
/// Failure classes for the filter pipeline. Every one of these is treated
/// as fatal at the top-level boundary; there is no recoverable class.
pub enum FilterError {
    /// GPU adapter or device acquisition failed.
    Setup(String),
    /// The bundled image is missing, undecodable, empty, or oversized.
    Asset(String),
    /// Readback could not be mapped or re-encoded as an image.
    Codec(String),
}

impl FilterError {
    pub fn setup(msg: impl Into<String>) -> Self {
        FilterError::Setup(msg.into())
    }

    pub fn asset(msg: impl Into<String>) -> Self {
        FilterError::Asset(msg.into())
    }

    pub fn codec(msg: impl Into<String>) -> Self {
        FilterError::Codec(msg.into())
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::Setup(msg) => write!(f, "GPU setup failed: {}", msg),
            FilterError::Asset(msg) => write!(f, "bundled asset failed: {}", msg),
            FilterError::Codec(msg) => write!(f, "image encode/readback failed: {}", msg),
        }
    }
}

impl std::error::Error for FilterError {}

#[cfg(test)]
mod tests {
    use super::FilterError;

    #[test]
    fn display_includes_kind_and_message() {
        let err = FilterError::setup("no adapter");
        assert_eq!(err.to_string(), "GPU setup failed: no adapter");

        let err = FilterError::asset("truncated PNG");
        assert_eq!(err.to_string(), "bundled asset failed: truncated PNG");

        let err = FilterError::codec("map_async returned an error");
        assert_eq!(
            err.to_string(),
            "image encode/readback failed: map_async returned an error"
        );
    }
}
