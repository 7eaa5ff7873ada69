use crate::model::ShapeId;

/// Rejected geometry. Checked before any state transition or commit.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GeometryError {
    #[error("a polygon needs at least 3 points, got {0}")]
    TooFewPoints(usize),
    #[error("outline contains a non-finite coordinate")]
    NonFinite,
}

/// Failures from the persistence collaborator.
#[derive(Debug, Clone, thiserror::Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("server returned {code}: {message}")]
    Status { code: u16, message: String },
    #[error("unexpected response: {0}")]
    Decode(String),
    #[error("shape {0} not found")]
    NotFound(ShapeId),
    #[error("{0}")]
    Rejected(String),
}

impl From<ureq::Error> for ApiError {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::Status(code, response) => ApiError::Status {
                code,
                message: response
                    .into_string()
                    .unwrap_or_else(|_| "<unreadable body>".to_string()),
            },
            ureq::Error::Transport(transport) => ApiError::Transport(transport.to_string()),
        }
    }
}

impl From<std::io::Error> for ApiError {
    fn from(err: std::io::Error) -> Self {
        ApiError::Decode(err.to_string())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("shape {0} is not in the store")]
    UnknownShape(ShapeId),
    #[error("sequence number {0} is already used on this page")]
    DuplicateSequence(u32),
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("no page image is loaded")]
    NoImage,
    #[error("failed to write image: {0}")]
    Image(#[from] image::ImageError),
}

#[derive(Debug, thiserror::Error)]
pub enum FontError {
    #[error("font {0} could not be parsed")]
    Invalid(String),
    #[error("font {id} failed to download: {source}")]
    Fetch { id: String, source: ApiError },
}
