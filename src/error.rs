use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("Catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("Catalog is empty")]
    EmptyCatalog,

    #[error("Requested {requested} distinct colors but reached only {achieved} at quantization ceiling {ceiling}")]
    UnreachableTargetCount {
        requested: usize,
        achieved: usize,
        ceiling: usize,
    },

    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Processing error: {0}")]
    Processing(String),
}

pub type Result<T> = std::result::Result<T, PatternError>;

// Reports and JSON keys carry errors as plain strings
impl serde::Serialize for PatternError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}
