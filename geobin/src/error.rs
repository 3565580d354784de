//! Error and Result types.
use thiserror::Error;

#[derive(Error, Debug)]
pub enum GeobinError {
    // Geometry model errors
    #[error("unsupported geometry type `{0}`")]
    UnsupportedType(String),
    #[error("invalid SRID value `{0}`")]
    Srid(i32),
    #[error("coordinate dimensions of `{0}` do not match its geometry flags")]
    DimensionMismatch(&'static str),
    #[error("collection `{parent}` cannot contain `{child}`")]
    ChildType {
        parent: &'static str,
        child: &'static str,
    },
    #[error("invalid NURBS parameter: {0}")]
    Nurbs(String),
    // Codec errors
    #[error("serialized size mismatch: expected {expected} bytes, wrote {actual}")]
    SizeMismatch { expected: usize, actual: usize },
    #[error("unexpected end of buffer at offset {0}")]
    Truncated(usize),
    #[error("unsupported serializer version `{0}`")]
    Version(u8),
    #[error("geometry nesting exceeds {0} levels")]
    NestingDepth(usize),
    #[error("geometry format: {0}")]
    GeometryFormat(String),
    // General
    #[error("I/O error `{0}`")]
    IoError(#[from] std::io::Error),
}

impl From<scroll::Error> for GeobinError {
    fn from(err: scroll::Error) -> Self {
        match err {
            scroll::Error::IO(e) => GeobinError::IoError(e),
            scroll::Error::TooBig { size, .. } | scroll::Error::BadOffset(size) => {
                GeobinError::Truncated(size)
            }
            e => GeobinError::GeometryFormat(e.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, GeobinError>;
