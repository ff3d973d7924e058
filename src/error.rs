//! Result and Error types for baryloc

/// Type alias for `Result<T, baryloc::Error>`
pub type Result<T> = core::result::Result<T, Error>;

/// The error type for the `baryloc` crate.
///
/// Note that a point lying outside of the container domain is *not* an error: it is reported
/// through [`BarycentricPoint::element_index`](crate::BarycentricPoint::element_index).
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("the container domain has no nodes or no elements")]
    EmptyMesh,

    #[error("dimension mismatch (expected {expected}, found {found})")]
    DimensionMismatch { expected: usize, found: usize },

    #[error("invalid connectivity: {0}")]
    InvalidConnectivity(String),

    #[error("node {node} is out of range (the mesh has {count} nodes)")]
    NodeOutOfRange { node: usize, count: usize },

    #[error("invalid grid: {0}")]
    InvalidGrid(String),

    #[error("invalid locator options: {0}")]
    InvalidOptions(String),
}
