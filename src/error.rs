//! Typed, per-subsystem errors. See spec §7.

use thiserror::Error;

use crate::face::FaceId;

/// Errors constructing or comparing [`crate::name::Name`]s.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NameError {
    #[error("name has {found} components, exceeding the implementation limit of {limit}")]
    NameTooLong { found: usize, limit: usize },
    #[error("malformed name component")]
    MalformedComponent,
}

/// Errors raised by the NameTree.
#[derive(Debug, Error, PartialEq, Eq, Clone, Copy)]
pub enum NameTreeError {
    #[error(transparent)]
    Name(#[from] NameError),
    #[error("name tree node invariant violated: back-pointer present with no owner")]
    CorruptBackPointer,
}

/// Errors the forwarder pipeline can observe; all are recovered (dropped),
/// never propagated as panics.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ForwarderError {
    #[error("malformed packet")]
    Malformed,
    #[error("duplicate interest from face {0:?}")]
    Duplicate(FaceId),
    #[error("loop detected for interest returning on face {0:?}")]
    Loop(FaceId),
    #[error("data missing required interest digest tag")]
    MissingDigestTag,
}

/// Config validation errors. See spec §4.9.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("unknown config section: {0}")]
    UnknownSection(String),
    #[error("invalid value for `{section}.{field}`: {reason}")]
    InvalidValue {
        section: String,
        field: String,
        reason: String,
    },
    #[error("failed to parse config: {0}")]
    Parse(String),
    #[error("duplicate section: {0}")]
    DuplicateSection(String),
}

/// Management response codes, per spec §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseCode {
    Success = 200,
    Malformed = 400,
    SignatureRequired = 401,
    ConnectFailed = 408,
    FaceNotFound = 410,
    FaceNotLocal = 412,
    Internal = 500,
    Unsupported = 501,
}

/// Errors surfaced by the management command surface (consumed by a
/// collaborator, but the core defines how its own errors map onto it).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ManagementError {
    #[error("malformed command")]
    Malformed,
    #[error("face {0:?} not found")]
    FaceNotFound(FaceId),
    #[error("face {0:?} is not local")]
    FaceNotLocal(FaceId),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ManagementError {
    pub fn response_code(&self) -> ResponseCode {
        match self {
            ManagementError::Malformed => ResponseCode::Malformed,
            ManagementError::FaceNotFound(_) => ResponseCode::FaceNotFound,
            ManagementError::FaceNotLocal(_) => ResponseCode::FaceNotLocal,
            ManagementError::Internal(_) => ResponseCode::Internal,
        }
    }
}
