// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the hierarchy of error types for the rendering server.

use crate::rid::{ResourceKind, Rid};
use std::fmt;

/// An error reported by a graphics backend.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendError {
    /// The device could not satisfy an allocation.
    OutOfMemory {
        /// Size of the failed allocation, in bytes.
        requested: u64,
    },
    /// The backend lacks the capability needed by an operation.
    Unsupported(String),
    /// A backend resource id did not refer to a live resource.
    InvalidResource(String),
    /// The device reported a failure (lost device, validation error, ...).
    Device(String),
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendError::OutOfMemory { requested } => {
                write!(f, "Out of video memory while allocating {requested} bytes")
            }
            BackendError::Unsupported(what) => write!(f, "Unsupported by backend: {what}"),
            BackendError::InvalidResource(what) => {
                write!(f, "Invalid backend resource: {what}")
            }
            BackendError::Device(msg) => write!(f, "Device error: {msg}"),
        }
    }
}

impl std::error::Error for BackendError {}

/// The top-level error type of the server.
///
/// None of these cross the caller / render-thread boundary. They are produced on the
/// render thread, logged, and turned into default return values at the facade.
#[derive(Debug, Clone, PartialEq)]
pub enum ServerError {
    /// The handle is stale, forged, freed, or was never created.
    InvalidHandle(Rid),
    /// A live handle of another kind was passed to a kind-specific operation.
    WrongKind {
        /// The offending handle.
        rid: Rid,
        /// The kind the operation works on.
        expected: ResourceKind,
    },
    /// The handle was already freed.
    DoubleFree(Rid),
    /// Resource data is internally inconsistent; the operation was rejected.
    MalformedData(String),
    /// The active backend lacks a capability; the operation was skipped.
    CapabilityMissing(String),
    /// The operation would create a cycle through the given handle.
    Cycle(Rid),
    /// The operation must run on the render thread but was issued elsewhere.
    WrongThread(&'static str),
    /// The render thread has shut down.
    Disconnected,
    /// The operation panicked on the render thread and was abandoned.
    Panicked(&'static str),
    /// A backend call failed.
    Backend(BackendError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServerError::InvalidHandle(rid) => write!(f, "Invalid handle: {rid}"),
            ServerError::WrongKind { rid, expected } => {
                write!(f, "Handle {rid} is not a {expected}")
            }
            ServerError::DoubleFree(rid) => write!(f, "Handle {rid} was already freed"),
            ServerError::MalformedData(msg) => write!(f, "Malformed resource data: {msg}"),
            ServerError::CapabilityMissing(what) => {
                write!(f, "Backend capability missing: {what}")
            }
            ServerError::Cycle(rid) => write!(f, "Operation would create a cycle through {rid}"),
            ServerError::WrongThread(op) => {
                write!(f, "'{op}' must be called from the render thread")
            }
            ServerError::Disconnected => write!(f, "The render thread is no longer running"),
            ServerError::Panicked(op) => write!(f, "'{op}' panicked and was abandoned"),
            ServerError::Backend(err) => write!(f, "Backend error: {err}"),
        }
    }
}

impl std::error::Error for ServerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ServerError::Backend(err) => Some(err),
            _ => None,
        }
    }
}

impl From<BackendError> for ServerError {
    fn from(err: BackendError) -> Self {
        ServerError::Backend(err)
    }
}

impl ServerError {
    /// Checks that `rid` is of the `expected` kind.
    ///
    /// ## Errors
    /// Returns [`ServerError::WrongKind`] for a valid handle of another kind and
    /// [`ServerError::InvalidHandle`] for a null handle.
    pub fn check_kind(rid: Rid, expected: ResourceKind) -> Result<(), ServerError> {
        if !rid.is_valid() {
            Err(ServerError::InvalidHandle(rid))
        } else if rid.kind() != expected {
            Err(ServerError::WrongKind { rid, expected })
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn backend_error_display() {
        let err = BackendError::OutOfMemory { requested: 1024 };
        assert_eq!(
            err.to_string(),
            "Out of video memory while allocating 1024 bytes"
        );
        let err = BackendError::Unsupported("bc compression".to_string());
        assert_eq!(err.to_string(), "Unsupported by backend: bc compression");
    }

    #[test]
    fn server_error_display() {
        let rid = Rid::from_parts(2, 1, ResourceKind::Mesh);
        assert_eq!(
            ServerError::InvalidHandle(rid).to_string(),
            "Invalid handle: Mesh(2v1)"
        );
        assert_eq!(
            ServerError::WrongKind {
                rid,
                expected: ResourceKind::Texture
            }
            .to_string(),
            "Handle Mesh(2v1) is not a Texture"
        );
        assert_eq!(
            ServerError::WrongThread("force_draw").to_string(),
            "'force_draw' must be called from the render thread"
        );
        assert_eq!(
            ServerError::Panicked("mesh_clear").to_string(),
            "'mesh_clear' panicked and was abandoned"
        );
    }

    #[test]
    fn backend_error_converts_and_chains() {
        let err: ServerError = BackendError::Device("lost".to_string()).into();
        assert!(matches!(err, ServerError::Backend(_)));
        assert_eq!(err.source().unwrap().to_string(), "Device error: lost");
    }

    #[test]
    fn check_kind_distinguishes_null_and_wrong_kind() {
        let mesh = Rid::from_parts(0, 1, ResourceKind::Mesh);
        assert!(ServerError::check_kind(mesh, ResourceKind::Mesh).is_ok());
        assert!(matches!(
            ServerError::check_kind(mesh, ResourceKind::Light),
            Err(ServerError::WrongKind { .. })
        ));
        assert!(matches!(
            ServerError::check_kind(Rid::INVALID, ResourceKind::Mesh),
            Err(ServerError::InvalidHandle(_))
        ));
    }
}
