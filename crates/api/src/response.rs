//! Shared response envelope types for API handlers.
//!
//! Plain resources use a `{ "data": ... }` envelope; job descriptors
//! are returned bare (their full or compact projection) to keep the
//! original wire contract of the jobs API.

use serde::Serialize;

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Serialize)]
pub struct DataResponse<T: Serialize> {
    pub data: T,
}
