//! Core types, traits, and error handling for httpbridge.
//!
//! This module contains the fundamental building blocks the request
//! pipeline is assembled from.

pub mod error;
pub mod options;
pub mod response;
pub mod status;
pub mod traits;

pub use error::{ErrorList, HttpError, HttpResult};
pub use options::{pairs_to_map, BasicAuth, RequestBody, RequestOptions};
pub use response::{Response, TraceInfo};
pub use status::StatusClass;
pub use traits::{ArcTransport, Transport};
