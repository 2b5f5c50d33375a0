//! Fan-out across several clients.
//!
//! A [`ClientSet`] sends one logical request to many independent backends
//! at once and remembers which of them failed, so a caller can retry just
//! the broken ones.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use httpbridge::fanout::ClientSet;
//!
//! let set = ClientSet::from_configs(configs)?;
//! let fanout = set.get(&cancel, "/health").await;
//! if let Some(err) = &fanout.error {
//!     tracing::warn!(broken = ?set.broken(), "some backends failed:\n{err}");
//! }
//!
//! if let Some(broken) = set.use_broken() {
//!     broken.get(&cancel, "/health").await;
//! }
//! ```

mod client_set;
mod outcome;

pub use client_set::ClientSet;
pub use outcome::{ClientFailure, Fanout, FanoutError};
