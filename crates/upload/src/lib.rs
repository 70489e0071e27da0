#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Upload pipeline for pkgreg
//!
//! Turns a stream of create-package messages into a committed catalog
//! record. Bytes land in a staging area, are hashed as they arrive, and are
//! promoted to their permanent key only after verification; the catalog
//! commit is the single point at which a package becomes visible.

mod guard;
mod retry;
mod session;

pub use guard::StagingGuard;
pub use retry::RetryPolicy;
pub use session::{UploadContext, UploadLimits, UploadSession, UploadState};
