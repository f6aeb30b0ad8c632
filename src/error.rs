//! Effect-based error taxonomy for the scheduler/worker pipeline.
//!
//! Errors are grouped by what they do to the system, not by where they
//! originate: a client-visible request error never aborts the
//! scheduler, a saturation error always forces a namespace softdelete,
//! and so on. See `spec.md` §7.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, MhConfigError>;

/// Errors produced by the scheduler/worker pipeline.
///
/// Internal invariant violations (status `UNDEFINED`/`BUILDING` observed
/// where a finished value is required, a poisoned lock, a reference
/// count underflow) are not represented here: they are programmer bugs
/// and are reported with `panic!` at the call site instead, following
/// the teacher's treatment of lock poisoning as unrecoverable.
#[derive(Debug, Error)]
pub enum MhConfigError {
    /// The requested version is greater than the namespace's current version.
    #[error("invalid version: requested {requested}, current is {current}")]
    InvalidVersion {
        /// Version the caller asked for.
        requested: u32,
        /// Namespace's current version at the time of the check.
        current: u32,
    },

    /// Malformed request: duplicate overrides/flavors, bad document or
    /// template name, or any other client-supplied value that fails
    /// validation before scheduling begins.
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    /// A document referenced during build could not be resolved.
    #[error("missing referenced document: {0}")]
    MissingDocument(String),

    /// Tag expansion or template rendering failed during a build.
    #[error("build failed: {0}")]
    BuildFailed(String),

    /// A namespace lookup by path or id found nothing.
    #[error("namespace not found")]
    NamespaceNotFound,

    /// An `Update` could not be applied; no partial mutation occurred.
    #[error("update rejected: {0}")]
    UpdateRejected(String),

    /// Catch-all for external collaborator failures (filesystem, builder).
    #[error("{0}")]
    External(String),
}

impl MhConfigError {
    /// True for errors that must be reported to the client as `ERROR`
    /// rather than folded into a more specific reply code.
    pub fn is_generic_client_error(&self) -> bool {
        matches!(
            self,
            MhConfigError::MissingDocument(_)
                | MhConfigError::BuildFailed(_)
                | MhConfigError::NamespaceNotFound
                | MhConfigError::External(_)
        )
    }
}
