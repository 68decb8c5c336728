//! Controllable asynchronous operations.
//!
//! Every dispatched call is an operation moving through
//! `Created -> Started -> {Running <-> Paused} -> {Completed | Cancelled | Failed}`.
//! Transitions and listener invocations are serialized per operation, so once
//! [`AsyncOperation::cancel`] returns no further event reaches the listener.

mod gate;
mod graphql;
mod rest;

pub use graphql::GraphQLOperation;
pub use rest::RestOperation;

pub(crate) use gate::{Controller, Delivery, Gate, OperationKind};

use std::fmt;

/// Lifecycle state of an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationState {
    /// Built but not started.
    Created,
    /// Scheduled on a worker; nothing sent yet.
    Started,
    /// Request submitted or subscription registered.
    Running,
    Paused,
    Completed,
    Cancelled,
    Failed,
}

impl OperationState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

impl fmt::Display for OperationState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Lifecycle controls shared by every operation kind.
///
/// Each method reports whether a transition happened; calls that are not
/// valid in the current state are no-ops returning `false`.
pub trait AsyncOperation: Send + Sync {
    /// Schedule the operation. Only valid from `Created`.
    fn start(&self) -> bool;

    /// Suspend delivery.
    ///
    /// Streams pause while `Started` or `Running`; items arriving meanwhile
    /// are queued and delivered in order on resume. Single-response
    /// operations pause only before their request is sent.
    fn pause(&self) -> bool;

    /// Leave `Paused`.
    fn resume(&self) -> bool;

    /// Abort the operation from any non-terminal state.
    fn cancel(&self) -> bool;

    fn state(&self) -> OperationState;
}
