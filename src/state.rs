//! Load state of a screen that shows the result of one client call.

use crate::requests::{Error, ErrorKind, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
    field: Option<&'static str>,
}

impl Failure {
    /// Connectivity failures get the "Cannot connect" panel with retry actions
    pub fn is_connectivity(&self) -> bool {
        self.kind == ErrorKind::Network
    }

    /// Input that a validation failure refers to, for showing the message inline
    pub fn field(&self) -> Option<&'static str> {
        self.field
    }
}

impl From<&Error> for Failure {
    fn from(e: &Error) -> Self {
        let field = match e {
            Error::ValidationError { field, .. } => Some(*field),
            _ => None,
        };

        Self {
            kind: e.kind(),
            message: e.to_string(),
            field,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState<T> {
    Idle,
    Loading,
    Success(T),
    Error(Failure),
}

impl<T> Default for LoadState<T> {
    fn default() -> Self {
        LoadState::Idle
    }
}

impl<T> LoadState<T> {
    /// Marks a request as in flight. Data from an earlier success is dropped
    pub fn start(&mut self) {
        *self = LoadState::Loading;
    }

    /// Applies the result of the call started with [`start`](LoadState::start).
    /// A result arriving when nothing is loading was abandoned and is ignored;
    /// returns whether it was applied
    pub fn finish(&mut self, res: Result<T>) -> bool {
        if !self.is_loading() {
            return false;
        }

        *self = match res {
            Ok(data) => LoadState::Success(data),
            Err(e) => LoadState::Error(Failure::from(&e)),
        };

        true
    }

    pub fn reset(&mut self) {
        *self = LoadState::Idle;
    }

    pub fn is_loading(&self) -> bool {
        matches!(self, LoadState::Loading)
    }

    pub fn data(&self) -> Option<&T> {
        match self {
            LoadState::Success(data) => Some(data),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            LoadState::Error(failure) => Some(failure),
            _ => None,
        }
    }
}
