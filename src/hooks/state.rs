/// Shown to the user when a query fails for any reason other than cancellation
pub const QUERY_ERROR_MESSAGE: &str = "Failed to load data";

/// Shown to the user when a mutation fails for any reason other than cancellation
pub const MUTATION_ERROR_MESSAGE: &str = "Failed to save changes";

/// Coarse lifecycle position of a hook
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Idle,
    Loading,
    Success,
    Error,
}

/// Observable state of a query or mutation hook
#[derive(Debug, Clone, PartialEq)]
pub struct HookState<T> {
    pub data: Option<T>,
    pub error: Option<String>,
    pub loading: bool,
}

impl<T> Default for HookState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> HookState<T> {
    pub fn idle() -> Self {
        Self {
            data: None,
            error: None,
            loading: false,
        }
    }

    pub fn loading() -> Self {
        Self {
            data: None,
            error: None,
            loading: true,
        }
    }

    pub fn success(data: T) -> Self {
        Self {
            data: Some(data),
            error: None,
            loading: false,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            data: None,
            error: Some(message.into()),
            loading: false,
        }
    }

    pub fn status(&self) -> Status {
        if self.loading {
            Status::Loading
        } else if self.error.is_some() {
            Status::Error
        } else if self.data.is_some() {
            Status::Success
        } else {
            Status::Idle
        }
    }
}
