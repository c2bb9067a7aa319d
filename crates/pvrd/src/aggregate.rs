//! Fan-out over every connected client.
//!
//! [`fan_out`] calls one operation on each client of a snapshot in identity
//! order and merges the results. A client answering `NotImplemented` simply
//! contributes nothing. Any other error is logged and remembered, and the
//! remaining clients are still asked, so one broken backend never hides the
//! data of the others.

use std::future::Future;
use std::sync::Arc;

use tracing::{debug, error};

use pvr_core::{BackendResult, PvrError, PvrResult};

use crate::registry::{ClientHandle, ClientSnapshot};

/// Merged result of a fan-out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregated<T> {
    /// Items from every client that answered
    pub items: Vec<T>,
    /// The most recent error, if any client failed
    pub error: Option<PvrError>,
}

impl<T> Default for Aggregated<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            error: None,
        }
    }
}

impl<T> Aggregated<T> {
    /// Returns true if no client failed.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Drops the partial data if any client failed.
    ///
    /// # Errors
    ///
    /// The most recent client error.
    pub fn into_result(self) -> PvrResult<Vec<T>> {
        match self.error {
            Some(error) => Err(error),
            None => Ok(self.items),
        }
    }
}

/// Calls `call` on every client of `snapshot`, in identity order.
///
/// `operation` names the call in logs and errors.
pub async fn fan_out<T, F, Fut>(
    snapshot: &ClientSnapshot,
    operation: &'static str,
    mut call: F,
) -> Aggregated<T>
where
    F: FnMut(Arc<ClientHandle>) -> Fut,
    Fut: Future<Output = BackendResult<Vec<T>>>,
{
    let mut result = Aggregated::default();

    for (id, client) in snapshot {
        match call(Arc::clone(client)).await {
            Ok(items) => {
                debug!(client_id = %id, operation, count = items.len(), "Client answered");
                result.items.extend(items);
            }
            Err(e) if e.is_not_implemented() => {
                debug!(client_id = %id, operation, "Not supported by client");
            }
            Err(e) => {
                error!(client_id = %id, operation, error = %e, "Client failed");
                result.error = Some(PvrError::backend(*id, operation, e));
            }
        }
    }

    result
}
