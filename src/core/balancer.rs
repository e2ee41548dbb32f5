//! Least-loaded queue selection
//!
//! The dispatcher hands every new session to the desk queue with the fewest
//! pending sessions. On equal length an idle desk wins over one that is
//! currently serving a customer, and after that the lowest index wins.

use super::queue::{QueueLoad, Rejected, WorkerQueue};
use crate::types::{BankError, SessionDescriptor};
use std::sync::Arc;

/// Pick the queue a new session should join
///
/// Closed queues are never picked. Returns `None` when every queue is closed.
pub fn select_queue(loads: &[QueueLoad]) -> Option<usize> {
    loads
        .iter()
        .enumerate()
        .filter(|(_, load)| !load.closed)
        .min_by_key(|(index, load)| (load.len, load.serving_customer, *index))
        .map(|(index, _)| index)
}

/// Assign a session to the least-loaded queue
///
/// # Returns
///
/// The index of the queue that accepted the descriptor.
///
/// # Errors
///
/// The descriptor is handed back with `QueueFull` when even the shortest queue
/// is at capacity, or `QueueClosed` when the queues have been closed.
pub fn enqueue(
    queues: &[Arc<WorkerQueue>],
    descriptor: SessionDescriptor,
) -> Result<usize, Rejected> {
    let loads: Vec<QueueLoad> = queues.iter().map(|queue| queue.load()).collect();

    let Some(index) = select_queue(&loads) else {
        return Err(Rejected {
            descriptor,
            reason: BankError::QueueClosed,
        });
    };

    queues[index].push(descriptor)?;
    Ok(index)
}
