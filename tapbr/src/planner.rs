//! Queue-to-worker assignment.
//!
//! Queue `i` goes to the i-th worker context in discovery order. The plan is
//! computed once before any worker starts and never changes afterwards.

use crate::error::{Error, Result};
use crate::port::{ContextId, QueueId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueuePlan {
    assigned: Vec<ContextId>,
    idle: Vec<ContextId>,
}

impl QueuePlan {
    /// Assign `queue_count` queues over `contexts`.
    ///
    /// Repeated context ids are ignored after their first occurrence.
    pub fn assign<I>(queue_count: u16, contexts: I) -> Result<Self>
    where
        I: IntoIterator<Item = ContextId>,
    {
        if queue_count == 0 {
            return Err(Error::InvalidQueueCount);
        }

        let mut seen: Vec<ContextId> = Vec::new();
        for ctx in contexts {
            if !seen.contains(&ctx) {
                seen.push(ctx);
            }
        }

        let wanted = queue_count as usize;
        if seen.len() < wanted {
            return Err(Error::InsufficientCores {
                requested: queue_count,
                available: seen.len(),
            });
        }

        let idle = seen.split_off(wanted);
        Ok(Self {
            assigned: seen,
            idle,
        })
    }

    pub fn queue_for(&self, ctx: ContextId) -> Option<QueueId> {
        self.assigned
            .iter()
            .position(|&c| c == ctx)
            .map(|q| q as QueueId)
    }

    pub fn context_for(&self, queue: QueueId) -> Option<ContextId> {
        self.assigned.get(queue as usize).copied()
    }

    pub fn queue_count(&self) -> u16 {
        self.assigned.len() as u16
    }

    /// `(context, queue)` pairs in queue order.
    pub fn iter(&self) -> impl Iterator<Item = (ContextId, QueueId)> + '_ {
        self.assigned
            .iter()
            .enumerate()
            .map(|(q, &ctx)| (ctx, q as QueueId))
    }

    /// Contexts that were discovered but own no queue.
    pub fn idle_contexts(&self) -> &[ContextId] {
        &self.idle
    }
}
