//! Bounded task dispatch: FIFO queue, worker pool, per-key serialization,
//! and exponential-backoff retries.
//!
//! Queue state lives in memory only; the store is the durable record.

mod dispatcher;
mod keyed_locks;
mod retry;

pub use dispatcher::{
    DispatchHandle, Dispatcher, DispatcherConfig, EnqueueError, RunDisposition, TaskRunner,
    TaskSlot,
};
pub use keyed_locks::{KeyedLockGuard, KeyedLocks};
pub use retry::RetryPolicy;
