//! Rate-limited, audited dispatch to the external posting API.
//!
//! The gateway is the sole side-effecting boundary to the outside world:
//! every call acquires a reservoir slot, posts through the `PostClient`
//! trait, and commits exactly one audit row before returning. The retry
//! scheduler re-enters the gateway only; it never re-extracts or
//! re-correlates.

pub mod gateway;
pub mod limiter;
pub mod poster;
pub mod retry;

pub use gateway::{DispatchError, DispatchGateway};
pub use limiter::ReservoirLimiter;
pub use poster::{HttpPostClient, MockPostClient, PostClient, PostError, PostReceipt};
pub use retry::RetryScheduler;

/// Failed attempts at or beyond this retry count are left for manual
/// intervention.
pub const MAX_RETRIES: i64 = 5;
