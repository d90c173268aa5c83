//! Generic "poll until confirmed" primitive.
//!
//! Every stage that waits on an external service (pin confirmation, chain
//! inclusion, contract state, proving jobs) goes through [`wait_until`],
//! supplying its own predicate and timing.

mod cancel;
mod types;
mod waiter;

pub use cancel::CancelToken;
pub use types::{PollOutcome, PollSettings, WaitError};
pub use waiter::wait_until;
