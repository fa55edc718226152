// State machines for the guest submission pipeline.
//
// Two independent lifecycles live here: the persisted status of a guest record
// (New -> Processing -> Completed/Failed -> Batched) and the transient state of a
// single remote portal session driven by the automation engine.

pub mod errors;
pub mod events;
pub mod session;
pub mod states;

pub use errors::{StateMachineError, StateMachineResult};
pub use events::RecordEvent;
pub use session::{SessionEvent, SessionState};
pub use states::GuestStatus;
