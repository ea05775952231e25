//! Authentication state.
//!
//! - [`AuthOrchestrator`] - session synchronization state machine and the
//!   published [`AuthSnapshot`]
//! - [`CallbackHandler`] - completes sign-in after the provider redirect

mod callback;
mod guard;
mod orchestrator;

pub use callback::{CallbackError, CallbackHandler, CallbackOutcome};
pub use guard::{RequestGate, RequestTicket};
pub use orchestrator::{AuthOrchestrator, AuthOrchestratorBuilder, AuthSnapshot, AuthState};
