//! Who is calling: signed tokens, the login state machine and the resolved actor.
//! Keep the public surface thin and split implementation across sub-modules.

mod actor;
mod token;
mod provider;

pub use actor::ActorContext;
pub use token::{Claims, TokenError, TokenSigner};
pub use provider::{AuthProvider, LocalAuthProvider, LoginOutcome, LoginRequest, Submitted};
