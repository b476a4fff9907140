//! Authentication flow: the gateway for user actions, the session store that
//! tracks who is signed in, and the guard that gates routes on it.

pub mod gateway;
pub mod guard;
pub mod session;

pub use gateway::{AuthGateway, LoginForm, Registration, SignupForm};
pub use guard::{Guard, GuardMode, GuardOutcome, GuardState};
pub use session::{SessionState, SessionStore};
