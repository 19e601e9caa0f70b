pub mod broadcast;
pub mod controller;
mod poller;
pub mod state;

pub use broadcast::{Listener, SubscriptionId};
pub use controller::{AgentController, AgentDeps};
pub use state::{AgentState, AgentStatus, FieldSource, SessionField};
