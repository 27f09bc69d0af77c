//! Core functionalities.
mod agent;
mod env;
mod policy;
mod replay_service;
mod step;
mod sync_model;
pub use agent::{Agent, LearnOutput};
pub use env::Env;
pub use policy::Policy;
pub use replay_service::ReplayService;
pub use step::{Step, StepProcessor, TransitionStepProcessor};
pub use sync_model::SyncModel;
