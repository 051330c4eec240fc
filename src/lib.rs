// Pingback: reliable delivery of tracking requests
// Exposes the request controller and its collaborators as a library

pub mod chain;
pub mod cli;
pub mod clock;
pub mod controller;
pub mod descriptor;
pub mod error;
pub mod event;
pub mod http;
pub mod logging;
pub mod options;
pub mod retry;
pub mod scheduler;

pub use controller::{Completion, RequestController, RequestFactory};
pub use error::ControllerError;
pub use options::{Continuation, InstanceConfig, RequestOptions, SendOverrides};
