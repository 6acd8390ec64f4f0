pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod group;
pub mod input;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod recycle;
pub mod services;
pub mod session;
pub mod store;
pub mod telemetry;
pub mod validation;
pub mod view;

pub use api::{Backend, HttpBackend, MemoryBackend};
pub use config::AppConfig;
pub use dispatch::{Dispatcher, Mutation, MutationOutcome, Remote};
pub use error::{ClientError, ClientResult, ValidationError};
pub use input::{ProjectInput, TaskInput};
pub use model::*;
pub use services::{Dashboard, ViewSnapshot};
pub use session::{Capabilities, Session, SessionStore};
pub use store::{Collection, LoadOutcome, LoadState, Notice};
