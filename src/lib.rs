// Infrastructure layer (shared components)
pub mod config;
pub mod error;
pub mod telemetry;

// Domain layer (business logic)
pub mod defaults;
pub mod envelope;
pub mod identity;
pub mod intercept;
pub mod localize;
pub mod plaintext;
pub mod template;
pub mod transport;

// Application layer
pub mod dispatch;

pub use dispatch::{DispatchPipeline, PipelineBuilder};
pub use envelope::{CorrelationIds, Envelope};
pub use error::{DispatchError, DispatchResult, Outcome, SkipReason};
