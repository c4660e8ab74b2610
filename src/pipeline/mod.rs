//! Generic transaction pipeline
//!
//! One run of an operation goes through build, post, poll, auxiliary fetch
//! and interpretation. Progress is pushed to the consumer as
//! [`TxResultRendering`](crate::rendering::TxResultRendering) values and the
//! run can be cancelled at any await point.

pub mod cancel;
pub mod emitter;
pub mod engine;
pub mod operation;
pub mod stream;

pub use cancel::{CancelHandle, CancelToken};
pub use emitter::Emitter;
pub use engine::{ErrorReporter, OnSucceed, TxPipeline};
pub use operation::{FeeParams, TxOperation};
pub use stream::TxStream;
