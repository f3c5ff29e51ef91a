pub mod dispatcher;
pub mod grading_ctx;

pub use dispatcher::GradingDispatcher;
pub use grading_ctx::{GradingCtx, RunScope};
