pub mod call_ctx;

pub use call_ctx::{CallContext, CallCtx};
