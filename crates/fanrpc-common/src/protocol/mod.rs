pub mod address;
pub mod error;
pub mod requests;
pub mod responses;


pub use address::ExecutorAddr;
pub use error::{FanrpcError, Result};
pub use requests::{MethodName, Parameters, Request, RequestBatch, RequestId};
pub use responses::{Response, RpcResult};
