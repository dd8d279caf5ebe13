// Tenantq Infrastructure - HTTP Resource Invokers
// Implements: ResourceInvoker for serverless functions and state machines

mod endpoint;
mod invokers;

pub use endpoint::HttpEndpoint;
pub use invokers::{HttpFunctionInvoker, HttpStateMachineInvoker, UnconfiguredInvoker};
