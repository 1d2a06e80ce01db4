pub mod gateway;
pub mod http_gateway;

pub use gateway::BackendGateway;
pub use http_gateway::HttpGateway;
