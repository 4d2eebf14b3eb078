//! Backend interaction: request framing, HTTP transport and the dual-backend
//! predictor.

pub mod http_gateway;
pub mod normalizer;
pub mod predictor;

pub use http_gateway::HttpBackendGateway;
pub use predictor::Predictor;
