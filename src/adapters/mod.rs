pub mod api_errors;
pub mod http;
pub mod processor_client;
