//! HTTP transport and the error taxonomy shared by the service clients.

mod client;
mod error;
mod transport;

pub use client::HttpClient;
pub use error::{ClientError, not_found_on_404, status_of};
#[cfg(test)]
pub use transport::MockTransport;
pub use transport::{Transport, TransportResponse};
