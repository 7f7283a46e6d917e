//! HTTP transport shared by the auth client and the request gateway

pub mod client;

pub use client::{HttpClient, HttpClientBuilder, TransportError};
