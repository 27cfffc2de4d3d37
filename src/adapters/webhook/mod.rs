//! Webhook Adapter
//!
//! HTTP transport used by the broadcaster to POST snapshots to subscribers.

mod http;

pub use http::HttpWebhookTransport;
