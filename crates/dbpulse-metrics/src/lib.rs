//! dbpulse-metrics — exposition of scraped samples.
//!
//! Turns the descriptors registered at startup and the samples of one scrape
//! cycle into the Prometheus text exposition format.
//!
//! # Architecture
//!
//! ```text
//! CollectorSet::descriptors() + MetaDescriptors::all()
//!   └── render_prometheus(descriptors, samples) → text/plain for /metrics
//! ```

pub mod prometheus;

pub use prometheus::{CONTENT_TYPE, render_prometheus};
