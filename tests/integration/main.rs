//! End-to-end tests: control surface → scheduler → fetcher → bus.

mod mock_source;
mod tracking_flow;
