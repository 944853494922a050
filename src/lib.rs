//! API Mock Server
//!
//! A configuration-driven mock server that maps request paths and methods
//! to canned JSON responses loaded from disk. Useful for exercising an API
//! contract from external clients when the real backend is unavailable.
//!
//! # Features
//!
//! - **Exact-path lookup**: requests resolve against a YAML endpoint map
//! - **Per-method fixtures**: one response file per method, with a default
//! - **Status codes & delays**: configurable per endpoint
//! - **Authentication gate**: optional header/body validation on every endpoint
//! - **Live configuration**: re-read on every request, no restart needed
//!
//! # Example Configuration
//!
//! ```yaml
//! endpoints:
//!   /api/orders:
//!     methods: [GET, POST]
//!     description: "Order listing"
//!     response_file: orders.json
//!     responses:
//!       POST: order-created.json
//!     status_code: 200
//!     delay: 0.5
//! ```

pub mod config;
pub mod error;
pub mod fixtures;
pub mod resolver;
pub mod server;

pub use config::{FileConfigStore, MockConfig};
pub use error::{ErrorShape, ResolveError};
pub use fixtures::DirFixtureStore;
pub use resolver::{AuthOptions, ResolvedResponse, Resolver};
pub use server::MockServer;
