//! HTTP/WebSocket surface of the room engine.
//!
//! Room lifecycle endpoints are nested under `/api/` behind the
//! bearer-token middleware; the live conversation runs over
//! `/ws/connect`, authenticated with a one-time ticket. The router is
//! composable — `api_router()` returns a `Router` that can be mounted
//! on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use error::ApiError;
pub use router::{api_router, api_router_with_ctx};
pub use server::{start_server, ServerHandle};
pub use types::ApiContext;
