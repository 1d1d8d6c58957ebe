//! HTTP API handlers for voxmap-le

pub mod health;
pub mod landscape;
pub mod ordering;
pub mod polls;
pub mod sse;
pub mod statements;
pub mod votes;
pub mod weights;

pub use health::health_routes;
pub use landscape::landscape_routes;
pub use ordering::ordering_routes;
pub use polls::poll_config_routes;
pub use sse::event_stream;
pub use statements::statement_routes;
pub use votes::vote_routes;
pub use weights::weight_routes;
