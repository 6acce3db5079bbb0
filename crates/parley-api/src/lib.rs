pub mod auth;
pub mod conversations;
pub mod error;
pub mod messages;
pub mod middleware;
pub mod relations;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
