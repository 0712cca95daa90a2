pub mod handlers;
pub mod routes;

pub use handlers::AppState;
pub use routes::{apply_layers, create_router};
