mod routes;
mod server;
mod state;
mod stream;

pub use server::{router, GatewayServer};
pub use state::AppState;
