pub mod auth;
pub mod error;
pub mod flash;
pub mod home;
pub mod likes;
pub mod messages;
pub mod middleware;
pub mod render;
pub mod routes;
pub mod session;
pub mod state;
pub mod users;

#[cfg(test)]
mod tests;

pub use error::AppError;
pub use routes::router;
pub use state::{AppState, AppStateInner};
