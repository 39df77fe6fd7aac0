//! Photo gallery API: accounts, session tokens and the photo service, plus
//! the axum handlers that expose them.

pub mod accounts;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod photos;
pub mod reconcile;
pub mod router;
pub mod state;
pub mod token;
pub mod upload;
pub mod validate;

#[cfg(test)]
mod testing;

pub use error::ApiError;
pub use router::router;
pub use state::{AppState, AppStateInner};
pub use token::{Identity, TokenIssuer};
