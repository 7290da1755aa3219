//! Client side of the watchlist service: the optimistic list and list-item
//! controllers and the HTTP clients they talk through.

pub mod controller;
pub mod error;
pub mod http_store;
pub mod lists_client;
pub mod lists_controller;
pub mod ordering;
pub mod store;
pub mod transport;

pub use controller::{ListItemsController, ListItemsSnapshot};
pub use error::ControllerError;
pub use http_store::HttpListItemStore;
pub use lists_client::ListsClient;
pub use lists_controller::{ListsController, ListsSnapshot};
pub use store::{ListItemStore, ListStore};
pub use transport::HttpTransport;

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
