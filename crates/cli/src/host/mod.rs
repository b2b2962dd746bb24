//! TCP host glue
//!
//! Provides the dispatcher's collaborators: connected clients as recipients,
//! the connection registry, the connect hook, and the admin console.

pub mod connection;
pub mod console;
pub mod registry;
pub mod server;
pub mod service;

pub use console::run_console;
pub use registry::ConnectionRegistry;
pub use server::Server;
pub use service::BrandService;
