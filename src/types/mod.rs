//! Type definitions

pub mod appointment;
pub mod context;
pub mod messages;
pub mod route;

pub use appointment::*;
pub use context::*;
pub use messages::*;
pub use route::*;
