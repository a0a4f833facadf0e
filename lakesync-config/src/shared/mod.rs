mod base;
mod connection;
mod engine;
mod kubernetes;
mod timeouts;
mod worker;

pub use base::*;
pub use connection::*;
pub use engine::*;
pub use kubernetes::*;
pub use timeouts::*;
pub use worker::*;
