pub mod client;
pub mod types;
pub mod writer;

pub use client::*;
pub use types::*;
pub use writer::*;
