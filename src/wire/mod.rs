//! Wire Protocol Module
//!
//! Everything that crosses the network between the controller and its workers.
//!
//! ## Submodules
//! - **`protocol`**: Ports, deadlines and the message schemas (DTOs).
//! - **`codec`**: Newline-delimited JSON framing over TCP with a per-connection deadline.

pub mod codec;
pub mod protocol;

#[cfg(test)]
mod tests;
