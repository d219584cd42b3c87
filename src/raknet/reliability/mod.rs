// src/raknet/reliability/mod.rs
//! # RakNet Reliability Layer
//!
//! Handles packet reliability, ordering, sequencing, and splitting.

mod receive_window;
mod send_window;
mod split_handler;

pub use receive_window::ReceiveWindow;
pub use send_window::SendWindow;
pub use split_handler::SplitPacketHandler;
