pub mod packet;
pub mod error;
pub mod reliability;
pub mod consts;
pub mod server;

pub use error::*;
pub use consts::*;