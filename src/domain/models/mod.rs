mod error;
mod gateway;
mod inventory;
mod message;
mod review;
mod session;

pub use error::*;
pub use gateway::*;
pub use inventory::*;
pub use message::*;
pub use review::*;
pub use session::*;
