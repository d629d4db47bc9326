pub mod replay_error;
pub use replay_error::*;
