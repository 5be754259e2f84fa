pub mod board;
pub mod config;
pub mod order;
pub mod project;
pub mod todo;

pub use board::*;
pub use config::*;
pub use order::*;
pub use project::*;
pub use todo::*;
