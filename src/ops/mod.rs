pub mod board_ops;
pub mod chain;
pub mod check;
pub mod link_ops;
