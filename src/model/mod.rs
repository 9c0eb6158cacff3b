pub mod api;
pub mod common;
pub mod crypto;
pub mod mongodb;
