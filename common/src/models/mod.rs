// common/src/models/mod.rs
pub mod member;
pub mod session;
