//! Core types for gridsec

mod authority;
mod user;

pub use authority::*;
pub use user::*;
