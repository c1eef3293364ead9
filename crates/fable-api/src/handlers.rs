//! Request handlers.

pub mod credits;
pub mod generate;
pub mod health;
pub mod music;

pub use credits::*;
pub use generate::*;
pub use health::*;
pub use music::*;
