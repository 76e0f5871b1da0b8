//! Database models split into domain-specific modules.

pub mod common;
pub mod report;
pub mod reward;
pub mod user;
pub mod user_reward;

pub use common::*;
pub use report::*;
pub use reward::*;
pub use user::*;
pub use user_reward::*;
