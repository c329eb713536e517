//! Database models split into separate files.
//! This module re-exports individual model modules so call sites can use
//! `crate::db::models::*` style imports.

pub mod invitation;
pub mod permission;
pub mod relationship;
pub mod setting_lock;
pub mod user;

pub use self::invitation::*;
pub use self::permission::*;
pub use self::relationship::*;
pub use self::setting_lock::*;
pub use self::user::*;
