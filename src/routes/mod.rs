pub mod access;
pub mod auth;
pub mod health;
pub mod invitations;
pub mod permissions;
pub mod relationships;
pub mod settings_locks;
