pub mod access;
pub mod init;
pub mod invitations;
pub mod permissions;
pub mod settings_locks;
