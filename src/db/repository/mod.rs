pub mod invitation;
pub mod permission;
pub mod relationship;
pub mod setting_lock;
pub mod user;

pub use invitation::InvitationRepository;
pub use permission::PermissionGrantRepository;
pub use relationship::CareRelationshipRepository;
pub use setting_lock::SettingLockRepository;
pub use user::UserRepository;
