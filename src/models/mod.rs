pub mod user;
pub mod rbac;
pub mod invitation;
pub mod session;
pub mod catalog;

pub use user::{User, NewUser, UserResponse};
pub use rbac::{
    Role, RoleSummary, Permission,
    get_all_permissions, get_all_roles
};
pub use invitation::{
    Invitation, NewInvitation, InvitationWithCreator, Paginated
};
pub use session::Session;
pub use catalog::{Catalog, Category, SubCategory};
