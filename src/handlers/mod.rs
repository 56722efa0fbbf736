pub mod auth;
pub mod catalog;
pub mod dashboard;
pub mod firebase;
pub mod invitations;
pub mod profile;
