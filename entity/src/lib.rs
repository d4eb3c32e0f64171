//! sea-orm entity models for the CRM schema.

pub mod admin_claim;
pub mod contact;
pub mod deal;
pub mod ticket;
pub mod user;
pub mod user_secret;
