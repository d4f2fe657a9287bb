pub mod admin;
pub mod auth;
pub mod calls;
pub mod documents;
pub mod employer;
pub mod forms;
pub mod google_oauth;
pub mod ivr;
pub mod notifications;
pub mod payments;
pub mod public;
pub mod worker;
