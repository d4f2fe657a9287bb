pub mod alertdb;
pub mod cache;
pub mod calldb;
pub mod db;
#[cfg(test)]
pub mod fixtures;
pub mod jobdb;
pub mod notificationdb;
pub mod paymentdb;
pub mod statsdb;
pub mod userdb;
pub mod verificationdb;
