pub mod currency;
pub mod geo;
pub mod otp_generator;
pub mod password;
pub mod phone;
pub mod time_ago;
pub mod token;
pub mod twiml;
pub mod uploads;
