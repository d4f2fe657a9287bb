pub mod error;
pub mod geocoding;
pub mod google_oauth;
pub mod job_service;
pub mod notification_service;
pub mod payment_service;
pub mod profile_service;
pub mod razorpay;
pub mod sos_service;
pub mod speech;
pub mod twilio;
pub mod verification_service;
