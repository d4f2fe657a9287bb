pub mod alertmodel;
pub mod callmodel;
pub mod jobmodel;
pub mod notificationmodel;
pub mod paymentmodel;
pub mod usermodel;
pub mod verificationmodels;
