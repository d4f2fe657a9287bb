pub mod calldtos;
pub mod jobdtos;
pub mod notificationdtos;
pub mod paymentdtos;
pub mod responsedtos;
pub mod userdtos;
pub mod verificationdtos;
