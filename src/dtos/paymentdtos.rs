use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::{models::paymentmodel::PaymentMethod, service::payment_service::GatewayCallback};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitiatePaymentDto {
    pub payment_method: PaymentMethod,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct RecordPaymentDto {
    #[validate(range(min = 0.01, message = "Amount must be greater than zero"))]
    pub amount: f64,

    pub method: PaymentMethod,

    #[validate(length(max = 100, message = "Transaction id must be at most 100 characters"))]
    pub transaction_id: Option<String>,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct PaymentActionDto {
    #[validate(length(min = 1, message = "Action is required"))]
    pub action: String,
}

#[derive(Validate, Debug, Clone, Serialize, Deserialize)]
pub struct ResolveDisputeDto {
    #[validate(length(min = 1, message = "Resolution is required"))]
    pub resolution: String,
}

/// Form fields posted by the Razorpay checkout.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct RazorpayCallbackForm {
    pub razorpay_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
    pub razorpay_signature: Option<String>,
}

impl From<RazorpayCallbackForm> for GatewayCallback {
    fn from(form: RazorpayCallbackForm) -> Self {
        GatewayCallback {
            payment_id: form.razorpay_payment_id,
            order_id: form.razorpay_order_id,
            signature: form.razorpay_signature,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_callback_form_decodes_urlencoded() {
        let form: RazorpayCallbackForm = serde_urlencoded::from_str(
            "razorpay_payment_id=pay_1&razorpay_order_id=order_1&razorpay_signature=abc",
        )
        .unwrap();
        let callback = GatewayCallback::from(form);
        assert_eq!(callback.payment_id.as_deref(), Some("pay_1"));
        assert_eq!(callback.order_id.as_deref(), Some("order_1"));
        assert_eq!(callback.signature.as_deref(), Some("abc"));
    }

    #[test]
    fn test_record_payment_validation() {
        let dto: RecordPaymentDto =
            serde_json::from_str(r#"{"amount": 0, "method": "cash"}"#).unwrap();
        assert!(dto.validate().is_err());

        let dto: RecordPaymentDto =
            serde_json::from_str(r#"{"amount": 500, "method": "bank_transfer", "transaction_id": "UTR1"}"#).unwrap();
        assert!(dto.validate().is_ok());
        assert_eq!(dto.method, PaymentMethod::BankTransfer);
    }
}
