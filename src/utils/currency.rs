/// Currency helpers for rupee amounts.
///
/// Razorpay works in paise (1 rupee = 100 paise); payments are stored in rupees
/// as NUMERIC(12,2).
use bigdecimal::BigDecimal;
use num_traits::{FromPrimitive, ToPrimitive};

/// Convert rupees to paise, rounding to the nearest paisa.
pub fn rupees_to_paise(rupees: &BigDecimal) -> i64 {
    (rupees * BigDecimal::from(100)).round(0).to_i64().unwrap_or(0)
}

/// Convert paise to rupees.
pub fn paise_to_rupees(paise: i64) -> BigDecimal {
    BigDecimal::from(paise) / BigDecimal::from(100)
}

pub fn rupees_from_f64(amount: f64) -> Option<BigDecimal> {
    BigDecimal::from_f64(amount).map(|v| v.with_scale(2))
}

/// Format a rupee amount with 2 decimal places.
pub fn format_rupees(amount: &BigDecimal) -> String {
    format!("₹{}", amount.with_scale(2))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_rupees_to_paise() {
        assert_eq!(rupees_to_paise(&BigDecimal::from(500)), 50000);
        assert_eq!(rupees_to_paise(&BigDecimal::from_str("0.99").unwrap()), 99);
        assert_eq!(rupees_to_paise(&BigDecimal::from_str("12.346").unwrap()), 1235);
    }

    #[test]
    fn test_paise_to_rupees() {
        assert_eq!(paise_to_rupees(50000), BigDecimal::from(500));
        assert_eq!(paise_to_rupees(150), BigDecimal::from_str("1.5").unwrap());
    }

    #[test]
    fn test_format_rupees() {
        assert_eq!(format_rupees(&BigDecimal::from(500)), "₹500.00");
        assert_eq!(rupees_from_f64(250.5).map(|v| format_rupees(&v)).unwrap(), "₹250.50");
    }
}
