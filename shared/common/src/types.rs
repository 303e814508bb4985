use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Declares a closed set of values that travel as lowercase text, both on the
/// wire (serde) and in database columns (`as_str` / `FromStr`).
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                $variant,
            )+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text,)+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = AppError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok($name::$variant),)+
                    other => Err(AppError::Validation(format!(
                        "Invalid {} value: {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

text_enum!(UserRole {
    Customer => "customer",
    Lawyer => "lawyer",
    Admin => "admin",
});

text_enum!(
    /// Booking lifecycle. Edges live in [`BookingStatus::can_transition_to`].
    BookingStatus {
        Pending => "pending",
        Confirmed => "confirmed",
        Completed => "completed",
        Cancelled => "cancelled",
        Rejected => "rejected",
    }
);

impl BookingStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            BookingStatus::Completed | BookingStatus::Cancelled | BookingStatus::Rejected
        )
    }

    /// Transition table. Staying in the current status is always accepted.
    pub fn can_transition_to(&self, next: BookingStatus) -> bool {
        use BookingStatus::*;

        if *self == next {
            return true;
        }

        matches!(
            (self, next),
            (Pending, Confirmed)
                | (Pending, Rejected)
                | (Pending, Cancelled)
                | (Confirmed, Completed)
                | (Confirmed, Cancelled)
        )
    }
}

text_enum!(
    /// Payment state as mirrored on the booking.
    BookingPaymentStatus {
        Pending => "pending",
        Completed => "completed",
        Failed => "failed",
        Refunded => "refunded",
        PartialRefund => "partial_refund",
    }
);

text_enum!(PaymentStatus {
    Pending => "pending",
    Success => "success",
    Failed => "failed",
    Refunded => "refunded",
    PartialRefund => "partial_refund",
});

impl From<PaymentStatus> for BookingPaymentStatus {
    fn from(status: PaymentStatus) -> Self {
        match status {
            PaymentStatus::Pending => BookingPaymentStatus::Pending,
            PaymentStatus::Success => BookingPaymentStatus::Completed,
            PaymentStatus::Failed => BookingPaymentStatus::Failed,
            PaymentStatus::Refunded => BookingPaymentStatus::Refunded,
            PaymentStatus::PartialRefund => BookingPaymentStatus::PartialRefund,
        }
    }
}

text_enum!(PaymentMethod {
    CreditCard => "credit_card",
    DebitCard => "debit_card",
    PayPal => "paypal",
    BankTransfer => "bank_transfer",
    Other => "other",
});

text_enum!(CancelledBy {
    Customer => "customer",
    Lawyer => "lawyer",
    Admin => "admin",
});

text_enum!(NotificationType {
    Booking => "booking",
    Payment => "payment",
    Review => "review",
    Profile => "profile",
    System => "system",
    Message => "message",
});

text_enum!(NotificationPriority {
    Low => "low",
    Medium => "medium",
    High => "high",
});

text_enum!(RelatedModel {
    Booking => "Booking",
    Payment => "Payment",
    Review => "Review",
    User => "User",
    Lawyer => "Lawyer",
    Service => "Service",
});

/// Page window for list endpoints. Pages are 1-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub limit: u32,
}

impl PageRequest {
    pub const DEFAULT_LIMIT: u32 = 10;
    pub const MAX_LIMIT: u32 = 100;

    pub fn new(page: Option<u32>, limit: Option<u32>) -> Self {
        Self {
            page: page.filter(|p| *p > 0).unwrap_or(1),
            limit: limit
                .filter(|l| *l > 0)
                .unwrap_or(Self::DEFAULT_LIMIT)
                .min(Self::MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> usize {
        ((self.page - 1) as usize) * self.limit as usize
    }

    pub fn total_pages(&self, total: u64) -> u64 {
        total.div_ceil(self.limit as u64)
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// One page of results plus the total match count.
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
}

// Common response wrapper
#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(flatten)]
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
        }
    }

    pub fn with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data,
        }
    }
}

/// Payload for responses that only carry a message.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct Empty {}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_booking_transition_table() {
        use BookingStatus::*;

        assert!(Pending.can_transition_to(Confirmed));
        assert!(Pending.can_transition_to(Rejected));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Confirmed.can_transition_to(Completed));
        assert!(Confirmed.can_transition_to(Cancelled));

        assert!(!Pending.can_transition_to(Completed));
        assert!(!Confirmed.can_transition_to(Pending));
        assert!(!Confirmed.can_transition_to(Rejected));

        for terminal in [Completed, Cancelled, Rejected] {
            assert!(terminal.is_terminal());
            for next in [Pending, Confirmed, Completed, Cancelled, Rejected] {
                assert_eq!(terminal.can_transition_to(next), terminal == next);
            }
        }
    }

    #[test]
    fn test_text_round_trip_matches_serde() {
        let status = BookingPaymentStatus::PartialRefund;
        assert_eq!(status.as_str(), "partial_refund");
        assert_eq!(
            serde_json::to_value(status).unwrap(),
            serde_json::json!("partial_refund")
        );
        assert_eq!(
            BookingPaymentStatus::from_str("partial_refund").unwrap(),
            status
        );
        assert_eq!(RelatedModel::from_str("Booking").unwrap(), RelatedModel::Booking);
        assert!(UserRole::from_str("superuser").is_err());
    }

    #[test]
    fn test_payment_status_mirrors_onto_booking() {
        assert_eq!(
            BookingPaymentStatus::from(PaymentStatus::Success),
            BookingPaymentStatus::Completed
        );
        assert_eq!(
            BookingPaymentStatus::from(PaymentStatus::Refunded),
            BookingPaymentStatus::Refunded
        );
    }

    #[test]
    fn test_page_request_bounds() {
        let page = PageRequest::new(Some(0), Some(500));
        assert_eq!(page.page, 1);
        assert_eq!(page.limit, PageRequest::MAX_LIMIT);

        let page = PageRequest::new(Some(3), Some(10));
        assert_eq!(page.offset(), 20);
        assert_eq!(page.total_pages(21), 3);
        assert_eq!(page.total_pages(0), 0);
    }

    #[test]
    fn test_response_envelope_is_flat() {
        #[derive(Serialize)]
        struct Payload {
            count: u32,
        }

        let body = serde_json::to_value(ApiResponse::with_message("ok", Payload { count: 2 })).unwrap();
        assert_eq!(body, serde_json::json!({"success": true, "message": "ok", "count": 2}));
    }
}
