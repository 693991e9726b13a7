use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::checkout::{validate_cart, Address, CartItem, CustomerInfo, ProductSnapshot};
use super::errors::DomainError;
use super::pricing::CartTotals;

/// Order lifecycle. `Confirmed` is the creation state: an order only
/// comes into existence after a successful payment capture (or with an
/// explicit payment reference on the direct path), so there is no
/// pending state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Confirmed => "CONFIRMED",
            OrderStatus::Processing => "PROCESSING",
            OrderStatus::Shipped => "SHIPPED",
            OrderStatus::Delivered => "DELIVERED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CONFIRMED" => Ok(OrderStatus::Confirmed),
            "PROCESSING" => Ok(OrderStatus::Processing),
            "SHIPPED" => Ok(OrderStatus::Shipped),
            "DELIVERED" => Ok(OrderStatus::Delivered),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::InvalidInput(format!(
                "Unknown order status: {}",
                other
            ))),
        }
    }
}

/// Set once at creation. Refunds and voids are not modeled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Paid => "PAID",
        }
    }
}

impl FromStr for PaymentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PAID" => Ok(PaymentStatus::Paid),
            other => Err(DomainError::InvalidInput(format!(
                "Unknown payment status: {}",
                other
            ))),
        }
    }
}

/// Shipping/delivery progress, independent of the lifecycle status but
/// kept consistent with it by the transition rules below.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FulfillmentStatus {
    Unfulfilled,
    Shipped,
    Delivered,
}

impl FulfillmentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FulfillmentStatus::Unfulfilled => "UNFULFILLED",
            FulfillmentStatus::Shipped => "SHIPPED",
            FulfillmentStatus::Delivered => "DELIVERED",
        }
    }
}

impl FromStr for FulfillmentStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "UNFULFILLED" => Ok(FulfillmentStatus::Unfulfilled),
            "SHIPPED" => Ok(FulfillmentStatus::Shipped),
            "DELIVERED" => Ok(FulfillmentStatus::Delivered),
            other => Err(DomainError::InvalidInput(format!(
                "Unknown fulfillment status: {}",
                other
            ))),
        }
    }
}

/// The mutable slice of an order the state machine operates on. Every
/// status-setter (admin mutation, tracking sync, delivery) goes through
/// [`OrderState::apply_status`] / [`OrderState::apply_fulfillment`] so
/// the side effects are enforced in exactly one place.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderState {
    pub status: OrderStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub tracking_number: Option<String>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

impl OrderState {
    pub fn apply_status(
        &mut self,
        next: OrderStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        if self.status == OrderStatus::Cancelled && next != OrderStatus::Cancelled {
            return Err(DomainError::InvalidTransition(
                "Order is cancelled".to_string(),
            ));
        }

        match next {
            OrderStatus::Shipped => {
                self.fulfillment_status = FulfillmentStatus::Shipped;
                if self.shipped_at.is_none() {
                    self.shipped_at = Some(now);
                }
            }
            OrderStatus::Delivered => {
                if self.tracking_number.is_none() {
                    return Err(DomainError::InvalidTransition(
                        "Delivery requires a tracking number".to_string(),
                    ));
                }
                self.fulfillment_status = FulfillmentStatus::Delivered;
                if self.delivered_at.is_none() {
                    self.delivered_at = Some(now);
                }
            }
            OrderStatus::Confirmed | OrderStatus::Processing | OrderStatus::Cancelled => {}
        }

        self.status = next;
        Ok(())
    }

    /// Drive the fulfillment axis directly, with the same timestamp
    /// rules as the status-driven transitions.
    pub fn apply_fulfillment(
        &mut self,
        next: FulfillmentStatus,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        match next {
            FulfillmentStatus::Shipped => {
                if self.shipped_at.is_none() {
                    self.shipped_at = Some(now);
                }
            }
            FulfillmentStatus::Delivered => {
                if self.tracking_number.is_none() {
                    return Err(DomainError::InvalidTransition(
                        "Delivery requires a tracking number".to_string(),
                    ));
                }
                if self.delivered_at.is_none() {
                    self.delivered_at = Some(now);
                }
            }
            FulfillmentStatus::Unfulfilled => {}
        }

        self.fulfillment_status = next;
        Ok(())
    }
}

/// Human-facing order number: UTC timestamp plus a random suffix so
/// concurrent creations in the same second cannot collide.
pub fn generate_order_number(now: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "ORD-{}-{}",
        now.format("%Y%m%d%H%M%S"),
        suffix[..6].to_uppercase()
    )
}

#[derive(Debug, Clone)]
pub struct OrderItemView {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
    pub variant_selection: BTreeMap<String, String>,
    pub product_snapshot: ProductSnapshot,
}

#[derive(Debug, Clone)]
pub struct TrackingEventView {
    pub tracking_number: String,
    pub carrier: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct OrderView {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub guest_email: Option<String>,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub fulfillment_status: FulfillmentStatus,
    pub subtotal: BigDecimal,
    pub tax_amount: BigDecimal,
    pub shipping_amount: BigDecimal,
    pub discount_amount: BigDecimal,
    pub total_amount: BigDecimal,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub gateway_order_id: Option<String>,
    pub gateway_capture_id: Option<String>,
    pub gateway_payer_id: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
    pub items: Vec<OrderItemView>,
    pub tracking_events: Vec<TrackingEventView>,
}

impl OrderView {
    pub fn state(&self) -> OrderState {
        OrderState {
            status: self.status,
            fulfillment_status: self.fulfillment_status,
            tracking_number: self.tracking_number.clone(),
            shipped_at: self.shipped_at,
            delivered_at: self.delivered_at,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ListResult {
    pub items: Vec<OrderView>,
    pub total: i64,
}

/// Everything needed to create the aggregate. Item totals are derived
/// from `unit_price × quantity` at persistence time, never accepted
/// from outside.
#[derive(Debug, Clone)]
pub struct NewOrderInput {
    pub customer: CustomerInfo,
    pub items: Vec<CartItem>,
    pub totals: CartTotals,
    pub shipping_address: Address,
    pub billing_address: Address,
    pub gateway_order_id: Option<String>,
    pub gateway_capture_id: Option<String>,
    pub gateway_payer_id: Option<String>,
}

impl NewOrderInput {
    pub fn validate(&self) -> Result<(), DomainError> {
        self.customer.validate()?;
        validate_cart(&self.items)?;
        self.shipping_address.validate()?;
        self.billing_address.validate()?;

        let expected =
            &self.totals.item_total + &self.totals.shipping + &self.totals.tax - &self.totals.discount;
        if self.totals.total != expected {
            return Err(DomainError::InvalidInput(
                "Order total does not match its breakdown".to_string(),
            ));
        }
        Ok(())
    }
}

/// Partial update applied by the admin console. `None` means "leave
/// unchanged"; unknown fields are rejected at the HTTP layer.
#[derive(Debug, Clone, Default)]
pub struct AdminOrderUpdate {
    pub status: Option<OrderStatus>,
    pub payment_status: Option<PaymentStatus>,
    pub fulfillment_status: Option<FulfillmentStatus>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl AdminOrderUpdate {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.payment_status.is_none()
            && self.fulfillment_status.is_none()
            && self.tracking_number.is_none()
            && self.notes.is_none()
            && self.tags.is_none()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;

    fn confirmed_state() -> OrderState {
        OrderState {
            status: OrderStatus::Confirmed,
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            tracking_number: None,
            shipped_at: None,
            delivered_at: None,
        }
    }

    #[test]
    fn shipped_sets_fulfillment_and_timestamp() {
        let mut state = confirmed_state();
        let now = Utc::now();

        state.apply_status(OrderStatus::Shipped, now).expect("transition");

        assert_eq!(state.status, OrderStatus::Shipped);
        assert_eq!(state.fulfillment_status, FulfillmentStatus::Shipped);
        assert_eq!(state.shipped_at, Some(now));
    }

    #[test]
    fn reshipping_keeps_original_shipped_at() {
        let mut state = confirmed_state();
        let first = Utc::now();
        state.apply_status(OrderStatus::Shipped, first).expect("transition");

        let later = first + Duration::hours(2);
        state.apply_status(OrderStatus::Shipped, later).expect("transition");

        assert_eq!(state.shipped_at, Some(first));
    }

    #[test]
    fn delivered_requires_tracking_number() {
        let mut state = confirmed_state();
        let err = state
            .apply_status(OrderStatus::Delivered, Utc::now())
            .expect_err("should reject");
        assert!(matches!(err, DomainError::InvalidTransition(_)));
        assert_eq!(state.status, OrderStatus::Confirmed);
        assert!(state.delivered_at.is_none());
    }

    #[test]
    fn delivered_sets_fulfillment_and_timestamp() {
        let mut state = confirmed_state();
        state.tracking_number = Some("1Z999AA1".to_string());
        let now = Utc::now();

        state
            .apply_status(OrderStatus::Delivered, now)
            .expect("transition");

        assert_eq!(state.fulfillment_status, FulfillmentStatus::Delivered);
        assert_eq!(state.delivered_at, Some(now));
    }

    #[test]
    fn processing_has_no_side_effects() {
        let mut state = confirmed_state();
        state
            .apply_status(OrderStatus::Processing, Utc::now())
            .expect("transition");

        assert_eq!(state.status, OrderStatus::Processing);
        assert_eq!(state.fulfillment_status, FulfillmentStatus::Unfulfilled);
        assert!(state.shipped_at.is_none());
    }

    #[test]
    fn cancelled_is_terminal() {
        let mut state = confirmed_state();
        state
            .apply_status(OrderStatus::Cancelled, Utc::now())
            .expect("transition");

        let err = state
            .apply_status(OrderStatus::Processing, Utc::now())
            .expect_err("should reject");
        assert!(matches!(err, DomainError::InvalidTransition(_)));
    }

    #[test]
    fn direct_fulfillment_shipped_stamps_once() {
        let mut state = confirmed_state();
        let first = Utc::now();
        state
            .apply_fulfillment(FulfillmentStatus::Shipped, first)
            .expect("transition");
        state
            .apply_fulfillment(FulfillmentStatus::Shipped, first + Duration::hours(1))
            .expect("transition");

        assert_eq!(state.shipped_at, Some(first));
    }

    #[test]
    fn order_numbers_carry_timestamp_and_random_suffix() {
        let now = Utc::now();
        let a = generate_order_number(now);
        let b = generate_order_number(now);

        assert!(a.starts_with("ORD-"));
        assert_eq!(a.len(), "ORD-".len() + 14 + 1 + 6);
        // Same timestamp, different suffixes.
        assert_ne!(a, b);
    }

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            OrderStatus::Confirmed,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(status.as_str().parse::<OrderStatus>().expect("parse"), status);
        }
        assert!("REFUNDED".parse::<OrderStatus>().is_err());
    }
}
