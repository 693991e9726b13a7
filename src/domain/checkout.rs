use std::collections::BTreeMap;

use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::errors::DomainError;
use super::pricing::CartTotals;

/// A structured postal address, snapshotted onto orders so they stay
/// valid even if the customer later edits their address book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub full_name: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    #[serde(default)]
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl Address {
    pub fn validate(&self) -> Result<(), DomainError> {
        for (field, value) in [
            ("full_name", &self.full_name),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::InvalidInput(format!(
                    "Address field '{}' must not be empty",
                    field
                )));
            }
        }
        Ok(())
    }
}

/// Who is buying: a registered user, a guest email, or both.
/// At least one of the two must be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CustomerInfo {
    pub user_id: Option<Uuid>,
    pub email: Option<String>,
}

impl CustomerInfo {
    pub fn validate(&self) -> Result<(), DomainError> {
        let has_email = self.email.as_deref().is_some_and(|e| !e.trim().is_empty());
        if self.user_id.is_none() && !has_email {
            return Err(DomainError::InvalidInput(
                "Either a registered user or a guest email is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// Point-in-time copy of the product's display data, embedded in order
/// items so order history survives catalog edits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSnapshot {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    pub price: BigDecimal,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    #[serde(default)]
    pub variant_selection: BTreeMap<String, String>,
    pub product_snapshot: ProductSnapshot,
}

pub fn validate_cart(items: &[CartItem]) -> Result<(), DomainError> {
    if items.is_empty() {
        return Err(DomainError::InvalidInput("Cart is empty".to_string()));
    }
    for item in items {
        if item.quantity < 1 {
            return Err(DomainError::InvalidInput(format!(
                "Quantity for product {} must be at least 1",
                item.product_id
            )));
        }
        if item.unit_price < BigDecimal::from(0) {
            return Err(DomainError::InvalidInput(format!(
                "Unit price for product {} must not be negative",
                item.product_id
            )));
        }
    }
    Ok(())
}

/// Snapshot of a checkout between gateway order creation and capture,
/// keyed by the gateway-issued order id.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub gateway_order_id: String,
    pub items: Vec<CartItem>,
    pub customer: CustomerInfo,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub totals: CartTotals,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    fn snapshot() -> ProductSnapshot {
        ProductSnapshot {
            name: "Canvas Tote".to_string(),
            description: None,
            images: vec![],
            category: None,
            price: BigDecimal::from_str("25.00").expect("valid decimal"),
        }
    }

    fn item(quantity: i32, price: &str) -> CartItem {
        CartItem {
            product_id: Uuid::new_v4(),
            quantity,
            unit_price: BigDecimal::from_str(price).expect("valid decimal"),
            variant_selection: BTreeMap::new(),
            product_snapshot: snapshot(),
        }
    }

    #[test]
    fn empty_cart_is_rejected() {
        assert!(validate_cart(&[]).is_err());
    }

    #[test]
    fn zero_quantity_is_rejected() {
        assert!(validate_cart(&[item(0, "25.00")]).is_err());
    }

    #[test]
    fn negative_price_is_rejected() {
        assert!(validate_cart(&[item(1, "-1.00")]).is_err());
    }

    #[test]
    fn valid_cart_passes() {
        assert!(validate_cart(&[item(2, "25.00")]).is_ok());
    }

    #[test]
    fn customer_needs_user_or_email() {
        let neither = CustomerInfo::default();
        assert!(neither.validate().is_err());

        let blank_email = CustomerInfo {
            user_id: None,
            email: Some("   ".to_string()),
        };
        assert!(blank_email.validate().is_err());

        let guest = CustomerInfo {
            user_id: None,
            email: Some("guest@example.com".to_string()),
        };
        assert!(guest.validate().is_ok());

        let registered = CustomerInfo {
            user_id: Some(Uuid::new_v4()),
            email: None,
        };
        assert!(registered.validate().is_ok());
    }

    #[test]
    fn address_rejects_blank_required_fields() {
        let addr = Address {
            full_name: "Ada Lovelace".to_string(),
            line1: "".to_string(),
            line2: None,
            city: "London".to_string(),
            state: None,
            postal_code: "N1 9GU".to_string(),
            country: "GB".to_string(),
        };
        assert!(addr.validate().is_err());
    }
}
