use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::schema::{order_items, order_tracking_events, orders};

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable)]
#[diesel(table_name = orders)]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub guest_email: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub fulfillment_status: String,
    pub subtotal: BigDecimal,
    pub tax_amount: BigDecimal,
    pub shipping_amount: BigDecimal,
    pub discount_amount: BigDecimal,
    pub total_amount: BigDecimal,
    pub shipping_address: Value,
    pub billing_address: Value,
    pub gateway_order_id: Option<String>,
    pub gateway_capture_id: Option<String>,
    pub gateway_payer_id: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub tags: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub shipped_at: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = orders)]
pub struct NewOrderRow {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub guest_email: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub fulfillment_status: String,
    pub subtotal: BigDecimal,
    pub tax_amount: BigDecimal,
    pub shipping_amount: BigDecimal,
    pub discount_amount: BigDecimal,
    pub total_amount: BigDecimal,
    pub shipping_address: Value,
    pub billing_address: Value,
    pub gateway_order_id: Option<String>,
    pub gateway_capture_id: Option<String>,
    pub gateway_payer_id: Option<String>,
}

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations,
)]
#[diesel(table_name = order_items)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct OrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
    pub variant_selection: Value,
    pub product_snapshot: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_items)]
pub struct NewOrderItemRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: BigDecimal,
    pub total_price: BigDecimal,
    pub variant_selection: Value,
    pub product_snapshot: Value,
}

#[derive(
    Debug, Clone, Serialize, Deserialize, Queryable, Selectable, Identifiable, Associations,
)]
#[diesel(table_name = order_tracking_events)]
#[diesel(belongs_to(OrderRow, foreign_key = order_id))]
#[diesel(check_for_backend(diesel::pg::Pg))]
pub struct TrackingEventRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub tracking_number: String,
    pub carrier: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Insertable)]
#[diesel(table_name = order_tracking_events)]
pub struct NewTrackingEventRow {
    pub id: Uuid,
    pub order_id: Uuid,
    pub tracking_number: String,
    pub carrier: String,
}
