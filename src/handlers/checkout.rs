use std::collections::BTreeMap;
use std::str::FromStr;

use actix_web::{web, HttpResponse};
use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::application::checkout_service::{DirectOrderRequest, OpenCheckoutRequest};
use crate::domain::checkout::{Address, CartItem, CustomerInfo, ProductSnapshot};
use crate::errors::AppError;
use crate::AppCheckoutService;

use super::orders::OrderResponse;

// ── Request / response DTOs ──────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddressRequest {
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

impl From<AddressRequest> for Address {
    fn from(a: AddressRequest) -> Self {
        Address {
            full_name: a.full_name,
            line1: a.line1,
            line2: a.line2,
            city: a.city,
            state: a.state,
            postal_code: a.postal_code,
            country: a.country,
        }
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CustomerRequest {
    #[serde(default)]
    pub user_id: Option<Uuid>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductSnapshotRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub category: Option<String>,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub price: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CartItemRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Decimal price as a string to avoid floating-point issues, e.g. "9.99"
    pub unit_price: String,
    #[serde(default)]
    pub variant_selection: BTreeMap<String, String>,
    pub product_snapshot: ProductSnapshotRequest,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OpenCheckoutRequestBody {
    pub items: Vec<CartItemRequest>,
    pub customer: CustomerRequest,
    pub shipping_address: AddressRequest,
    #[serde(default)]
    pub billing_address: Option<AddressRequest>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OpenCheckoutResponse {
    pub gateway_order_id: String,
    pub approval_link: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentResponse {
    pub capture_id: String,
    pub payer_id: Option<String>,
    pub status: String,
}

/// The payment block always reflects the gateway's capture result; the
/// order is absent (with a warning) when local reconciliation is still
/// outstanding.
#[derive(Debug, Serialize, ToSchema)]
pub struct CaptureCheckoutResponse {
    pub payment: PaymentResponse,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<OrderResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct DirectOrderRequestBody {
    pub items: Vec<CartItemRequest>,
    pub customer: CustomerRequest,
    pub shipping_address: AddressRequest,
    #[serde(default)]
    pub billing_address: Option<AddressRequest>,
    /// Reference of the already-completed payment, e.g. a capture id.
    pub payment_reference: String,
}

fn parse_decimal(raw: &str, field: &str) -> Result<BigDecimal, AppError> {
    BigDecimal::from_str(raw)
        .map_err(|e| AppError::Validation(format!("Invalid {} '{}': {}", field, raw, e)))
}

fn items_to_domain(items: Vec<CartItemRequest>) -> Result<Vec<CartItem>, AppError> {
    items
        .into_iter()
        .map(|item| {
            Ok(CartItem {
                product_id: item.product_id,
                quantity: item.quantity,
                unit_price: parse_decimal(&item.unit_price, "unit_price")?,
                variant_selection: item.variant_selection,
                product_snapshot: ProductSnapshot {
                    name: item.product_snapshot.name,
                    description: item.product_snapshot.description,
                    images: item.product_snapshot.images,
                    category: item.product_snapshot.category,
                    price: parse_decimal(&item.product_snapshot.price, "product price")?,
                },
            })
        })
        .collect()
}

fn customer_to_domain(customer: CustomerRequest) -> CustomerInfo {
    CustomerInfo {
        user_id: customer.user_id,
        email: customer.email,
    }
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// POST /checkout
///
/// Prices the cart, creates a gateway order, and stashes the checkout
/// session. Nothing durable is written; failures here are safe to
/// retry.
#[utoipa::path(
    post,
    path = "/checkout",
    request_body = OpenCheckoutRequestBody,
    responses(
        (status = 201, description = "Gateway order created", body = OpenCheckoutResponse),
        (status = 400, description = "Invalid cart, customer, or address"),
        (status = 502, description = "Gateway rejected the order"),
    ),
    tag = "checkout"
)]
pub async fn open_checkout(
    service: web::Data<AppCheckoutService>,
    body: web::Json<OpenCheckoutRequestBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let request = OpenCheckoutRequest {
        items: items_to_domain(body.items)?,
        customer: customer_to_domain(body.customer),
        shipping_address: body.shipping_address.into(),
        billing_address: body.billing_address.map(Address::from),
    };

    let result = service.open_checkout(request).await?;

    Ok(HttpResponse::Created().json(OpenCheckoutResponse {
        gateway_order_id: result.gateway_order_id,
        approval_link: result.approval_link,
    }))
}

/// POST /checkout/{gateway_order_id}/capture
///
/// Captures the payment and reconciles the durable order record. A
/// missing session or failed persistence degrades to a warning; the
/// capture result is always reported.
#[utoipa::path(
    post,
    path = "/checkout/{gateway_order_id}/capture",
    params(
        ("gateway_order_id" = String, Path, description = "Gateway order id returned by POST /checkout"),
    ),
    responses(
        (status = 200, description = "Payment captured", body = CaptureCheckoutResponse),
        (status = 502, description = "Gateway rejected the capture"),
    ),
    tag = "checkout"
)]
pub async fn capture_checkout(
    service: web::Data<AppCheckoutService>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let gateway_order_id = path.into_inner();

    let outcome = service.capture_checkout(&gateway_order_id).await?;

    Ok(HttpResponse::Ok().json(CaptureCheckoutResponse {
        payment: PaymentResponse {
            capture_id: outcome.payment.capture_id,
            payer_id: outcome.payment.payer_id,
            status: outcome.payment.status,
        },
        order: outcome.order.map(OrderResponse::from),
        warning: outcome.warning.map(|w| w.to_string()),
    }))
}

/// POST /orders
///
/// Guest path that records an order for an already-completed payment.
/// Totals are re-derived server-side from the submitted unit prices.
#[utoipa::path(
    post,
    path = "/orders",
    request_body = DirectOrderRequestBody,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Invalid cart, customer, address, or payment reference"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "checkout"
)]
pub async fn create_order_direct(
    service: web::Data<AppCheckoutService>,
    body: web::Json<DirectOrderRequestBody>,
) -> Result<HttpResponse, AppError> {
    let body = body.into_inner();
    let request = DirectOrderRequest {
        items: items_to_domain(body.items)?,
        customer: customer_to_domain(body.customer),
        shipping_address: body.shipping_address.into(),
        billing_address: body.billing_address.map(Address::from),
        payment_reference: body.payment_reference,
    };

    let order = web::block(move || service.create_order_direct(request))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Created().json(OrderResponse::from(order)))
}
