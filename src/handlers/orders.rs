use std::collections::BTreeMap;
use std::future::{ready, Ready};
use std::str::FromStr;

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::domain::checkout::Address;
use crate::domain::order::{
    AdminOrderUpdate, FulfillmentStatus, OrderStatus, OrderView, PaymentStatus,
};
use crate::domain::pricing::to_money;
use crate::errors::AppError;
use crate::{AdminToken, AppFulfillmentService};

// ── Admin authorization ──────────────────────────────────────────────────────

/// Extractor that gates admin endpoints on the configured API token
/// (`Authorization: Bearer <token>`).
pub struct AdminAuth;

impl FromRequest for AdminAuth {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let configured = req.app_data::<web::Data<AdminToken>>();
        let provided = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "));

        ready(match (configured, provided) {
            (Some(token), Some(provided)) if provided == token.0 => Ok(AdminAuth),
            _ => Err(AppError::Unauthorized),
        })
    }
}

// ── Response DTOs ────────────────────────────────────────────────────────────

#[derive(Debug, Serialize, ToSchema)]
pub struct AddressResponse {
    pub full_name: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub state: Option<String>,
    pub postal_code: String,
    pub country: String,
}

impl From<Address> for AddressResponse {
    fn from(a: Address) -> Self {
        AddressResponse {
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

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductSnapshotResponse {
    pub name: String,
    pub description: Option<String>,
    pub images: Vec<String>,
    pub category: Option<String>,
    pub price: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderItemResponse {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: String,
    pub total_price: String,
    pub variant_selection: BTreeMap<String, String>,
    pub product_snapshot: ProductSnapshotResponse,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TrackingEventResponse {
    pub tracking_number: String,
    pub carrier: String,
    pub created_at: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderResponse {
    pub id: Uuid,
    pub order_number: String,
    pub customer_id: Option<Uuid>,
    pub guest_email: Option<String>,
    pub status: String,
    pub payment_status: String,
    pub fulfillment_status: String,
    pub subtotal: String,
    pub tax_amount: String,
    pub shipping_amount: String,
    pub discount_amount: String,
    pub total_amount: String,
    pub shipping_address: AddressResponse,
    pub billing_address: AddressResponse,
    pub gateway_order_id: Option<String>,
    pub gateway_capture_id: Option<String>,
    pub gateway_payer_id: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub tags: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
    pub shipped_at: Option<String>,
    pub delivered_at: Option<String>,
    pub items: Vec<OrderItemResponse>,
    pub tracking_events: Vec<TrackingEventResponse>,
}

impl From<OrderView> for OrderResponse {
    fn from(order: OrderView) -> Self {
        OrderResponse {
            id: order.id,
            order_number: order.order_number,
            customer_id: order.customer_id,
            guest_email: order.guest_email,
            status: order.status.as_str().to_string(),
            payment_status: order.payment_status.as_str().to_string(),
            fulfillment_status: order.fulfillment_status.as_str().to_string(),
            subtotal: to_money(&order.subtotal).to_string(),
            tax_amount: to_money(&order.tax_amount).to_string(),
            shipping_amount: to_money(&order.shipping_amount).to_string(),
            discount_amount: to_money(&order.discount_amount).to_string(),
            total_amount: to_money(&order.total_amount).to_string(),
            shipping_address: order.shipping_address.into(),
            billing_address: order.billing_address.into(),
            gateway_order_id: order.gateway_order_id,
            gateway_capture_id: order.gateway_capture_id,
            gateway_payer_id: order.gateway_payer_id,
            tracking_number: order.tracking_number,
            notes: order.notes,
            tags: order.tags,
            created_at: order.created_at.to_rfc3339(),
            updated_at: order.updated_at.to_rfc3339(),
            shipped_at: order.shipped_at.map(|t| t.to_rfc3339()),
            delivered_at: order.delivered_at.map(|t| t.to_rfc3339()),
            items: order
                .items
                .into_iter()
                .map(|item| OrderItemResponse {
                    id: item.id,
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: to_money(&item.unit_price).to_string(),
                    total_price: to_money(&item.total_price).to_string(),
                    variant_selection: item.variant_selection,
                    product_snapshot: ProductSnapshotResponse {
                        name: item.product_snapshot.name,
                        description: item.product_snapshot.description,
                        images: item.product_snapshot.images,
                        category: item.product_snapshot.category,
                        price: to_money(&item.product_snapshot.price).to_string(),
                    },
                })
                .collect(),
            tracking_events: order
                .tracking_events
                .into_iter()
                .map(|event| TrackingEventResponse {
                    tracking_number: event.tracking_number,
                    carrier: event.carrier,
                    created_at: event.created_at.to_rfc3339(),
                })
                .collect(),
        }
    }
}

// ── Pagination ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize, ToSchema)]
pub struct ListOrdersParams {
    /// Page number (1-based). Defaults to 1.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Number of items per page. Defaults to 20, maximum 100.
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    20
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ListOrdersResponse {
    pub items: Vec<OrderResponse>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
}

// ── Admin mutation DTOs ──────────────────────────────────────────────────────

/// Unknown fields are rejected rather than silently ignored.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AdminUpdateRequest {
    pub status: Option<String>,
    pub payment_status: Option<String>,
    pub fulfillment_status: Option<String>,
    pub tracking_number: Option<String>,
    pub notes: Option<String>,
    pub tags: Option<Vec<String>>,
}

impl AdminUpdateRequest {
    fn into_domain(self) -> Result<AdminOrderUpdate, AppError> {
        Ok(AdminOrderUpdate {
            status: self
                .status
                .map(|s| OrderStatus::from_str(&s))
                .transpose()
                .map_err(AppError::from)?,
            payment_status: self
                .payment_status
                .map(|s| PaymentStatus::from_str(&s))
                .transpose()
                .map_err(AppError::from)?,
            fulfillment_status: self
                .fulfillment_status
                .map(|s| FulfillmentStatus::from_str(&s))
                .transpose()
                .map_err(AppError::from)?,
            tracking_number: self.tracking_number,
            notes: self.notes,
            tags: self.tags,
        })
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AddTrackingRequest {
    pub tracking_number: String,
    pub carrier: String,
}

// ── Handlers ─────────────────────────────────────────────────────────────────

/// GET /orders
///
/// Returns a paginated list of orders, newest first, without their
/// items or tracking history.
#[utoipa::path(
    get,
    path = "/orders",
    params(
        ("page" = Option<i64>, Query, description = "Page number (1-based, default 1)"),
        ("limit" = Option<i64>, Query, description = "Items per page (default 20, max 100)"),
    ),
    responses(
        (status = 200, description = "Paginated list of orders", body = ListOrdersResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn list_orders(
    _auth: AdminAuth,
    service: web::Data<AppFulfillmentService>,
    query: web::Query<ListOrdersParams>,
) -> Result<HttpResponse, AppError> {
    let params = query.into_inner();
    let page = params.page.max(1);
    let limit = params.limit.clamp(1, 100);

    let result = web::block(move || service.list_orders(page, limit))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(ListOrdersResponse {
        items: result.items.into_iter().map(OrderResponse::from).collect(),
        total: result.total,
        page,
        limit,
    }))
}

/// GET /orders/{id}
///
/// Returns the order together with its items and tracking history.
#[utoipa::path(
    get,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order found", body = OrderResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "Order not found"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn get_order(
    _auth: AdminAuth,
    service: web::Data<AppFulfillmentService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let result = web::block(move || service.get_order(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    match result {
        Some(order) => Ok(HttpResponse::Ok().json(OrderResponse::from(order))),
        None => Err(AppError::NotFound),
    }
}

/// PATCH /orders/{id}
///
/// Partial admin update. Status changes apply the same side-effect
/// rules as the fulfillment flow.
#[utoipa::path(
    patch,
    path = "/orders/{id}",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    request_body = AdminUpdateRequest,
    responses(
        (status = 200, description = "Order updated", body = OrderResponse),
        (status = 400, description = "Invalid field value"),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Rejected transition"),
        (status = 500, description = "Internal server error"),
    ),
    tag = "orders"
)]
pub async fn admin_update_order(
    _auth: AdminAuth,
    service: web::Data<AppFulfillmentService>,
    path: web::Path<Uuid>,
    body: web::Json<AdminUpdateRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let update = body.into_inner().into_domain()?;

    let order = web::block(move || service.admin_update(order_id, update))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /orders/{id}/tracking
///
/// Submits tracking to the payment gateway and marks the order shipped.
/// Repeating the same tracking number is a no-op.
#[utoipa::path(
    post,
    path = "/orders/{id}/tracking",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    request_body = AddTrackingRequest,
    responses(
        (status = 200, description = "Tracking recorded", body = OrderResponse),
        (status = 400, description = "Missing tracking data or no capture on the order"),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "Order not found"),
        (status = 502, description = "Gateway rejected the tracker"),
    ),
    tag = "orders"
)]
pub async fn add_tracking(
    _auth: AdminAuth,
    service: web::Data<AppFulfillmentService>,
    path: web::Path<Uuid>,
    body: web::Json<AddTrackingRequest>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();
    let body = body.into_inner();

    let order = service
        .add_tracking(order_id, &body.tracking_number, &body.carrier)
        .await?;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}

/// POST /orders/{id}/delivered
///
/// Marks a shipped order as delivered.
#[utoipa::path(
    post,
    path = "/orders/{id}/delivered",
    params(
        ("id" = Uuid, Path, description = "Order UUID"),
    ),
    responses(
        (status = 200, description = "Order delivered", body = OrderResponse),
        (status = 401, description = "Missing or invalid admin token"),
        (status = 404, description = "Order not found"),
        (status = 409, description = "Order has not shipped yet"),
    ),
    tag = "orders"
)]
pub async fn mark_delivered(
    _auth: AdminAuth,
    service: web::Data<AppFulfillmentService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse, AppError> {
    let order_id = path.into_inner();

    let order = web::block(move || service.mark_delivered(order_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;

    Ok(HttpResponse::Ok().json(OrderResponse::from(order)))
}
