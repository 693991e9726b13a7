use async_trait::async_trait;
use bigdecimal::BigDecimal;
use uuid::Uuid;

use super::checkout::{Address, CartItem, CheckoutSession};
use super::errors::DomainError;
use super::order::{AdminOrderUpdate, ListResult, NewOrderInput, OrderView};

pub trait OrderRepository: Send + Sync + 'static {
    /// Create the order aggregate (order row plus all item rows) in one
    /// transaction.
    fn create(&self, input: NewOrderInput) -> Result<OrderView, DomainError>;

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError>;

    /// Lookup by the gateway capture id, the idempotency key for
    /// capture reconciliation.
    fn find_by_capture_id(&self, capture_id: &str) -> Result<Option<OrderView>, DomainError>;

    fn list(&self, page: i64, limit: i64) -> Result<ListResult, DomainError>;

    /// Record a tracking number: append a history entry (unless one for
    /// this tracking number already exists) and apply the shipped
    /// transition.
    fn add_tracking(
        &self,
        order_id: Uuid,
        tracking_number: &str,
        carrier: &str,
    ) -> Result<OrderView, DomainError>;

    fn mark_delivered(&self, order_id: Uuid) -> Result<OrderView, DomainError>;

    fn apply_admin_update(
        &self,
        order_id: Uuid,
        update: AdminOrderUpdate,
    ) -> Result<OrderView, DomainError>;
}

/// Amounts submitted to the gateway when opening a remote order.
#[derive(Debug, Clone)]
pub struct GatewayAmount {
    pub item_total: BigDecimal,
    pub shipping: BigDecimal,
    pub tax: BigDecimal,
    pub discount: BigDecimal,
    pub total: BigDecimal,
}

#[derive(Debug, Clone)]
pub struct CreateGatewayOrder {
    pub amount: GatewayAmount,
    pub items: Vec<CartItem>,
    pub shipping_address: Address,
    pub return_url: String,
    pub cancel_url: String,
}

/// The gateway-side order created before capture.
#[derive(Debug, Clone)]
pub struct GatewayOrder {
    pub gateway_order_id: String,
    pub approval_link: String,
}

/// Result of the capture call. `capture_id` is the durable payment
/// reference everything downstream joins on.
#[derive(Debug, Clone)]
pub struct GatewayCapture {
    pub capture_id: String,
    pub payer_id: Option<String>,
    pub status: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync + 'static {
    async fn create_order(&self, request: CreateGatewayOrder) -> Result<GatewayOrder, DomainError>;

    /// Moves the money. Never retried by callers: a timed-out capture
    /// must surface as an error, not a second attempt.
    async fn capture_order(&self, gateway_order_id: &str) -> Result<GatewayCapture, DomainError>;

    async fn submit_tracking(
        &self,
        capture_id: &str,
        tracking_number: &str,
        carrier: &str,
    ) -> Result<(), DomainError>;
}

pub trait CheckoutSessionStore: Send + Sync + 'static {
    fn put(&self, session: CheckoutSession);
    fn get(&self, gateway_order_id: &str) -> Option<CheckoutSession>;
    fn remove(&self, gateway_order_id: &str) -> Option<CheckoutSession>;
}
