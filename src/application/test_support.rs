//! Shared in-memory fakes for the application-service tests. The fake
//! repository mirrors the transition behavior of the diesel repository
//! so orchestration tests exercise the same state machine.

use std::collections::BTreeMap;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use uuid::Uuid;

use crate::domain::checkout::{Address, CartItem, CustomerInfo, ProductSnapshot};
use crate::domain::errors::DomainError;
use crate::domain::order::{
    generate_order_number, AdminOrderUpdate, FulfillmentStatus, ListResult, NewOrderInput,
    OrderItemView, OrderState, OrderStatus, OrderView, PaymentStatus, TrackingEventView,
};
use crate::domain::ports::{
    CreateGatewayOrder, GatewayCapture, GatewayOrder, OrderRepository, PaymentGateway,
};

pub fn dec(s: &str) -> BigDecimal {
    BigDecimal::from_str(s).expect("valid decimal")
}

pub fn item(price: &str, quantity: i32, name: &str) -> CartItem {
    CartItem {
        product_id: Uuid::new_v4(),
        quantity,
        unit_price: dec(price),
        variant_selection: BTreeMap::new(),
        product_snapshot: ProductSnapshot {
            name: name.to_string(),
            description: None,
            images: vec![],
            category: None,
            price: dec(price),
        },
    }
}

pub fn address() -> Address {
    Address {
        full_name: "Ada Lovelace".to_string(),
        line1: "12 Analytical Way".to_string(),
        line2: None,
        city: "London".to_string(),
        state: None,
        postal_code: "N1 9GU".to_string(),
        country: "GB".to_string(),
    }
}

pub fn customer() -> CustomerInfo {
    CustomerInfo {
        user_id: None,
        email: Some("guest@example.com".to_string()),
    }
}

// ── Fake gateway ─────────────────────────────────────────────────────────────

struct GatewayState {
    fail_create: bool,
    fail_capture: bool,
    fail_tracking: bool,
    create_calls: AtomicUsize,
    capture_calls: AtomicUsize,
    tracking_calls: AtomicUsize,
}

#[derive(Clone)]
pub struct FakeGateway {
    state: Arc<GatewayState>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::with_flags(false, false, false)
    }

    pub fn failing_create(self) -> Self {
        Self::with_flags(true, self.state.fail_capture, self.state.fail_tracking)
    }

    pub fn failing_capture(self) -> Self {
        Self::with_flags(self.state.fail_create, true, self.state.fail_tracking)
    }

    pub fn failing_tracking(self) -> Self {
        Self::with_flags(self.state.fail_create, self.state.fail_capture, true)
    }

    fn with_flags(fail_create: bool, fail_capture: bool, fail_tracking: bool) -> Self {
        Self {
            state: Arc::new(GatewayState {
                fail_create,
                fail_capture,
                fail_tracking,
                create_calls: AtomicUsize::new(0),
                capture_calls: AtomicUsize::new(0),
                tracking_calls: AtomicUsize::new(0),
            }),
        }
    }

    pub fn create_calls(&self) -> usize {
        self.state.create_calls.load(Ordering::SeqCst)
    }

    pub fn capture_calls(&self) -> usize {
        self.state.capture_calls.load(Ordering::SeqCst)
    }

    pub fn tracking_calls(&self) -> usize {
        self.state.tracking_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_order(&self, _request: CreateGatewayOrder) -> Result<GatewayOrder, DomainError> {
        if self.state.fail_create {
            return Err(DomainError::Gateway("gateway unavailable".to_string()));
        }
        self.state.create_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayOrder {
            gateway_order_id: "GW-1".to_string(),
            approval_link: "https://gateway.test/approve/GW-1".to_string(),
        })
    }

    async fn capture_order(&self, _gateway_order_id: &str) -> Result<GatewayCapture, DomainError> {
        if self.state.fail_capture {
            return Err(DomainError::Gateway("capture declined".to_string()));
        }
        self.state.capture_calls.fetch_add(1, Ordering::SeqCst);
        Ok(GatewayCapture {
            capture_id: "CAP-1".to_string(),
            payer_id: Some("PAYER-1".to_string()),
            status: "COMPLETED".to_string(),
        })
    }

    async fn submit_tracking(
        &self,
        _capture_id: &str,
        _tracking_number: &str,
        _carrier: &str,
    ) -> Result<(), DomainError> {
        if self.state.fail_tracking {
            return Err(DomainError::Gateway("tracker rejected".to_string()));
        }
        self.state.tracking_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ── Fake repository ──────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct InMemoryOrderRepo {
    orders: Arc<Mutex<Vec<OrderView>>>,
    fail_create: bool,
}

impl InMemoryOrderRepo {
    pub fn new() -> Self {
        Self {
            orders: Arc::new(Mutex::new(Vec::new())),
            fail_create: false,
        }
    }

    pub fn failing_create(self) -> Self {
        Self {
            orders: self.orders,
            fail_create: true,
        }
    }

    pub fn seed(&self, input: NewOrderInput) -> Result<OrderView, DomainError> {
        self.create(input)
    }

    pub fn order_count(&self) -> usize {
        self.orders.lock().expect("lock poisoned").len()
    }

    fn mutate<F>(&self, order_id: Uuid, f: F) -> Result<OrderView, DomainError>
    where
        F: FnOnce(&mut OrderView) -> Result<(), DomainError>,
    {
        let mut orders = self.orders.lock().expect("lock poisoned");
        let order = orders
            .iter_mut()
            .find(|o| o.id == order_id)
            .ok_or(DomainError::NotFound)?;
        f(order)?;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }
}

fn write_state(order: &mut OrderView, state: OrderState) {
    order.status = state.status;
    order.fulfillment_status = state.fulfillment_status;
    order.tracking_number = state.tracking_number;
    order.shipped_at = state.shipped_at;
    order.delivered_at = state.delivered_at;
}

impl OrderRepository for InMemoryOrderRepo {
    fn create(&self, input: NewOrderInput) -> Result<OrderView, DomainError> {
        if self.fail_create {
            return Err(DomainError::Internal(
                "simulated persistence failure".to_string(),
            ));
        }

        let mut orders = self.orders.lock().expect("lock poisoned");
        if let Some(capture_id) = &input.gateway_capture_id {
            if orders.iter().any(|o| o.gateway_capture_id.as_ref() == Some(capture_id)) {
                return Err(DomainError::Conflict(format!(
                    "duplicate capture id {}",
                    capture_id
                )));
            }
        }

        let now = Utc::now();
        let order = OrderView {
            id: Uuid::new_v4(),
            order_number: generate_order_number(now),
            customer_id: input.customer.user_id,
            guest_email: input.customer.email.clone(),
            status: OrderStatus::Confirmed,
            payment_status: PaymentStatus::Paid,
            fulfillment_status: FulfillmentStatus::Unfulfilled,
            subtotal: input.totals.item_total.clone(),
            tax_amount: input.totals.tax.clone(),
            shipping_amount: input.totals.shipping.clone(),
            discount_amount: input.totals.discount.clone(),
            total_amount: input.totals.total.clone(),
            shipping_address: input.shipping_address.clone(),
            billing_address: input.billing_address.clone(),
            gateway_order_id: input.gateway_order_id.clone(),
            gateway_capture_id: input.gateway_capture_id.clone(),
            gateway_payer_id: input.gateway_payer_id.clone(),
            tracking_number: None,
            notes: None,
            tags: vec![],
            created_at: now,
            updated_at: now,
            shipped_at: None,
            delivered_at: None,
            items: input
                .items
                .iter()
                .map(|item| OrderItemView {
                    id: Uuid::new_v4(),
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price.clone(),
                    total_price: &item.unit_price * BigDecimal::from(item.quantity),
                    variant_selection: item.variant_selection.clone(),
                    product_snapshot: item.product_snapshot.clone(),
                })
                .collect(),
            tracking_events: vec![],
        };
        orders.push(order.clone());
        Ok(order)
    }

    fn find_by_id(&self, id: Uuid) -> Result<Option<OrderView>, DomainError> {
        let orders = self.orders.lock().expect("lock poisoned");
        Ok(orders.iter().find(|o| o.id == id).cloned())
    }

    fn find_by_capture_id(&self, capture_id: &str) -> Result<Option<OrderView>, DomainError> {
        let orders = self.orders.lock().expect("lock poisoned");
        Ok(orders
            .iter()
            .find(|o| o.gateway_capture_id.as_deref() == Some(capture_id))
            .cloned())
    }

    fn list(&self, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        let orders = self.orders.lock().expect("lock poisoned");
        let total = orders.len() as i64;
        let start = ((page - 1) * limit).max(0) as usize;
        let items = orders
            .iter()
            .rev()
            .skip(start)
            .take(limit.max(0) as usize)
            .cloned()
            .collect();
        Ok(ListResult { items, total })
    }

    fn add_tracking(
        &self,
        order_id: Uuid,
        tracking_number: &str,
        carrier: &str,
    ) -> Result<OrderView, DomainError> {
        self.mutate(order_id, |order| {
            let now = Utc::now();
            if !order
                .tracking_events
                .iter()
                .any(|e| e.tracking_number == tracking_number)
            {
                order.tracking_events.push(TrackingEventView {
                    tracking_number: tracking_number.to_string(),
                    carrier: carrier.to_string(),
                    created_at: now,
                });
            }
            let mut state = order.state();
            state.tracking_number = Some(tracking_number.to_string());
            state.apply_status(OrderStatus::Shipped, now)?;
            write_state(order, state);
            Ok(())
        })
    }

    fn mark_delivered(&self, order_id: Uuid) -> Result<OrderView, DomainError> {
        self.mutate(order_id, |order| {
            let mut state = order.state();
            state.apply_status(OrderStatus::Delivered, Utc::now())?;
            write_state(order, state);
            Ok(())
        })
    }

    fn apply_admin_update(
        &self,
        order_id: Uuid,
        update: AdminOrderUpdate,
    ) -> Result<OrderView, DomainError> {
        self.mutate(order_id, |order| {
            let now = Utc::now();
            let mut state = order.state();
            if let Some(tracking) = &update.tracking_number {
                state.tracking_number = Some(tracking.clone());
            }
            if let Some(next) = update.status {
                state.apply_status(next, now)?;
            }
            if let Some(next) = update.fulfillment_status {
                state.apply_fulfillment(next, now)?;
            }
            write_state(order, state);
            if let Some(payment) = update.payment_status {
                order.payment_status = payment;
            }
            if let Some(notes) = update.notes {
                order.notes = Some(notes);
            }
            if let Some(tags) = update.tags {
                order.tags = tags;
            }
            Ok(())
        })
    }
}
