use uuid::Uuid;

use crate::domain::errors::DomainError;
use crate::domain::order::{AdminOrderUpdate, ListResult, OrderView};
use crate::domain::ports::{OrderRepository, PaymentGateway};

/// Post-purchase operations: shipment tracking sync with the gateway,
/// delivery confirmation, and admin mutation of existing orders.
pub struct FulfillmentService<G, R> {
    gateway: G,
    repo: R,
}

impl<G, R> FulfillmentService<G, R>
where
    G: PaymentGateway,
    R: OrderRepository,
{
    pub fn new(gateway: G, repo: R) -> Self {
        Self { gateway, repo }
    }

    /// Push tracking data to the gateway, then record it locally and
    /// apply the shipped transition. Repeating a tracking number is a
    /// no-op: the gateway is not called again and no duplicate history
    /// entry is written.
    pub async fn add_tracking(
        &self,
        order_id: Uuid,
        tracking_number: &str,
        carrier: &str,
    ) -> Result<OrderView, DomainError> {
        let tracking_number = tracking_number.trim();
        let carrier = carrier.trim();
        if tracking_number.is_empty() || carrier.is_empty() {
            return Err(DomainError::InvalidInput(
                "Tracking number and carrier are required".to_string(),
            ));
        }

        let order = self.repo.find_by_id(order_id)?.ok_or(DomainError::NotFound)?;
        let Some(capture_id) = order.gateway_capture_id.clone() else {
            return Err(DomainError::InvalidInput(
                "Order has no payment capture to attach tracking to".to_string(),
            ));
        };

        if order
            .tracking_events
            .iter()
            .any(|event| event.tracking_number == tracking_number)
        {
            return Ok(order);
        }

        self.gateway
            .submit_tracking(&capture_id, tracking_number, carrier)
            .await?;

        let updated = self.repo.add_tracking(order_id, tracking_number, carrier)?;
        log::info!(
            "Order {} shipped with tracking {} ({})",
            updated.order_number,
            tracking_number,
            carrier
        );
        Ok(updated)
    }

    pub fn mark_delivered(&self, order_id: Uuid) -> Result<OrderView, DomainError> {
        self.repo.mark_delivered(order_id)
    }

    pub fn admin_update(
        &self,
        order_id: Uuid,
        update: AdminOrderUpdate,
    ) -> Result<OrderView, DomainError> {
        if update.is_empty() {
            return Err(DomainError::InvalidInput(
                "Update contains no fields".to_string(),
            ));
        }
        self.repo.apply_admin_update(order_id, update)
    }

    pub fn get_order(&self, order_id: Uuid) -> Result<Option<OrderView>, DomainError> {
        self.repo.find_by_id(order_id)
    }

    pub fn list_orders(&self, page: i64, limit: i64) -> Result<ListResult, DomainError> {
        self.repo.list(page, limit)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{address, customer, item, FakeGateway, InMemoryOrderRepo};
    use super::*;
    use crate::domain::order::{FulfillmentStatus, NewOrderInput, OrderStatus};
    use crate::domain::pricing::price_cart;

    fn seeded_repo(capture_id: Option<&str>) -> (InMemoryOrderRepo, Uuid) {
        let repo = InMemoryOrderRepo::new();
        let items = vec![item("50.00", 1, "Mug")];
        let lines: Vec<_> = items
            .iter()
            .map(|i| (i.unit_price.clone(), i.quantity))
            .collect();
        let order = repo
            .seed(NewOrderInput {
                customer: customer(),
                items,
                totals: price_cart(&lines),
                shipping_address: address(),
                billing_address: address(),
                gateway_order_id: Some("GW-1".to_string()),
                gateway_capture_id: capture_id.map(str::to_string),
                gateway_payer_id: None,
            })
            .expect("seed failed");
        (repo, order.id)
    }

    #[tokio::test]
    async fn add_tracking_syncs_gateway_and_ships_order() {
        let gateway = FakeGateway::new();
        let (repo, order_id) = seeded_repo(Some("CAP-1"));
        let svc = FulfillmentService::new(gateway.clone(), repo);

        let order = svc
            .add_tracking(order_id, "1Z999AA1", "UPS")
            .await
            .expect("add_tracking failed");

        assert_eq!(gateway.tracking_calls(), 1);
        assert_eq!(order.status, OrderStatus::Shipped);
        assert_eq!(order.fulfillment_status, FulfillmentStatus::Shipped);
        assert_eq!(order.tracking_events.len(), 1);
        assert!(order.shipped_at.is_some());
    }

    #[tokio::test]
    async fn repeated_tracking_number_skips_the_gateway() {
        let gateway = FakeGateway::new();
        let (repo, order_id) = seeded_repo(Some("CAP-1"));
        let svc = FulfillmentService::new(gateway.clone(), repo);

        let first = svc
            .add_tracking(order_id, "1Z999AA1", "UPS")
            .await
            .expect("first add_tracking failed");
        let second = svc
            .add_tracking(order_id, "1Z999AA1", "UPS")
            .await
            .expect("second add_tracking failed");

        assert_eq!(gateway.tracking_calls(), 1);
        assert_eq!(second.tracking_events.len(), 1);
        assert_eq!(second.shipped_at, first.shipped_at);
    }

    #[tokio::test]
    async fn add_tracking_requires_a_capture() {
        let gateway = FakeGateway::new();
        let (repo, order_id) = seeded_repo(None);
        let svc = FulfillmentService::new(gateway.clone(), repo);

        let err = svc
            .add_tracking(order_id, "1Z999AA1", "UPS")
            .await
            .expect_err("should reject");

        assert!(matches!(err, DomainError::InvalidInput(_)));
        assert_eq!(gateway.tracking_calls(), 0);
    }

    #[tokio::test]
    async fn add_tracking_rejects_blank_input() {
        let gateway = FakeGateway::new();
        let (repo, order_id) = seeded_repo(Some("CAP-1"));
        let svc = FulfillmentService::new(gateway.clone(), repo);

        let err = svc
            .add_tracking(order_id, "  ", "UPS")
            .await
            .expect_err("should reject");
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn add_tracking_unknown_order_is_not_found() {
        let gateway = FakeGateway::new();
        let svc = FulfillmentService::new(gateway.clone(), InMemoryOrderRepo::new());

        let err = svc
            .add_tracking(Uuid::new_v4(), "1Z999AA1", "UPS")
            .await
            .expect_err("should reject");
        assert!(matches!(err, DomainError::NotFound));
        assert_eq!(gateway.tracking_calls(), 0);
    }

    #[tokio::test]
    async fn gateway_failure_leaves_order_unshipped() {
        let gateway = FakeGateway::new().failing_tracking();
        let (repo, order_id) = seeded_repo(Some("CAP-1"));
        let svc = FulfillmentService::new(gateway, repo.clone());

        let err = svc
            .add_tracking(order_id, "1Z999AA1", "UPS")
            .await
            .expect_err("should fail");
        assert!(matches!(err, DomainError::Gateway(_)));

        let order = repo.find_by_id(order_id).expect("find failed").expect("exists");
        assert_eq!(order.status, OrderStatus::Confirmed);
        assert!(order.tracking_events.is_empty());
    }

    #[tokio::test]
    async fn mark_delivered_requires_prior_shipment() {
        let gateway = FakeGateway::new();
        let (repo, order_id) = seeded_repo(Some("CAP-1"));
        let svc = FulfillmentService::new(gateway, repo);

        let err = svc.mark_delivered(order_id).expect_err("should reject");
        assert!(matches!(err, DomainError::InvalidTransition(_)));

        svc.add_tracking(order_id, "1Z999AA1", "UPS")
            .await
            .expect("add_tracking failed");
        let delivered = svc.mark_delivered(order_id).expect("mark_delivered failed");
        assert_eq!(delivered.status, OrderStatus::Delivered);
        assert!(delivered.delivered_at.is_some());
    }

    #[tokio::test]
    async fn empty_admin_update_is_rejected() {
        let gateway = FakeGateway::new();
        let (repo, order_id) = seeded_repo(Some("CAP-1"));
        let svc = FulfillmentService::new(gateway, repo);

        let err = svc
            .admin_update(order_id, AdminOrderUpdate::default())
            .expect_err("should reject");
        assert!(matches!(err, DomainError::InvalidInput(_)));
    }
}
