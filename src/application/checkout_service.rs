use std::fmt;

use chrono::Utc;

use crate::domain::checkout::{validate_cart, Address, CartItem, CheckoutSession, CustomerInfo};
use crate::domain::errors::DomainError;
use crate::domain::order::{NewOrderInput, OrderView};
use crate::domain::ports::{
    CheckoutSessionStore, CreateGatewayOrder, GatewayAmount, GatewayCapture, OrderRepository,
    PaymentGateway,
};
use crate::domain::pricing::price_cart;

/// Redirect targets handed to the gateway when opening a remote order.
#[derive(Debug, Clone)]
pub struct ReturnUrls {
    pub return_url: String,
    pub cancel_url: String,
}

#[derive(Debug, Clone)]
pub struct OpenCheckoutRequest {
    pub items: Vec<CartItem>,
    pub customer: CustomerInfo,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
}

#[derive(Debug, Clone)]
pub struct OpenCheckoutResult {
    pub gateway_order_id: String,
    pub approval_link: String,
}

#[derive(Debug, Clone)]
pub struct DirectOrderRequest {
    pub items: Vec<CartItem>,
    pub customer: CustomerInfo,
    pub shipping_address: Address,
    pub billing_address: Option<Address>,
    pub payment_reference: String,
}

/// A capture succeeded at the gateway but the local order record is not
/// (yet) in place. Reported to operational tooling, never as a failure
/// to the payer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconciliationWarning {
    SessionMissing,
    PersistenceFailed(String),
}

impl fmt::Display for ReconciliationWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReconciliationWarning::SessionMissing => write!(
                f,
                "payment captured but no checkout session was found; order awaits reconciliation"
            ),
            ReconciliationWarning::PersistenceFailed(reason) => write!(
                f,
                "payment captured but the order could not be persisted: {}",
                reason
            ),
        }
    }
}

/// Result of the capture phase. `payment` always reflects the gateway's
/// capture outcome, regardless of what happened locally afterwards.
#[derive(Debug, Clone)]
pub struct CaptureOutcome {
    pub payment: GatewayCapture,
    pub order: Option<OrderView>,
    pub warning: Option<ReconciliationWarning>,
}

/// Orchestrates the two-phase checkout: open a gateway order against a
/// priced cart, then capture it and reconcile the durable order record.
pub struct CheckoutService<G, R, S> {
    gateway: G,
    repo: R,
    sessions: S,
    urls: ReturnUrls,
}

impl<G, R, S> CheckoutService<G, R, S>
where
    G: PaymentGateway,
    R: OrderRepository,
    S: CheckoutSessionStore,
{
    pub fn new(gateway: G, repo: R, sessions: S, urls: ReturnUrls) -> Self {
        Self {
            gateway,
            repo,
            sessions,
            urls,
        }
    }

    /// Phase one: price the cart, create the remote order, stash the
    /// session. Fails with no side effects.
    pub async fn open_checkout(
        &self,
        request: OpenCheckoutRequest,
    ) -> Result<OpenCheckoutResult, DomainError> {
        request.customer.validate()?;
        validate_cart(&request.items)?;
        request.shipping_address.validate()?;
        if let Some(billing) = &request.billing_address {
            billing.validate()?;
        }

        let lines: Vec<_> = request
            .items
            .iter()
            .map(|item| (item.unit_price.clone(), item.quantity))
            .collect();
        let totals = price_cart(&lines);

        let created = self
            .gateway
            .create_order(CreateGatewayOrder {
                amount: GatewayAmount {
                    item_total: totals.item_total.clone(),
                    shipping: totals.shipping.clone(),
                    tax: totals.tax.clone(),
                    discount: totals.discount.clone(),
                    total: totals.total.clone(),
                },
                items: request.items.clone(),
                shipping_address: request.shipping_address.clone(),
                return_url: self.urls.return_url.clone(),
                cancel_url: self.urls.cancel_url.clone(),
            })
            .await?;

        self.sessions.put(CheckoutSession {
            gateway_order_id: created.gateway_order_id.clone(),
            items: request.items,
            customer: request.customer,
            shipping_address: request.shipping_address,
            billing_address: request.billing_address,
            totals,
            created_at: Utc::now(),
        });

        log::info!("Opened checkout for gateway order {}", created.gateway_order_id);

        Ok(OpenCheckoutResult {
            gateway_order_id: created.gateway_order_id,
            approval_link: created.approval_link,
        })
    }

    /// Phase two. The capture call runs first and is never retried; a
    /// gateway error here leaves no local state. Everything after the
    /// capture degrades to a warning because the money has moved.
    pub async fn capture_checkout(
        &self,
        gateway_order_id: &str,
    ) -> Result<CaptureOutcome, DomainError> {
        let payment = self.gateway.capture_order(gateway_order_id).await?;

        // Replayed capture for an order we already reconciled.
        let existing = match self.repo.find_by_capture_id(&payment.capture_id) {
            Ok(existing) => existing,
            Err(e) => return Ok(self.degraded(payment, e.to_string())),
        };
        if existing.is_some() {
            return Ok(CaptureOutcome {
                payment,
                order: existing,
                warning: None,
            });
        }

        let Some(session) = self.sessions.get(gateway_order_id) else {
            log::warn!(
                "Captured gateway order {} has no checkout session; order awaits reconciliation",
                gateway_order_id
            );
            return Ok(CaptureOutcome {
                payment,
                order: None,
                warning: Some(ReconciliationWarning::SessionMissing),
            });
        };

        let billing = session
            .billing_address
            .clone()
            .unwrap_or_else(|| session.shipping_address.clone());
        let input = NewOrderInput {
            customer: session.customer.clone(),
            items: session.items.clone(),
            totals: session.totals.clone(),
            shipping_address: session.shipping_address.clone(),
            billing_address: billing,
            gateway_order_id: Some(gateway_order_id.to_string()),
            gateway_capture_id: Some(payment.capture_id.clone()),
            gateway_payer_id: payment.payer_id.clone(),
        };

        match self.repo.create(input) {
            Ok(order) => {
                self.sessions.remove(gateway_order_id);
                log::info!(
                    "Order {} created for gateway capture {}",
                    order.order_number,
                    payment.capture_id
                );
                Ok(CaptureOutcome {
                    payment,
                    order: Some(order),
                    warning: None,
                })
            }
            // Lost the race against a concurrent capture of the same
            // gateway order; the winner's row is the order.
            Err(DomainError::Conflict(_)) => match self.repo.find_by_capture_id(&payment.capture_id)
            {
                Ok(Some(order)) => {
                    self.sessions.remove(gateway_order_id);
                    Ok(CaptureOutcome {
                        payment,
                        order: Some(order),
                        warning: None,
                    })
                }
                Ok(None) => Ok(self.degraded(
                    payment,
                    "duplicate capture id but no order row found".to_string(),
                )),
                Err(e) => Ok(self.degraded(payment, e.to_string())),
            },
            // The session is intentionally kept so a later persistence
            // retry can still reconstruct the cart.
            Err(e) => Ok(self.degraded(payment, e.to_string())),
        }
    }

    fn degraded(&self, payment: GatewayCapture, reason: String) -> CaptureOutcome {
        log::warn!(
            "Capture {} succeeded but reconciliation failed: {}",
            payment.capture_id,
            reason
        );
        CaptureOutcome {
            payment,
            order: None,
            warning: Some(ReconciliationWarning::PersistenceFailed(reason)),
        }
    }

    /// Guest path that bypasses the session store: the payment already
    /// happened and the caller hands over its reference. Totals are
    /// re-derived server-side; client-submitted totals are never
    /// trusted.
    pub fn create_order_direct(&self, request: DirectOrderRequest) -> Result<OrderView, DomainError> {
        request.customer.validate()?;
        validate_cart(&request.items)?;
        request.shipping_address.validate()?;
        if let Some(billing) = &request.billing_address {
            billing.validate()?;
        }
        let reference = request.payment_reference.trim();
        if reference.is_empty() {
            return Err(DomainError::InvalidInput(
                "Payment reference must not be empty".to_string(),
            ));
        }

        // Same idempotency rule as the capture path.
        if let Some(existing) = self.repo.find_by_capture_id(reference)? {
            return Ok(existing);
        }

        let lines: Vec<_> = request
            .items
            .iter()
            .map(|item| (item.unit_price.clone(), item.quantity))
            .collect();
        let totals = price_cart(&lines);

        let billing = request
            .billing_address
            .unwrap_or_else(|| request.shipping_address.clone());
        self.repo.create(NewOrderInput {
            customer: request.customer,
            items: request.items,
            totals,
            shipping_address: request.shipping_address,
            billing_address: billing,
            gateway_order_id: None,
            gateway_capture_id: Some(reference.to_string()),
            gateway_payer_id: None,
        })
    }
}
