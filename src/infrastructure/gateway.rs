//! HTTP client for the payment gateway's REST API.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::domain::errors::DomainError;
use crate::domain::pricing::to_money;
use crate::domain::ports::{
    CreateGatewayOrder, GatewayCapture, GatewayOrder, PaymentGateway,
};

/// All amounts are submitted in the store currency; multi-currency
/// pricing is out of scope.
const CURRENCY: &str = "USD";

/// Refresh the cached access token this long before it actually expires.
const TOKEN_EXPIRY_LEEWAY_SECS: i64 = 60;

/// Error type for gateway operations.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway rejected the request; the body is passed through
    /// verbatim so callers see the provider's own message.
    #[error("Gateway API error: {status} - {body}")]
    Api { status: u16, body: String },

    /// The gateway answered 2xx but the response is missing a field the
    /// pipeline depends on.
    #[error("Malformed gateway response: missing {0}")]
    Malformed(&'static str),
}

impl From<GatewayError> for DomainError {
    fn from(e: GatewayError) -> Self {
        DomainError::Gateway(e.to_string())
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: DateTime<Utc>,
}

/// REST payment gateway client. Authenticates with a client-credentials
/// grant and caches the access token until shortly before expiry.
#[derive(Clone)]
pub struct HttpPaymentGateway {
    http: Client,
    base_url: String,
    client_id: String,
    client_secret: String,
    token: Arc<Mutex<Option<CachedToken>>>,
}

impl HttpPaymentGateway {
    /// # Panics
    ///
    /// Panics if the HTTP client cannot be built (should not happen with
    /// default settings).
    pub fn new(config: GatewayConfig) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            client_id: config.client_id,
            client_secret: config.client_secret,
            token: Arc::new(Mutex::new(None)),
        }
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref() {
            if token.expires_at > Utc::now() {
                return Ok(token.access_token.clone());
            }
        }

        let url = format!("{}/v1/oauth2/token", self.base_url);
        let response = self
            .http
            .post(&url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let token: TokenResponse = handle_response(response).await?;
        let expires_at = Utc::now()
            + chrono::Duration::seconds((token.expires_in - TOKEN_EXPIRY_LEEWAY_SECS).max(0));
        *cached = Some(CachedToken {
            access_token: token.access_token.clone(),
            expires_at,
        });
        Ok(token.access_token)
    }
}

async fn handle_response<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
) -> Result<T, GatewayError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(GatewayError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

fn money(value: &bigdecimal::BigDecimal) -> Money {
    Money {
        currency_code: CURRENCY.to_string(),
        value: to_money(value).to_string(),
    }
}

// ── Wire types ───────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Serialize)]
struct Money {
    currency_code: String,
    value: String,
}

#[derive(Debug, Serialize)]
struct AmountBreakdown {
    item_total: Money,
    shipping: Money,
    tax_total: Money,
    discount: Money,
}

#[derive(Debug, Serialize)]
struct AmountWithBreakdown {
    currency_code: String,
    value: String,
    breakdown: AmountBreakdown,
}

#[derive(Debug, Serialize)]
struct WireItem {
    name: String,
    quantity: String,
    unit_amount: Money,
}

#[derive(Debug, Serialize)]
struct WireName {
    full_name: String,
}

#[derive(Debug, Serialize)]
struct WireAddress {
    address_line_1: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    address_line_2: Option<String>,
    admin_area_2: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    admin_area_1: Option<String>,
    postal_code: String,
    country_code: String,
}

#[derive(Debug, Serialize)]
struct WireShipping {
    name: WireName,
    address: WireAddress,
}

#[derive(Debug, Serialize)]
struct ApplicationContext {
    return_url: String,
    cancel_url: String,
}

#[derive(Debug, Serialize)]
struct PurchaseUnit {
    amount: AmountWithBreakdown,
    items: Vec<WireItem>,
    shipping: WireShipping,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody {
    intent: &'static str,
    purchase_units: Vec<PurchaseUnit>,
    application_context: ApplicationContext,
}

#[derive(Debug, Deserialize)]
struct Link {
    rel: String,
    href: String,
}

#[derive(Debug, Deserialize)]
struct OrderCreatedResponse {
    id: String,
    #[serde(default)]
    links: Vec<Link>,
}

#[derive(Debug, Deserialize)]
struct Payer {
    payer_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptureRecord {
    id: String,
    status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<CaptureRecord>,
}

#[derive(Debug, Deserialize)]
struct CapturedUnit {
    payments: Payments,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    status: Option<String>,
    payer: Option<Payer>,
    #[serde(default)]
    purchase_units: Vec<CapturedUnit>,
}

#[derive(Debug, Serialize)]
struct Tracker {
    transaction_id: String,
    tracking_number: String,
    carrier: String,
    status: &'static str,
}

#[derive(Debug, Serialize)]
struct TrackerBatch {
    trackers: Vec<Tracker>,
}

// ── PaymentGateway impl ──────────────────────────────────────────────────────

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn create_order(&self, request: CreateGatewayOrder) -> Result<GatewayOrder, DomainError> {
        let token = self.access_token().await.map_err(DomainError::from)?;

        let addr = &request.shipping_address;
        let body = CreateOrderBody {
            intent: "CAPTURE",
            purchase_units: vec![PurchaseUnit {
                amount: AmountWithBreakdown {
                    currency_code: CURRENCY.to_string(),
                    value: to_money(&request.amount.total).to_string(),
                    breakdown: AmountBreakdown {
                        item_total: money(&request.amount.item_total),
                        shipping: money(&request.amount.shipping),
                        tax_total: money(&request.amount.tax),
                        discount: money(&request.amount.discount),
                    },
                },
                items: request
                    .items
                    .iter()
                    .map(|item| WireItem {
                        name: item.product_snapshot.name.clone(),
                        quantity: item.quantity.to_string(),
                        unit_amount: money(&item.unit_price),
                    })
                    .collect(),
                shipping: WireShipping {
                    name: WireName {
                        full_name: addr.full_name.clone(),
                    },
                    address: WireAddress {
                        address_line_1: addr.line1.clone(),
                        address_line_2: addr.line2.clone(),
                        admin_area_2: addr.city.clone(),
                        admin_area_1: addr.state.clone(),
                        postal_code: addr.postal_code.clone(),
                        country_code: addr.country.clone(),
                    },
                },
            }],
            application_context: ApplicationContext {
                return_url: request.return_url,
                cancel_url: request.cancel_url,
            },
        };

        let url = format!("{}/v2/checkout/orders", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::from)?;

        let created: OrderCreatedResponse =
            handle_response(response).await.map_err(DomainError::from)?;

        let approval_link = created
            .links
            .iter()
            .find(|link| link.rel == "approve")
            .map(|link| link.href.clone())
            .ok_or(GatewayError::Malformed("approval link"))?;

        Ok(GatewayOrder {
            gateway_order_id: created.id,
            approval_link,
        })
    }

    async fn capture_order(&self, gateway_order_id: &str) -> Result<GatewayCapture, DomainError> {
        let token = self.access_token().await.map_err(DomainError::from)?;

        let url = format!(
            "{}/v2/checkout/orders/{}/capture",
            self.base_url, gateway_order_id
        );
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .header("Content-Type", "application/json")
            .send()
            .await
            .map_err(GatewayError::from)?;

        let captured: CaptureResponse =
            handle_response(response).await.map_err(DomainError::from)?;

        let capture = captured
            .purchase_units
            .first()
            .and_then(|unit| unit.payments.captures.first())
            .ok_or(GatewayError::Malformed("capture record"))?;

        Ok(GatewayCapture {
            capture_id: capture.id.clone(),
            payer_id: captured.payer.and_then(|p| p.payer_id),
            status: capture
                .status
                .clone()
                .or(captured.status)
                .unwrap_or_else(|| "COMPLETED".to_string()),
        })
    }

    async fn submit_tracking(
        &self,
        capture_id: &str,
        tracking_number: &str,
        carrier: &str,
    ) -> Result<(), DomainError> {
        let token = self.access_token().await.map_err(DomainError::from)?;

        let body = TrackerBatch {
            trackers: vec![Tracker {
                transaction_id: capture_id.to_string(),
                tracking_number: tracking_number.to_string(),
                carrier: carrier.to_string(),
                status: "SHIPPED",
            }],
        };

        let url = format!("{}/v1/shipping/trackers-batch", self.base_url);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(GatewayError::from)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api {
                status: status.as_u16(),
                body,
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::str::FromStr;

    use bigdecimal::BigDecimal;
    use serde_json::json;
    use uuid::Uuid;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::domain::checkout::{Address, CartItem, ProductSnapshot};
    use crate::domain::ports::GatewayAmount;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).expect("valid decimal")
    }

    fn gateway(server: &MockServer) -> HttpPaymentGateway {
        HttpPaymentGateway::new(GatewayConfig {
            base_url: server.uri(),
            client_id: "client-id".to_string(),
            client_secret: "client-secret".to_string(),
        })
    }

    async fn mount_token(server: &MockServer, expected_calls: u64) {
        Mock::given(method("POST"))
            .and(path("/v1/oauth2/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "access_token": "test-token",
                "token_type": "Bearer",
                "expires_in": 3600
            })))
            .expect(expected_calls)
            .mount(server)
            .await;
    }

    fn create_request() -> CreateGatewayOrder {
        CreateGatewayOrder {
            amount: GatewayAmount {
                item_total: dec("140.00"),
                shipping: dec("0"),
                tax: dec("11.20"),
                discount: dec("0"),
                total: dec("151.20"),
            },
            items: vec![CartItem {
                product_id: Uuid::new_v4(),
                quantity: 2,
                unit_price: dec("70.00"),
                variant_selection: BTreeMap::new(),
                product_snapshot: ProductSnapshot {
                    name: "Jacket".to_string(),
                    description: None,
                    images: vec![],
                    category: None,
                    price: dec("70.00"),
                },
            }],
            shipping_address: Address {
                full_name: "Ada Lovelace".to_string(),
                line1: "12 Analytical Way".to_string(),
                line2: None,
                city: "London".to_string(),
                state: None,
                postal_code: "N1 9GU".to_string(),
                country: "GB".to_string(),
            },
            return_url: "https://shop.example.com/checkout/return".to_string(),
            cancel_url: "https://shop.example.com/checkout/cancel".to_string(),
        }
    }

    #[tokio::test]
    async fn create_order_submits_rounded_totals_and_returns_approval_link() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders"))
            .and(header("authorization", "Bearer test-token"))
            .and(body_partial_json(json!({
                "intent": "CAPTURE",
                "purchase_units": [{
                    "amount": {
                        "currency_code": "USD",
                        "value": "151.20",
                        "breakdown": {
                            "item_total": { "value": "140.00" },
                            "shipping": { "value": "0.00" },
                            "tax_total": { "value": "11.20" }
                        }
                    }
                }]
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "GW-ORDER-1",
                "status": "CREATED",
                "links": [
                    { "rel": "self", "href": "https://gateway.example.com/orders/GW-ORDER-1" },
                    { "rel": "approve", "href": "https://gateway.example.com/approve/GW-ORDER-1" }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let order = gateway(&server)
            .create_order(create_request())
            .await
            .expect("create_order failed");

        assert_eq!(order.gateway_order_id, "GW-ORDER-1");
        assert_eq!(
            order.approval_link,
            "https://gateway.example.com/approve/GW-ORDER-1"
        );
    }

    #[tokio::test]
    async fn capture_order_extracts_capture_and_payer_ids() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/GW-ORDER-1/capture"))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({
                "id": "GW-ORDER-1",
                "status": "COMPLETED",
                "payer": { "payer_id": "PAYER-9" },
                "purchase_units": [{
                    "payments": { "captures": [{ "id": "CAP-1", "status": "COMPLETED" }] }
                }]
            })))
            .mount(&server)
            .await;

        let capture = gateway(&server)
            .capture_order("GW-ORDER-1")
            .await
            .expect("capture failed");

        assert_eq!(capture.capture_id, "CAP-1");
        assert_eq!(capture.payer_id.as_deref(), Some("PAYER-9"));
        assert_eq!(capture.status, "COMPLETED");
    }

    #[tokio::test]
    async fn gateway_rejection_surfaces_provider_body() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v2/checkout/orders/GW-ORDER-1/capture"))
            .respond_with(
                ResponseTemplate::new(422)
                    .set_body_string(r#"{"name":"ORDER_NOT_APPROVED"}"#),
            )
            .mount(&server)
            .await;

        let err = gateway(&server)
            .capture_order("GW-ORDER-1")
            .await
            .expect_err("capture should fail");

        match err {
            DomainError::Gateway(message) => {
                assert!(message.contains("422"));
                assert!(message.contains("ORDER_NOT_APPROVED"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn access_token_is_cached_across_calls() {
        let server = MockServer::start().await;
        mount_token(&server, 1).await;

        Mock::given(method("POST"))
            .and(path("/v1/shipping/trackers-batch"))
            .and(body_partial_json(json!({
                "trackers": [{
                    "transaction_id": "CAP-1",
                    "tracking_number": "1Z999AA1",
                    "carrier": "UPS",
                    "status": "SHIPPED"
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(2)
            .mount(&server)
            .await;

        let client = gateway(&server);
        client
            .submit_tracking("CAP-1", "1Z999AA1", "UPS")
            .await
            .expect("first tracking failed");
        client
            .submit_tracking("CAP-1", "1Z999AA1", "UPS")
            .await
            .expect("second tracking failed");
    }
}
