use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::domain::checkout::CheckoutSession;
use crate::domain::ports::CheckoutSessionStore;

/// Process-local session store keyed by the gateway order id. Concurrent
/// checkouts never contend on a key because the gateway issues distinct
/// ids. Sessions that are never captured live until process restart;
/// the capture path tolerates a missing session, so a durable TTL-backed
/// store can replace this without touching the orchestrator.
#[derive(Clone, Default)]
pub struct InMemorySessionStore {
    inner: Arc<RwLock<HashMap<String, CheckoutSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CheckoutSessionStore for InMemorySessionStore {
    fn put(&self, session: CheckoutSession) {
        let mut sessions = self.inner.write().expect("session store lock poisoned");
        sessions.insert(session.gateway_order_id.clone(), session);
    }

    fn get(&self, gateway_order_id: &str) -> Option<CheckoutSession> {
        let sessions = self.inner.read().expect("session store lock poisoned");
        sessions.get(gateway_order_id).cloned()
    }

    fn remove(&self, gateway_order_id: &str) -> Option<CheckoutSession> {
        let mut sessions = self.inner.write().expect("session store lock poisoned");
        sessions.remove(gateway_order_id)
    }
}

#[cfg(test)]
mod tests {
    use bigdecimal::BigDecimal;
    use chrono::Utc;

    use super::*;
    use crate::domain::checkout::{Address, CustomerInfo};
    use crate::domain::pricing::CartTotals;

    fn session(id: &str) -> CheckoutSession {
        CheckoutSession {
            gateway_order_id: id.to_string(),
            items: vec![],
            customer: CustomerInfo {
                user_id: None,
                email: Some("guest@example.com".to_string()),
            },
            shipping_address: Address {
                full_name: "Ada Lovelace".to_string(),
                line1: "12 Analytical Way".to_string(),
                line2: None,
                city: "London".to_string(),
                state: None,
                postal_code: "N1 9GU".to_string(),
                country: "GB".to_string(),
            },
            billing_address: None,
            totals: CartTotals {
                item_total: BigDecimal::from(0),
                shipping: BigDecimal::from(10),
                tax: BigDecimal::from(0),
                discount: BigDecimal::from(0),
                total: BigDecimal::from(10),
            },
            created_at: Utc::now(),
        }
    }

    #[test]
    fn put_get_remove_roundtrip() {
        let store = InMemorySessionStore::new();
        store.put(session("GW-1"));

        assert!(store.get("GW-1").is_some());
        assert!(store.get("GW-2").is_none());

        let removed = store.remove("GW-1").expect("session present");
        assert_eq!(removed.gateway_order_id, "GW-1");
        assert!(store.get("GW-1").is_none());
    }

    #[test]
    fn clones_share_the_same_map() {
        let store = InMemorySessionStore::new();
        let clone = store.clone();
        store.put(session("GW-1"));

        assert!(clone.get("GW-1").is_some());
    }
}
