#![allow(dead_code)]

use std::sync::Arc;

use order_ledger::{
    config::{AppConfig, LedgerConfig},
    db::{self, DbConfig, DbPool},
    entities::{
        address::{AddressType, Model as AddressModel},
        billing_profile::Model as BillingProfileModel,
        cart::Model as CartModel,
        order::{self, Model as OrderModel},
    },
    events::{self, Event},
    services::billing::{NewAddress, NewBillingProfile},
    AppServices,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelBehavior, ActiveModelTrait, Set};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Services over a private, migrated in-memory SQLite database.
pub struct TestContext {
    pub db: Arc<DbPool>,
    pub services: AppServices,
    events: mpsc::Receiver<Event>,
}

impl TestContext {
    pub async fn new() -> Self {
        Self::with_ledger(LedgerConfig::default()).await
    }

    pub async fn with_ledger(ledger: LedgerConfig) -> Self {
        let pool = db::establish_connection_with_config(&DbConfig::in_memory())
            .await
            .expect("failed to open in-memory database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations");
        let db = Arc::new(pool);

        let mut cfg = AppConfig::new("sqlite::memory:".to_string(), "test".to_string());
        cfg.ledger = ledger;

        let (sender, events) = events::channel(256);
        let services = AppServices::new(db.clone(), Some(Arc::new(sender)), &cfg);

        Self {
            db,
            services,
            events,
        }
    }

    pub async fn profile(&self, email: &str) -> BillingProfileModel {
        self.services
            .billing
            .create_profile(NewBillingProfile {
                email: email.to_string(),
            })
            .await
            .expect("failed to create billing profile")
    }

    pub async fn cart(&self, total: Decimal) -> CartModel {
        self.services
            .carts
            .create_cart(total)
            .await
            .expect("failed to create cart")
    }

    pub async fn address(&self, profile_id: Uuid, kind: AddressType) -> AddressModel {
        self.services
            .billing
            .create_address(NewAddress {
                billing_profile_id: Some(profile_id),
                address_type: kind,
                line1: "742 Evergreen Terrace".to_string(),
                line2: None,
                city: "Springfield".to_string(),
                state: "OR".to_string(),
                postal_code: "97403".to_string(),
                country: "US".to_string(),
            })
            .await
            .expect("failed to create address")
    }

    /// Inserts an order row directly, bypassing the acquisition policy
    pub async fn raw_order(&self, profile_id: Option<Uuid>, cart_id: Option<Uuid>) -> OrderModel {
        let mut am = order::ActiveModel::new();
        am.billing_profile_id = Set(profile_id);
        am.cart_id = Set(cart_id);
        am.insert(&*self.db).await.expect("failed to insert order")
    }

    pub async fn reload(&self, id: Uuid) -> OrderModel {
        self.services
            .ledger
            .get_order(id)
            .await
            .expect("failed to load order")
            .expect("order vanished")
    }

    /// Every event emitted so far, in emission order
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut drained = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            drained.push(event);
        }
        drained
    }
}

pub fn kinds(events: &[Event]) -> Vec<&'static str> {
    events.iter().map(Event::kind).collect()
}
