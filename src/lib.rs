//! Order Ledger
//!
//! Keeps one active order per billing profile and cart, keeps that order's
//! total in step with its cart, and records payment once checkout details
//! are complete.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod identifiers;
pub mod services;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    billing::BillingService, carts::CartService, checkout::CheckoutService,
    order_ledger::OrderLedger,
};

/// Explicitly composed services sharing one connection pool and event
/// channel.
#[derive(Clone)]
pub struct AppServices {
    pub ledger: Arc<OrderLedger>,
    pub carts: Arc<CartService>,
    pub billing: Arc<BillingService>,
    pub checkout: Arc<CheckoutService>,
}

impl AppServices {
    pub fn new(
        db: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        config: &AppConfig,
    ) -> Self {
        let ledger = Arc::new(OrderLedger::new(
            db.clone(),
            event_sender,
            config.ledger.clone(),
        ));
        Self {
            carts: Arc::new(CartService::new(db.clone(), ledger.clone())),
            billing: Arc::new(BillingService::new(db)),
            checkout: Arc::new(CheckoutService::new(ledger.clone())),
            ledger,
        }
    }
}
