use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::{
    entities::order::{Model as OrderModel, OrderStatus},
    errors::ServiceError,
    services::order_ledger::OrderLedger,
};

/// Result of trying to pay for an order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Paid(OrderModel),
    /// Payment was not recorded; `missing` names the unset references
    Incomplete {
        order: OrderModel,
        missing: Vec<&'static str>,
    },
}

/// Drives the order ledger through a checkout: acquire the order, attach
/// addresses, then mark it paid.
#[derive(Clone)]
pub struct CheckoutService {
    ledger: Arc<OrderLedger>,
}

impl CheckoutService {
    pub fn new(ledger: Arc<OrderLedger>) -> Self {
        Self { ledger }
    }

    pub fn ledger(&self) -> &OrderLedger {
        &self.ledger
    }

    /// Starts (or resumes) checkout of `cart_id` for `billing_profile_id`
    pub async fn begin(
        &self,
        billing_profile_id: Uuid,
        cart_id: Uuid,
    ) -> Result<(OrderModel, bool), ServiceError> {
        self.ledger
            .get_or_create_active_order(billing_profile_id, cart_id)
            .await
    }

    /// Attaches whichever addresses are given; absent ones are left as is
    #[instrument(skip(self), fields(id = %id))]
    pub async fn attach_addresses(
        &self,
        id: Uuid,
        shipping_address_id: Option<Uuid>,
        billing_address_id: Option<Uuid>,
    ) -> Result<OrderModel, ServiceError> {
        let mut order = self.open_order(id).await?;
        if let Some(address_id) = shipping_address_id {
            order = self.ledger.attach_shipping_address(id, address_id).await?;
        }
        if let Some(address_id) = billing_address_id {
            order = self.ledger.attach_billing_address(id, address_id).await?;
        }
        Ok(order)
    }

    /// Records payment if the order is complete. Only orders still in
    /// `created` can be finalized.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn finalize(&self, id: Uuid) -> Result<CheckoutOutcome, ServiceError> {
        let order = self.open_order(id).await?;
        if order.status != OrderStatus::Created {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is already {}",
                order.order_id, order.status
            )));
        }

        let status = self.ledger.mark_paid(id).await?;
        let order = self
            .ledger
            .get_order(id)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(id))?;

        if status == OrderStatus::Paid {
            info!(order_id = %order.order_id, "Checkout finalized");
            Ok(CheckoutOutcome::Paid(order))
        } else {
            let missing = order.missing_checkout_details();
            warn!(order_id = %order.order_id, missing = ?missing, "Checkout incomplete");
            Ok(CheckoutOutcome::Incomplete { order, missing })
        }
    }

    /// Loads an order that is still active; deactivated orders belong to an
    /// abandoned checkout and cannot progress.
    async fn open_order(&self, id: Uuid) -> Result<OrderModel, ServiceError> {
        let order = self
            .ledger
            .get_order(id)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(id))?;
        if !order.active {
            return Err(ServiceError::InvalidOperation(format!(
                "Order {} is no longer active",
                order.order_id
            )));
        }
        Ok(order)
    }
}
