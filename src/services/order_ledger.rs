use chrono::Utc;
use metrics::counter;
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    sea_query::Expr, ActiveModelBehavior, ActiveModelTrait, ColumnTrait, Condition,
    ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::{
    config::LedgerConfig,
    db::DbPool,
    entities::{
        address::Entity as AddressEntity,
        billing_profile::Entity as BillingProfileEntity,
        cart::Entity as CartEntity,
        order::{self, Entity as OrderEntity, Model as OrderModel, OrderStatus},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    identifiers::generate_unique_order_id,
};

/// Resolution for the forbidden state of several active `created` orders
/// sharing one billing profile and cart.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DuplicateOrderPolicy {
    /// Fail with a data integrity error and write nothing
    #[default]
    Reject,
    /// Warn and continue with the earliest created order
    ReuseOldest,
}

/// `cart_total + shipping_total` rounded to cents, midpoints away from zero.
pub fn order_total(cart_total: Decimal, shipping_total: Decimal) -> Decimal {
    (cart_total + shipping_total).round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Which address slot of an order to fill
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum AddressSlot {
    Shipping,
    Billing,
}

/// Keeps the single active order for a billing profile and cart, its total,
/// and its payment status.
#[derive(Clone)]
pub struct OrderLedger {
    db_pool: Arc<DbPool>,
    event_sender: Option<Arc<EventSender>>,
    config: LedgerConfig,
}

impl OrderLedger {
    pub fn new(
        db_pool: Arc<DbPool>,
        event_sender: Option<Arc<EventSender>>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            db_pool,
            event_sender,
            config,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Returns the active `created` order for this billing profile and cart,
    /// creating it when none exists. The flag is `true` when a new order was
    /// inserted.
    ///
    /// Creating an order first deactivates every other active order on the
    /// same cart that belongs to a different (or no) billing profile, then
    /// computes the new order's total from the cart.
    #[instrument(skip(self), fields(billing_profile_id = %billing_profile_id, cart_id = %cart_id))]
    pub async fn get_or_create_active_order(
        &self,
        billing_profile_id: Uuid,
        cart_id: Uuid,
    ) -> Result<(OrderModel, bool), ServiceError> {
        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for order acquisition");
            ServiceError::DatabaseError(e)
        })?;

        let (order, created, events) = self.acquire_in(&txn, billing_profile_id, cart_id).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit order acquisition");
            ServiceError::DatabaseError(e)
        })?;

        if created {
            counter!("order_ledger.orders_created", 1);
            info!(id = %order.id, order_id = %order.order_id, total = %order.total, "Order created");
        } else {
            debug!(id = %order.id, order_id = %order.order_id, "Reusing active order");
        }
        self.emit(events).await;

        Ok((order, created))
    }

    async fn acquire_in<C>(
        &self,
        db: &C,
        billing_profile_id: Uuid,
        cart_id: Uuid,
    ) -> Result<(OrderModel, bool, Vec<Event>), ServiceError>
    where
        C: ConnectionTrait,
    {
        BillingProfileEntity::find_by_id(billing_profile_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::billing_profile_not_found(billing_profile_id))?;
        CartEntity::find_by_id(cart_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::cart_not_found(cart_id))?;

        let mut matches = OrderEntity::find()
            .filter(order::Column::BillingProfileId.eq(billing_profile_id))
            .filter(order::Column::CartId.eq(cart_id))
            .filter(order::Column::Active.eq(true))
            .filter(order::Column::Status.eq(OrderStatus::Created))
            .order_by_asc(order::Column::CreatedAt)
            .order_by_asc(order::Column::Id)
            .all(db)
            .await?;

        match matches.len() {
            0 => {}
            1 => return Ok((matches.remove(0), false, Vec::new())),
            n => match self.config.duplicate_order_policy {
                DuplicateOrderPolicy::Reject => {
                    error!(matching_orders = n, "Duplicate active orders for billing profile and cart");
                    return Err(ServiceError::DataIntegrity(format!(
                        "{} active orders exist for billing profile {} and cart {}",
                        n, billing_profile_id, cart_id
                    )));
                }
                DuplicateOrderPolicy::ReuseOldest => {
                    warn!(matching_orders = n, "Duplicate active orders; reusing the oldest");
                    return Ok((matches.remove(0), false, Vec::new()));
                }
            },
        }

        let mut events = self.deactivate_stale_in(db, billing_profile_id, cart_id).await?;

        let id = Uuid::new_v4();
        let slug =
            generate_unique_order_id(db, id, self.config.order_id_max_attempts).await?;

        let mut new_order = order::ActiveModel::new();
        new_order.id = Set(id);
        new_order.order_id = Set(slug);
        new_order.billing_profile_id = Set(Some(billing_profile_id));
        new_order.cart_id = Set(Some(cart_id));
        new_order.shipping_total = Set(self.config.default_shipping_total);
        let inserted = new_order.insert(db).await?;

        events.push(Event::OrderCreated {
            id: inserted.id,
            order_id: inserted.order_id.clone(),
            billing_profile_id,
            cart_id,
            timestamp: Utc::now(),
        });

        let order = recompute_in(db, inserted).await?;
        events.push(Event::OrderTotalRecomputed {
            id: order.id,
            total: order.total,
            timestamp: Utc::now(),
        });

        Ok((order, true, events))
    }

    /// Marks inactive every active order on `cart_id` whose billing profile
    /// is not `billing_profile_id`. Orders without a profile count as other.
    async fn deactivate_stale_in<C>(
        &self,
        db: &C,
        billing_profile_id: Uuid,
        cart_id: Uuid,
    ) -> Result<Vec<Event>, ServiceError>
    where
        C: ConnectionTrait,
    {
        let stale = OrderEntity::find()
            .filter(order::Column::CartId.eq(cart_id))
            .filter(order::Column::Active.eq(true))
            .filter(
                Condition::any()
                    .add(order::Column::BillingProfileId.ne(billing_profile_id))
                    .add(order::Column::BillingProfileId.is_null()),
            )
            .all(db)
            .await?;

        if stale.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<Uuid> = stale.iter().map(|o| o.id).collect();
        let now = Utc::now();
        let result = OrderEntity::update_many()
            .col_expr(order::Column::Active, Expr::value(false))
            .col_expr(order::Column::UpdatedAt, Expr::value(now))
            .filter(order::Column::Id.is_in(ids.clone()))
            .exec(db)
            .await?;

        counter!("order_ledger.orders_deactivated", result.rows_affected);
        info!(
            cart_id = %cart_id,
            deactivated = result.rows_affected,
            "Deactivated orders left on a reused cart"
        );

        Ok(ids
            .into_iter()
            .map(|id| Event::OrderDeactivated {
                id,
                cart_id,
                timestamp: now,
            })
            .collect())
    }

    /// Recomputes and stores `cart.total + shipping_total` for one order.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn recompute_total(&self, id: Uuid) -> Result<Decimal, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(id))?;

        let updated = recompute_in(db, order).await?;
        self.emit(vec![Event::OrderTotalRecomputed {
            id: updated.id,
            total: updated.total,
            timestamp: Utc::now(),
        }])
        .await;

        Ok(updated.total)
    }

    /// Reacts to a cart total change. When exactly one order references the
    /// cart its total is recomputed and returned; otherwise nothing changes.
    #[instrument(skip(self), fields(cart_id = %cart_id))]
    pub async fn sync_cart_total(&self, cart_id: Uuid) -> Result<Option<OrderModel>, ServiceError> {
        let db = &*self.db_pool;
        let (order, events) = self.sync_cart_total_in(db, cart_id).await?;
        self.emit(events).await;
        Ok(order)
    }

    /// Transaction-scoped variant of [`OrderLedger::sync_cart_total`] for
    /// callers that update the cart in the same transaction. The returned
    /// events must be passed to [`OrderLedger::emit`] after commit.
    pub(crate) async fn sync_cart_total_in<C>(
        &self,
        db: &C,
        cart_id: Uuid,
    ) -> Result<(Option<OrderModel>, Vec<Event>), ServiceError>
    where
        C: ConnectionTrait,
    {
        let mut orders = OrderEntity::find()
            .filter(order::Column::CartId.eq(cart_id))
            .all(db)
            .await?;

        match orders.len() {
            1 => {
                let updated = recompute_in(db, orders.remove(0)).await?;
                let events = vec![Event::OrderTotalRecomputed {
                    id: updated.id,
                    total: updated.total,
                    timestamp: Utc::now(),
                }];
                Ok((Some(updated), events))
            }
            0 => {
                debug!("No order references this cart; nothing to recompute");
                Ok((None, Vec::new()))
            }
            n => {
                counter!("order_ledger.cart_sync_skipped", 1);
                warn!(matching_orders = n, "Cart maps to several orders; total not recomputed");
                let events = vec![Event::CartOrderMappingSkipped {
                    cart_id,
                    matching_orders: n as u64,
                    timestamp: Utc::now(),
                }];
                Ok((None, events))
            }
        }
    }

    /// True when billing profile, shipping address and billing address are
    /// all set. A negative total is returned as a data integrity error.
    pub fn is_complete(&self, order: &OrderModel) -> Result<bool, ServiceError> {
        order.is_complete().map_err(|e| {
            error!(id = %order.id, order_id = %order.order_id, error = %e, "Order failed integrity check");
            e
        })
    }

    /// Moves a complete order to `paid`. Returns the status after the call,
    /// which is unchanged when the order is incomplete.
    #[instrument(skip(self), fields(id = %id))]
    pub async fn mark_paid(&self, id: Uuid) -> Result<OrderStatus, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(id))?;

        if !self.is_complete(&order)? {
            debug!(
                missing = ?order.missing_checkout_details(),
                "Order incomplete; status left unchanged"
            );
            return Ok(order.status);
        }

        let old_status = order.status;
        let mut active: order::ActiveModel = order.into();
        active.status = Set(OrderStatus::Paid);
        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, "Failed to mark order paid");
            ServiceError::DatabaseError(e)
        })?;

        if old_status != updated.status {
            counter!("order_ledger.orders_paid", 1);
            info!(order_id = %updated.order_id, "Order marked paid");
            self.emit(vec![Event::OrderStatusChanged {
                id: updated.id,
                old_status: old_status.to_string(),
                new_status: updated.status.to_string(),
                timestamp: Utc::now(),
            }])
            .await;
        }

        Ok(updated.status)
    }

    /// Sets the order's shipping address
    #[instrument(skip(self), fields(id = %id, address_id = %address_id))]
    pub async fn attach_shipping_address(
        &self,
        id: Uuid,
        address_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        self.attach_address(id, address_id, AddressSlot::Shipping)
            .await
    }

    /// Sets the order's billing address
    #[instrument(skip(self), fields(id = %id, address_id = %address_id))]
    pub async fn attach_billing_address(
        &self,
        id: Uuid,
        address_id: Uuid,
    ) -> Result<OrderModel, ServiceError> {
        self.attach_address(id, address_id, AddressSlot::Billing)
            .await
    }

    async fn attach_address(
        &self,
        id: Uuid,
        address_id: Uuid,
        slot: AddressSlot,
    ) -> Result<OrderModel, ServiceError> {
        let db = &*self.db_pool;
        let order = OrderEntity::find_by_id(id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::order_not_found(id))?;
        AddressEntity::find_by_id(address_id)
            .one(db)
            .await?
            .ok_or_else(|| ServiceError::address_not_found(address_id))?;

        let mut active: order::ActiveModel = order.into();
        match slot {
            AddressSlot::Shipping => active.shipping_address_id = Set(Some(address_id)),
            AddressSlot::Billing => active.billing_address_id = Set(Some(address_id)),
        }
        let updated = active.update(db).await?;
        debug!(slot = ?slot, "Address attached to order");
        Ok(updated)
    }

    pub async fn get_order(&self, id: Uuid) -> Result<Option<OrderModel>, ServiceError> {
        Ok(OrderEntity::find_by_id(id).one(&*self.db_pool).await?)
    }

    /// Looks an order up by its public slug
    pub async fn find_by_order_id(&self, order_id: &str) -> Result<Option<OrderModel>, ServiceError> {
        Ok(OrderEntity::find()
            .filter(order::Column::OrderId.eq(order_id))
            .one(&*self.db_pool)
            .await?)
    }

    /// Every order ever built on `cart_id`, oldest first
    pub async fn list_orders_for_cart(&self, cart_id: Uuid) -> Result<Vec<OrderModel>, ServiceError> {
        Ok(OrderEntity::find()
            .filter(order::Column::CartId.eq(cart_id))
            .order_by_asc(order::Column::CreatedAt)
            .all(&*self.db_pool)
            .await?)
    }

    /// Sends events in order once their writes are committed
    pub(crate) async fn emit(&self, events: Vec<Event>) {
        if events.is_empty() {
            return;
        }
        if let Some(sender) = &self.event_sender {
            sender.send_all_or_log(events).await;
        }
    }
}

async fn recompute_in<C>(db: &C, order: OrderModel) -> Result<OrderModel, ServiceError>
where
    C: ConnectionTrait,
{
    let cart_id = order.cart_id.ok_or_else(|| {
        ServiceError::InvalidOperation(format!(
            "Order {} has no cart to compute a total from",
            order.order_id
        ))
    })?;
    let cart = CartEntity::find_by_id(cart_id)
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::cart_not_found(cart_id))?;

    let total = order_total(cart.total, order.shipping_total);
    if !order::fits_amount_column(total) {
        error!(id = %order.id, total = %total, "Order total exceeds the amount column");
        return Err(ServiceError::DataIntegrity(format!(
            "Order {} total {} exceeds the largest storable amount {}",
            order.order_id,
            total,
            order::MAX_AMOUNT
        )));
    }
    let mut active: order::ActiveModel = order.into();
    active.total = Set(total);
    let updated = active.update(db).await?;
    debug!(id = %updated.id, total = %updated.total, "Order total recomputed");
    Ok(updated)
}
