use rust_decimal::Decimal;
use sea_orm::{ActiveModelBehavior, ActiveModelTrait, EntityTrait, Set, TransactionTrait};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    db::DbPool,
    entities::{
        cart::{self, Entity as CartEntity, Model as CartModel},
        order::{fits_amount_column, Model as OrderModel, MAX_AMOUNT},
    },
    errors::ServiceError,
    services::order_ledger::OrderLedger,
};

/// Minimal cart storage. Updating a cart's total is the trigger that keeps
/// the order built on it in step; creating a cart touches no order.
#[derive(Clone)]
pub struct CartService {
    db_pool: Arc<DbPool>,
    ledger: Arc<OrderLedger>,
}

impl CartService {
    pub fn new(db_pool: Arc<DbPool>, ledger: Arc<OrderLedger>) -> Self {
        Self { db_pool, ledger }
    }

    #[instrument(skip(self), fields(total = %total))]
    pub async fn create_cart(&self, total: Decimal) -> Result<CartModel, ServiceError> {
        validate_cart_total(total)?;
        let mut cart = cart::ActiveModel::new();
        cart.total = Set(total);
        let created = cart.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to create cart");
            ServiceError::DatabaseError(e)
        })?;
        info!(cart_id = %created.id, "Cart created");
        Ok(created)
    }

    pub async fn get_cart(&self, id: Uuid) -> Result<Option<CartModel>, ServiceError> {
        Ok(CartEntity::find_by_id(id).one(&*self.db_pool).await?)
    }

    /// Stores a new cart total and, in the same transaction, recomputes the
    /// total of the one order built on this cart. Returns the updated cart
    /// and that order when there was exactly one.
    #[instrument(skip(self), fields(cart_id = %id, total = %total))]
    pub async fn update_total(
        &self,
        id: Uuid,
        total: Decimal,
    ) -> Result<(CartModel, Option<OrderModel>), ServiceError> {
        validate_cart_total(total)?;

        let db = &*self.db_pool;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for cart update");
            ServiceError::DatabaseError(e)
        })?;

        let cart = CartEntity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| ServiceError::cart_not_found(id))?;
        let mut active: cart::ActiveModel = cart.into();
        active.total = Set(total);
        let updated = active.update(&txn).await?;

        let (order, events) = self.ledger.sync_cart_total_in(&txn, id).await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit cart update");
            ServiceError::DatabaseError(e)
        })?;
        self.ledger.emit(events).await;

        Ok((updated, order))
    }

    /// Deletes a cart. Orders built on it keep existing with no cart.
    #[instrument(skip(self), fields(cart_id = %id))]
    pub async fn delete_cart(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = CartEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::cart_not_found(id));
        }
        info!("Cart deleted");
        Ok(())
    }
}

/// Cart totals are non-negative amounts that fit the `decimal(9,2)` column.
fn validate_cart_total(total: Decimal) -> Result<(), ServiceError> {
    if total.is_sign_negative() && !total.is_zero() {
        return Err(ServiceError::ValidationError(format!(
            "Cart total must not be negative, got {}",
            total
        )));
    }
    if !fits_amount_column(total) {
        return Err(ServiceError::ValidationError(format!(
            "Cart total must have at most 2 decimal places and not exceed {}, got {}",
            MAX_AMOUNT, total
        )));
    }
    Ok(())
}
