use sea_orm_migration::prelude::*;

use super::m20240101_000003_create_orders_table::Orders;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Backs the active-order lookup for a (billing profile, cart) pair.
        manager
            .create_index(
                Index::create()
                    .name("idx_orders_profile_cart_active_status")
                    .table(Orders::Table)
                    .col(Orders::BillingProfileId)
                    .col(Orders::CartId)
                    .col(Orders::Active)
                    .col(Orders::Status)
                    .if_not_exists()
                    .to_owned(),
            )
            .await?;

        // Backs the cart-to-order lookup when a cart total changes.
        manager
            .create_index(
                Index::create()
                    .name("idx_orders_cart_id")
                    .table(Orders::Table)
                    .col(Orders::CartId)
                    .if_not_exists()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_index(
                Index::drop()
                    .name("idx_orders_cart_id")
                    .table(Orders::Table)
                    .to_owned(),
            )
            .await?;
        manager
            .drop_index(
                Index::drop()
                    .name("idx_orders_profile_cart_active_status")
                    .table(Orders::Table)
                    .to_owned(),
            )
            .await
    }
}
