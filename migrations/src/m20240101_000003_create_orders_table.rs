use sea_orm_migration::prelude::*;

use super::m20240101_000001_create_billing_tables::{Addresses, BillingProfiles};
use super::m20240101_000002_create_carts_table::Carts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        // Every reference is nullable and SET NULL on delete: orders outlive
        // the carts, profiles and addresses they were built from.
        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                    .col(
                        ColumnDef::new(Orders::OrderId)
                            .string_len(120)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(Orders::BillingProfileId).uuid().null())
                    .col(ColumnDef::new(Orders::ShippingAddressId).uuid().null())
                    .col(ColumnDef::new(Orders::BillingAddressId).uuid().null())
                    .col(ColumnDef::new(Orders::CartId).uuid().null())
                    .col(
                        ColumnDef::new(Orders::Status)
                            .string_len(20)
                            .not_null()
                            .default("created"),
                    )
                    .col(
                        ColumnDef::new(Orders::ShippingTotal)
                            .decimal_len(9, 2)
                            .not_null()
                            .default(9.99),
                    )
                    .col(
                        ColumnDef::new(Orders::Total)
                            .decimal_len(9, 2)
                            .not_null()
                            .default(0.0),
                    )
                    .col(
                        ColumnDef::new(Orders::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Orders::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_billing_profile_id")
                            .from(Orders::Table, Orders::BillingProfileId)
                            .to(BillingProfiles::Table, BillingProfiles::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_shipping_address_id")
                            .from(Orders::Table, Orders::ShippingAddressId)
                            .to(Addresses::Table, Addresses::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_billing_address_id")
                            .from(Orders::Table, Orders::BillingAddressId)
                            .to(Addresses::Table, Addresses::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_cart_id")
                            .from(Orders::Table, Orders::CartId)
                            .to(Carts::Table, Carts::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Orders::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Orders {
    Table,
    Id,
    OrderId,
    BillingProfileId,
    ShippingAddressId,
    BillingAddressId,
    CartId,
    Status,
    ShippingTotal,
    Total,
    Active,
    CreatedAt,
    UpdatedAt,
}
