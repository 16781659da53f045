use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(BillingProfiles::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BillingProfiles::Id)
                            .uuid()
                            .primary_key()
                            .not_null(),
                    )
                    .col(ColumnDef::new(BillingProfiles::Email).string_len(255).not_null())
                    .col(
                        ColumnDef::new(BillingProfiles::Active)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(BillingProfiles::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BillingProfiles::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Addresses::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Addresses::Id).uuid().primary_key().not_null())
                    .col(ColumnDef::new(Addresses::BillingProfileId).uuid().null())
                    .col(ColumnDef::new(Addresses::AddressType).string_len(20).not_null())
                    .col(ColumnDef::new(Addresses::Line1).string_len(120).not_null())
                    .col(ColumnDef::new(Addresses::Line2).string_len(120).null())
                    .col(ColumnDef::new(Addresses::City).string_len(120).not_null())
                    .col(ColumnDef::new(Addresses::State).string_len(120).not_null())
                    .col(ColumnDef::new(Addresses::PostalCode).string_len(120).not_null())
                    .col(ColumnDef::new(Addresses::Country).string_len(120).not_null())
                    .col(
                        ColumnDef::new(Addresses::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Addresses::UpdatedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_addresses_billing_profile_id")
                            .from(Addresses::Table, Addresses::BillingProfileId)
                            .to(BillingProfiles::Table, BillingProfiles::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Addresses::Table).to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(BillingProfiles::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum BillingProfiles {
    Table,
    Id,
    Email,
    Active,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
pub enum Addresses {
    Table,
    Id,
    BillingProfileId,
    AddressType,
    Line1,
    Line2,
    City,
    State,
    PostalCode,
    Country,
    CreatedAt,
    UpdatedAt,
}
