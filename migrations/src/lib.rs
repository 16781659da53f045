pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_billing_tables;
mod m20240101_000002_create_carts_table;
mod m20240101_000003_create_orders_table;
mod m20240101_000004_add_order_lookup_indexes;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_billing_tables::Migration),
            Box::new(m20240101_000002_create_carts_table::Migration),
            Box::new(m20240101_000003_create_orders_table::Migration),
            Box::new(m20240101_000004_add_order_lookup_indexes::Migration),
        ]
    }
}
