pub mod billing;
pub mod carts;
pub mod checkout;
pub mod order_ledger;
