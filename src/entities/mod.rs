pub mod address;
pub mod billing_profile;
pub mod cart;
pub mod order;
