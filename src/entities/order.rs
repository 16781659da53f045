use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::entity::prelude::*;
use sea_orm::ActiveValue::{NotSet, Set, Unchanged};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::errors::ServiceError;
use crate::identifiers::{generate_unique_order_id, DEFAULT_MAX_ATTEMPTS};

/// Shipping charge a new order starts with
pub const DEFAULT_SHIPPING_TOTAL: Decimal = dec!(9.99);

/// Largest amount a `decimal(9,2)` money column holds
pub const MAX_AMOUNT: Decimal = dec!(9999999.99);

/// Whether `value` is storable in a `decimal(9,2)` column without rounding.
pub fn fits_amount_column(value: Decimal) -> bool {
    value.round_dp(2) == value && value.abs() <= MAX_AMOUNT
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Public slug, assigned on first insert and never changed
    #[sea_orm(unique)]
    pub order_id: String,

    #[sea_orm(nullable)]
    pub billing_profile_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub shipping_address_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub billing_address_id: Option<Uuid>,
    #[sea_orm(nullable)]
    pub cart_id: Option<Uuid>,

    pub status: OrderStatus,
    #[sea_orm(column_type = "Decimal(Some((9, 2)))")]
    pub shipping_total: Decimal,
    #[sea_orm(column_type = "Decimal(Some((9, 2)))")]
    pub total: Decimal,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Model {
    /// Still eligible for checkout steps
    pub fn is_open(&self) -> bool {
        self.active && self.status == OrderStatus::Created
    }

    /// Whether the order carries everything needed to be paid: a billing
    /// profile plus shipping and billing addresses.
    ///
    /// A negative total can only come from tampered or corrupted data and is
    /// reported as an error instead of `false`.
    pub fn is_complete(&self) -> Result<bool, ServiceError> {
        if self.total.is_sign_negative() && !self.total.is_zero() {
            return Err(ServiceError::DataIntegrity(format!(
                "suspicious activity: order {} has negative total {}",
                self.order_id, self.total
            )));
        }
        Ok(self.missing_checkout_details().is_empty())
    }

    /// Names of the references still unset before the order can be paid.
    pub fn missing_checkout_details(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.billing_profile_id.is_none() {
            missing.push("billing_profile");
        }
        if self.shipping_address_id.is_none() {
            missing.push("shipping_address");
        }
        if self.billing_address_id.is_none() {
            missing.push("billing_address");
        }
        missing
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.order_id)
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::cart::Entity",
        from = "Column::CartId",
        to = "super::cart::Column::Id",
        on_delete = "SetNull"
    )]
    Cart,
    #[sea_orm(
        belongs_to = "super::billing_profile::Entity",
        from = "Column::BillingProfileId",
        to = "super::billing_profile::Column::Id",
        on_delete = "SetNull"
    )]
    BillingProfile,
    #[sea_orm(
        belongs_to = "super::address::Entity",
        from = "Column::ShippingAddressId",
        to = "super::address::Column::Id",
        on_delete = "SetNull"
    )]
    ShippingAddress,
    #[sea_orm(
        belongs_to = "super::address::Entity",
        from = "Column::BillingAddressId",
        to = "super::address::Column::Id",
        on_delete = "SetNull"
    )]
    BillingAddress,
}

impl Related<super::cart::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Cart.def()
    }
}

impl Related<super::billing_profile::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BillingProfile.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    fn new() -> Self {
        Self {
            id: Set(Uuid::new_v4()),
            status: Set(OrderStatus::Created),
            shipping_total: Set(DEFAULT_SHIPPING_TOTAL),
            total: Set(Decimal::ZERO),
            active: Set(true),
            ..ActiveModelTrait::default()
        }
    }

    async fn before_save<C>(mut self, db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let now = Utc::now();

        if insert {
            let missing_order_id = match &self.order_id {
                Set(value) | Unchanged(value) => value.trim().is_empty(),
                NotSet => true,
            };
            if missing_order_id {
                let seed = match &self.id {
                    Set(id) | Unchanged(id) => *id,
                    NotSet => {
                        let id = Uuid::new_v4();
                        self.id = Set(id);
                        id
                    }
                };
                self.order_id =
                    Set(generate_unique_order_id(db, seed, DEFAULT_MAX_ATTEMPTS).await?);
            }
            if self.created_at.is_not_set() {
                self.created_at = Set(now);
            }
        } else if self.order_id.is_set() {
            return Err(DbErr::Custom(
                "order identifier is immutable once assigned".to_string(),
            ));
        }

        self.updated_at = Set(now);
        Ok(self)
    }
}

/// Order lifecycle status
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum OrderStatus {
    #[sea_orm(string_value = "created")]
    Created,
    #[sea_orm(string_value = "paid")]
    Paid,
    #[sea_orm(string_value = "shipped")]
    Shipped,
    #[sea_orm(string_value = "refunded")]
    Refunded,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::str::FromStr;

    fn order(total: Decimal) -> Model {
        let now = Utc::now();
        Model {
            id: Uuid::new_v4(),
            order_id: "abc123def0".to_string(),
            billing_profile_id: None,
            shipping_address_id: None,
            billing_address_id: None,
            cart_id: Some(Uuid::new_v4()),
            status: OrderStatus::Created,
            shipping_total: DEFAULT_SHIPPING_TOTAL,
            total,
            active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[rstest]
    #[case(false, false, false, false)]
    #[case(true, false, false, false)]
    #[case(true, true, false, false)]
    #[case(true, false, true, false)]
    #[case(false, true, true, false)]
    #[case(true, true, true, true)]
    fn complete_only_with_profile_and_both_addresses(
        #[case] profile: bool,
        #[case] shipping: bool,
        #[case] billing: bool,
        #[case] expected: bool,
    ) {
        let mut o = order(dec!(49.99));
        o.billing_profile_id = profile.then(Uuid::new_v4);
        o.shipping_address_id = shipping.then(Uuid::new_v4);
        o.billing_address_id = billing.then(Uuid::new_v4);
        assert_eq!(o.is_complete().unwrap(), expected);
    }

    #[test]
    fn negative_total_is_a_data_integrity_error() {
        let mut o = order(dec!(-0.01));
        o.billing_profile_id = Some(Uuid::new_v4());
        o.shipping_address_id = Some(Uuid::new_v4());
        o.billing_address_id = Some(Uuid::new_v4());
        let err = o.is_complete().unwrap_err();
        assert!(err.is_integrity_violation());
        assert!(err.to_string().contains("suspicious activity"));
    }

    #[test]
    fn zero_total_is_not_suspicious() {
        assert_eq!(order(Decimal::ZERO).is_complete().unwrap(), false);
    }

    #[test]
    fn missing_details_are_listed_in_field_order() {
        let mut o = order(dec!(10));
        assert_eq!(
            o.missing_checkout_details(),
            vec!["billing_profile", "shipping_address", "billing_address"]
        );
        o.shipping_address_id = Some(Uuid::new_v4());
        assert_eq!(
            o.missing_checkout_details(),
            vec!["billing_profile", "billing_address"]
        );
    }

    #[rstest]
    #[case(dec!(0), true)]
    #[case(dec!(12.50), true)]
    #[case(dec!(12.500), true)]
    #[case(dec!(9999999.99), true)]
    #[case(dec!(10000000.00), false)]
    #[case(dec!(1.005), false)]
    fn amount_column_bounds(#[case] value: Decimal, #[case] fits: bool) {
        assert_eq!(fits_amount_column(value), fits);
    }

    #[test]
    fn displays_as_its_slug() {
        assert_eq!(order(dec!(1)).to_string(), "abc123def0");
    }

    #[test]
    fn open_means_active_and_created() {
        let mut o = order(dec!(1));
        assert!(o.is_open());
        o.active = false;
        assert!(!o.is_open());
        o.active = true;
        o.status = OrderStatus::Paid;
        assert!(!o.is_open());
    }

    #[test]
    fn status_round_trips_through_text() {
        assert_eq!(OrderStatus::Refunded.to_string(), "refunded");
        assert_eq!(OrderStatus::from_str("paid").unwrap(), OrderStatus::Paid);
        assert!(OrderStatus::from_str("cancelled").is_err());
    }

    #[test]
    fn new_active_model_carries_defaults() {
        let am = <ActiveModel as ActiveModelBehavior>::new();
        assert_eq!(am.status, Set(OrderStatus::Created));
        assert_eq!(am.shipping_total, Set(dec!(9.99)));
        assert_eq!(am.total, Set(Decimal::ZERO));
        assert_eq!(am.active, Set(true));
        assert!(am.order_id.is_not_set());
    }
}
