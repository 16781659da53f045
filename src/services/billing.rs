use sea_orm::{ActiveModelBehavior, ActiveModelTrait, EntityTrait, Set};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use uuid::Uuid;
use validator::Validate;

use crate::{
    db::DbPool,
    entities::{
        address::{self, AddressType, Entity as AddressEntity, Model as AddressModel},
        billing_profile::{self, Entity as BillingProfileEntity, Model as BillingProfileModel},
    },
    errors::ServiceError,
};

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewBillingProfile {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewAddress {
    pub billing_profile_id: Option<Uuid>,
    pub address_type: AddressType,
    #[validate(length(min = 1, max = 120))]
    pub line1: String,
    #[validate(length(max = 120))]
    pub line2: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub city: String,
    #[validate(length(min = 1, max = 120))]
    pub state: String,
    #[validate(length(min = 1, max = 120))]
    pub postal_code: String,
    #[validate(length(min = 1, max = 120))]
    pub country: String,
}

/// Storage for the billing profiles and addresses orders point at
#[derive(Clone)]
pub struct BillingService {
    db_pool: Arc<DbPool>,
}

impl BillingService {
    pub fn new(db_pool: Arc<DbPool>) -> Self {
        Self { db_pool }
    }

    #[instrument(skip(self, request))]
    pub async fn create_profile(
        &self,
        request: NewBillingProfile,
    ) -> Result<BillingProfileModel, ServiceError> {
        request.validate()?;

        let mut profile = billing_profile::ActiveModel::new();
        profile.email = Set(request.email.trim().to_lowercase());
        let created = profile.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to create billing profile");
            ServiceError::DatabaseError(e)
        })?;
        info!(billing_profile_id = %created.id, "Billing profile created");
        Ok(created)
    }

    pub async fn get_profile(&self, id: Uuid) -> Result<Option<BillingProfileModel>, ServiceError> {
        Ok(BillingProfileEntity::find_by_id(id)
            .one(&*self.db_pool)
            .await?)
    }

    /// Deletes a billing profile. Orders and addresses keep existing with the
    /// reference cleared.
    #[instrument(skip(self), fields(billing_profile_id = %id))]
    pub async fn delete_profile(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = BillingProfileEntity::delete_by_id(id)
            .exec(&*self.db_pool)
            .await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::billing_profile_not_found(id));
        }
        info!("Billing profile deleted");
        Ok(())
    }

    #[instrument(skip(self, request), fields(address_type = %request.address_type))]
    pub async fn create_address(&self, request: NewAddress) -> Result<AddressModel, ServiceError> {
        request.validate()?;

        if let Some(profile_id) = request.billing_profile_id {
            self.get_profile(profile_id)
                .await?
                .ok_or_else(|| ServiceError::billing_profile_not_found(profile_id))?;
        }

        let mut addr = address::ActiveModel::new();
        addr.billing_profile_id = Set(request.billing_profile_id);
        addr.address_type = Set(request.address_type);
        addr.line1 = Set(request.line1);
        addr.line2 = Set(request.line2);
        addr.city = Set(request.city);
        addr.state = Set(request.state);
        addr.postal_code = Set(request.postal_code);
        addr.country = Set(request.country);

        let created = addr.insert(&*self.db_pool).await.map_err(|e| {
            error!(error = %e, "Failed to create address");
            ServiceError::DatabaseError(e)
        })?;
        info!(address_id = %created.id, "Address created");
        Ok(created)
    }

    pub async fn get_address(&self, id: Uuid) -> Result<Option<AddressModel>, ServiceError> {
        Ok(AddressEntity::find_by_id(id).one(&*self.db_pool).await?)
    }

    #[instrument(skip(self), fields(address_id = %id))]
    pub async fn delete_address(&self, id: Uuid) -> Result<(), ServiceError> {
        let result = AddressEntity::delete_by_id(id).exec(&*self.db_pool).await?;
        if result.rows_affected == 0 {
            return Err(ServiceError::address_not_found(id));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_email_must_be_valid() {
        assert!(NewBillingProfile {
            email: "shopper@example.com".into()
        }
        .validate()
        .is_ok());
        assert!(NewBillingProfile {
            email: "not-an-email".into()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn address_requires_street_and_city() {
        let address = NewAddress {
            billing_profile_id: None,
            address_type: AddressType::Shipping,
            line1: String::new(),
            line2: None,
            city: "Springfield".into(),
            state: "IL".into(),
            postal_code: "62701".into(),
            country: "US".into(),
        };
        let errors = address.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("line1"));
    }
}
