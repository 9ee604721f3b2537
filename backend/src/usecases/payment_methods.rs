use std::sync::Arc;

use practice_payments::domain::{
    entities::payment_methods::{InsertPaymentMethodEntity, PaymentMethodEntity},
    repositories::payment_methods::PaymentMethodRepository,
};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;

use super::payment_errors::{PaymentError, PaymentResult};

/// A card already tokenized by the processor. Brand, last4 and expiry are display only.
#[derive(Debug, Clone, Deserialize)]
pub struct NewPaymentMethod {
    pub provider_customer_id: String,
    pub provider_method_id: String,
    pub brand: Option<String>,
    pub last4: Option<String>,
    pub exp_month: Option<i32>,
    pub exp_year: Option<i32>,
}

impl NewPaymentMethod {
    fn validate(&self) -> PaymentResult<()> {
        if self.provider_customer_id.trim().is_empty() || self.provider_method_id.trim().is_empty() {
            return Err(PaymentError::InvalidInput(
                "provider_customer_id and provider_method_id are required".to_string(),
            ));
        }
        if let Some(last4) = &self.last4 {
            if last4.len() != 4 || !last4.chars().all(|c| c.is_ascii_digit()) {
                return Err(PaymentError::InvalidInput("last4 must be four digits".to_string()));
            }
        }
        if self.exp_month.is_some_and(|month| !(1..=12).contains(&month)) {
            return Err(PaymentError::InvalidInput(
                "exp_month must be between 1 and 12".to_string(),
            ));
        }
        if self.exp_year.is_some_and(|year| year < 2000) {
            return Err(PaymentError::InvalidInput("exp_year must be a four-digit year".to_string()));
        }
        Ok(())
    }
}

pub struct PaymentMethodUseCase {
    repository: Arc<dyn PaymentMethodRepository + Send + Sync>,
}

impl PaymentMethodUseCase {
    pub fn new(repository: Arc<dyn PaymentMethodRepository + Send + Sync>) -> Self {
        Self { repository }
    }

    pub async fn list(&self, user_id: Uuid) -> PaymentResult<Vec<PaymentMethodEntity>> {
        self.repository.list_by_user(user_id).await.map_err(|err| {
            error!(%user_id, db_error = ?err, "payment_methods: failed to list");
            PaymentError::Internal(err)
        })
    }

    pub async fn find_default(&self, user_id: Uuid) -> PaymentResult<Option<PaymentMethodEntity>> {
        Ok(self.repository.find_default(user_id).await?)
    }

    /// Saves a method. The user's first method always becomes the default.
    pub async fn add(
        &self,
        user_id: Uuid,
        new_method: NewPaymentMethod,
        make_default: bool,
    ) -> PaymentResult<PaymentMethodEntity> {
        new_method.validate()?;

        let insert = InsertPaymentMethodEntity {
            user_id,
            provider_customer_id: new_method.provider_customer_id,
            provider_method_id: new_method.provider_method_id,
            brand: new_method.brand,
            last4: new_method.last4,
            exp_month: new_method.exp_month,
            exp_year: new_method.exp_year,
            is_default: make_default,
        };

        let saved = self
            .repository
            .insert(insert, make_default)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "payment_methods: failed to insert");
                PaymentError::Internal(err)
            })?;

        info!(
            %user_id,
            payment_method_id = %saved.id,
            is_default = saved.is_default,
            "payment_methods: added"
        );
        Ok(saved)
    }

    pub async fn set_default(&self, user_id: Uuid, method_id: Uuid) -> PaymentResult<()> {
        let updated = self
            .repository
            .set_default(user_id, method_id)
            .await
            .map_err(|err| {
                error!(%user_id, %method_id, db_error = ?err, "payment_methods: failed to set default");
                PaymentError::Internal(err)
            })?;

        if !updated {
            return Err(PaymentError::NotFound("payment method"));
        }

        info!(%user_id, %method_id, "payment_methods: default changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::usecases::test_support::InMemoryStore;
    use mockall::predicate::eq;
    use practice_payments::domain::repositories::payment_methods::MockPaymentMethodRepository;

    fn card(method_id: &str) -> NewPaymentMethod {
        NewPaymentMethod {
            provider_customer_id: "cus_1".to_string(),
            provider_method_id: method_id.to_string(),
            brand: Some("visa".to_string()),
            last4: Some("4242".to_string()),
            exp_month: Some(4),
            exp_year: Some(2031),
        }
    }

    #[tokio::test]
    async fn first_method_becomes_default() {
        let store = Arc::new(InMemoryStore::default());
        let usecase = PaymentMethodUseCase::new(store.clone());
        let user_id = Uuid::new_v4();

        let first = usecase.add(user_id, card("pm_1"), false).await.unwrap();
        let second = usecase.add(user_id, card("pm_2"), false).await.unwrap();

        assert!(first.is_default);
        assert!(!second.is_default);
        assert_eq!(usecase.find_default(user_id).await.unwrap().map(|m| m.id), Some(first.id));
    }

    #[tokio::test]
    async fn at_most_one_default_after_any_sequence_of_changes() {
        let store = Arc::new(InMemoryStore::default());
        let usecase = PaymentMethodUseCase::new(store.clone());
        let user_id = Uuid::new_v4();

        let a = usecase.add(user_id, card("pm_a"), false).await.unwrap();
        let b = usecase.add(user_id, card("pm_b"), true).await.unwrap();
        let c = usecase.add(user_id, card("pm_c"), false).await.unwrap();
        assert_eq!(store.defaults_for(user_id), 1);

        for target in [c.id, a.id, a.id, b.id, c.id] {
            usecase.set_default(user_id, target).await.unwrap();
            assert_eq!(store.defaults_for(user_id), 1);
        }

        let listed = usecase.list(user_id).await.unwrap();
        assert_eq!(listed[0].id, c.id);
        assert!(listed[0].is_default);
    }

    #[tokio::test]
    async fn set_default_for_someone_elses_method_is_not_found() {
        let mut repository = MockPaymentMethodRepository::new();
        let user_id = Uuid::new_v4();
        let method_id = Uuid::new_v4();
        repository
            .expect_set_default()
            .with(eq(user_id), eq(method_id))
            .times(1)
            .returning(|_, _| Ok(false));

        let result = PaymentMethodUseCase::new(Arc::new(repository))
            .set_default(user_id, method_id)
            .await;

        assert!(matches!(result, Err(PaymentError::NotFound("payment method"))));
    }

    #[tokio::test]
    async fn malformed_card_details_are_rejected() {
        let usecase = PaymentMethodUseCase::new(Arc::new(MockPaymentMethodRepository::new()));
        let user_id = Uuid::new_v4();

        let mut bad_last4 = card("pm_1");
        bad_last4.last4 = Some("42a2".to_string());
        let mut bad_month = card("pm_1");
        bad_month.exp_month = Some(13);

        for method in [bad_last4, bad_month] {
            let result = usecase.add(user_id, method, false).await;
            assert!(matches!(result, Err(PaymentError::InvalidInput(_))));
        }
    }
}
