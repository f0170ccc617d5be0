use std::sync::Arc;
use validator::Validate;

use crate::dto::api_response::ApiResponse;
use crate::dto::customer_dto::{CreateCustomerRequest, CustomerResponse};
use crate::repositories::MotStore;
use crate::utils::errors::{not_found_error, AppError};

pub struct CustomerController {
    store: Arc<dyn MotStore>,
}

impl CustomerController {
    pub fn new(store: Arc<dyn MotStore>) -> Self {
        Self { store }
    }

    pub async fn create(
        &self,
        request: CreateCustomerRequest,
    ) -> Result<ApiResponse<CustomerResponse>, AppError> {
        request.validate()?;

        let customer = self.store.create_customer(request.into()).await?;
        tracing::info!("👤 Cliente {} creado ({})", customer.id, customer.name);

        Ok(ApiResponse::success_with_message(
            CustomerResponse::from(customer),
            "Customer created".to_string(),
        ))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<CustomerResponse, AppError> {
        let customer = self
            .store
            .find_customer(id)
            .await?
            .ok_or_else(|| not_found_error("Customer", &id.to_string()))?;

        Ok(CustomerResponse::from(customer))
    }
}
