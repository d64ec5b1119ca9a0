pub mod health;
pub mod internal;
pub mod metrics;
pub mod orders;
pub mod payment;

use common::AggregateId;
use domain::{ProductId, UserId};

use crate::error::ApiError;

pub(crate) fn parse_aggregate_id(id: &str) -> Result<AggregateId, ApiError> {
    id.parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid ID format: {e}")))
}

pub(crate) fn parse_user_id(id: &str) -> Result<UserId, ApiError> {
    id.parse::<i64>()
        .map(UserId::new)
        .map_err(|_| ApiError::BadRequest(format!("Invalid user ID: {id}")))
}

pub(crate) fn parse_product_id(id: &str) -> Result<ProductId, ApiError> {
    id.parse::<i64>()
        .map(ProductId::new)
        .map_err(|_| ApiError::BadRequest(format!("Invalid product ID: {id}")))
}
