use stamp_core::{new_id, now_rfc3339, ListParams, ListResult, ServiceError};

use crate::model::{OrderStatus, StampOrder};
use super::StampService;

pub struct CreateOrderInput {
    pub taxpayer_id: String,
    pub product_id: String,
    pub stamp_type_id: String,
    pub quantity: u32,
}

#[derive(Debug, Default)]
pub struct OrderFilters {
    pub status: Option<String>,
}

impl StampService {
    /// Create a new stamp order in `PENDING` status.
    pub fn create_order(&self, input: CreateOrderInput) -> Result<StampOrder, ServiceError> {
        if input.quantity == 0 {
            return Err(ServiceError::Validation(
                "order quantity must be greater than zero".into(),
            ));
        }
        if input.taxpayer_id.is_empty() || input.product_id.is_empty() {
            return Err(ServiceError::Validation(
                "taxpayer_id and product_id are required".into(),
            ));
        }

        let now = now_rfc3339();
        let order = StampOrder {
            id: new_id(),
            taxpayer_id: input.taxpayer_id,
            product_id: input.product_id,
            stamp_type_id: input.stamp_type_id,
            quantity: input.quantity,
            status: OrderStatus::Pending,
            approved_by: None,
            queued_by: None,
            production_batch: None,
            error: None,
            produced_at: None,
            create_at: Some(now.clone()),
            update_at: Some(now),
        };

        self.store.create_order(&order)?;
        Ok(order)
    }

    pub fn get_order(&self, id: &str) -> Result<StampOrder, ServiceError> {
        self.store.get_order(id)
    }

    pub fn list_orders(
        &self,
        params: &ListParams,
        filters: &OrderFilters,
    ) -> Result<ListResult<StampOrder>, ServiceError> {
        self.store.list_orders(params, filters.status.as_deref())
    }

    /// Approve a pending order, recording the approving operator.
    pub fn approve_order(&self, id: &str, approved_by: &str) -> Result<StampOrder, ServiceError> {
        let mut order = self.store.get_order(id)?;
        if order.status != OrderStatus::Pending {
            return Err(ServiceError::Validation(format!(
                "order {} cannot be approved in {} status",
                id,
                order.status.as_str()
            )));
        }
        order.status = OrderStatus::Approved;
        order.approved_by = Some(approved_by.to_string());
        order.update_at = Some(now_rfc3339());
        self.store.update_order(&order)?;
        Ok(order)
    }
}
