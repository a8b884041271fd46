use super::aggregate::{NewOrder, Order, StatusUpdate, UpdatedOrderSummary};
use super::errors::OrderError;
use super::filters::{FiltersPatch, OrderFilters};
use super::repository::OrderRepository;
use super::value_objects::OrderStatus;
use crate::state::{paginate, total_pages, track, RequestState};

// ============================================================================
// Order State - Cached order list, filters and the order being acted on
// ============================================================================

#[derive(Debug, Clone)]
pub struct OrderState {
    pub orders: Vec<Order>,
    pub request: RequestState,
    pub current_order: Option<Order>,
    pub filters: OrderFilters,
    per_page: usize,
}

impl OrderState {
    pub fn new(per_page: usize) -> Self {
        Self {
            orders: Vec::new(),
            request: RequestState::default(),
            current_order: None,
            filters: OrderFilters::default(),
            per_page,
        }
    }

    pub fn set_filters(&mut self, patch: FiltersPatch) {
        self.filters.merge(patch);
    }

    pub fn reset_filters(&mut self) {
        self.filters = OrderFilters::default();
    }

    pub fn set_current_order(&mut self, order: Option<Order>) {
        self.current_order = order;
    }

    pub fn find(&self, order_id: &str) -> Option<&Order> {
        self.orders.iter().find(|order| order.id == order_id)
    }

    /// Reload the list with the current filters
    pub async fn get_orders(&mut self, repo: &OrderRepository) -> Result<(), OrderError> {
        let filters = self.filters.clone();
        self.orders = track(&mut self.request, repo.fetch_orders(&filters)).await?;
        Ok(())
    }

    pub async fn add_order(&mut self, repo: &OrderRepository, new_order: NewOrder) -> Result<(), OrderError> {
        let order = track(&mut self.request, repo.create_order(new_order)).await?;
        // Newest first, as fetch_orders returns them
        self.orders.insert(0, order);
        Ok(())
    }

    pub async fn change_order_status(
        &mut self,
        repo: &OrderRepository,
        order_id: &str,
        status: OrderStatus,
        update: StatusUpdate,
    ) -> Result<(), OrderError> {
        let summary = track(&mut self.request, repo.update_status(order_id, status, update)).await?;
        self.apply(&summary);
        Ok(())
    }

    /// Accept a cached order with its own line items. Orders the cache does
    /// not show as placed are refused without touching the store.
    pub async fn accept_order(
        &mut self,
        repo: &OrderRepository,
        order_id: &str,
        update: StatusUpdate,
    ) -> Result<(), OrderError> {
        let items = match self.find(order_id) {
            Some(order) if order.status == OrderStatus::Placed => order.items.clone(),
            Some(order) => {
                let err = OrderError::IllegalTransition {
                    from: order.status,
                    to: OrderStatus::Accepted,
                };
                self.request.rejected(&err);
                return Err(err);
            }
            None => {
                let err = OrderError::NotFound(format!("order {} is not loaded", order_id));
                self.request.rejected(&err);
                return Err(err);
            }
        };

        let summary = track(&mut self.request, repo.confirm_order(order_id, update, &items)).await?;
        self.apply(&summary);
        Ok(())
    }

    pub async fn cancel_order(&mut self, repo: &OrderRepository, order_id: &str) -> Result<(), OrderError> {
        let summary = track(&mut self.request, repo.cancel_order(order_id)).await?;
        self.apply(&summary);
        Ok(())
    }

    pub async fn remove_order(&mut self, repo: &OrderRepository, order_id: &str) -> Result<(), OrderError> {
        let removed = track(&mut self.request, repo.delete_order(order_id)).await?;
        self.orders.retain(|order| order.id != removed);
        if self.current_order.as_ref().is_some_and(|order| order.id == removed) {
            self.current_order = None;
        }
        Ok(())
    }

    /// 1-based page of the cached list
    pub fn page(&self, page: usize) -> &[Order] {
        paginate(&self.orders, page, self.per_page)
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.orders.len(), self.per_page)
    }

    fn apply(&mut self, summary: &UpdatedOrderSummary) {
        let cached = self
            .orders
            .iter_mut()
            .chain(self.current_order.as_mut())
            .filter(|order| order.id == summary.id);
        for order in cached {
            order.status = summary.status;
            order.discount = summary.discount;
            order.notes = summary.notes.clone();
        }
    }
}
