use super::aggregate::{Customer, NewCustomer};
use super::errors::CustomerError;
use super::repository::CustomerRepository;
use crate::domain::order::Order;
use crate::state::{track, RequestState};

// ============================================================================
// Customer State
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct CustomerState {
    pub customers: Vec<Customer>,
    pub selected_customer: Option<Customer>,
    pub customer_orders: Vec<Order>,
    pub request: RequestState,
    pub search_term: String,
}

impl CustomerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_selected_customer(&mut self, customer: Option<Customer>) {
        self.selected_customer = customer;
    }

    pub fn clear_customer_orders(&mut self) {
        self.customer_orders.clear();
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub fn reset_filters(&mut self) {
        self.search_term.clear();
    }

    pub async fn get_customers(&mut self, repo: &CustomerRepository) -> Result<(), CustomerError> {
        let term = self.search_term.clone();
        self.customers = track(&mut self.request, repo.fetch_customers(&term)).await?;
        Ok(())
    }

    pub async fn get_customer_orders(
        &mut self,
        repo: &CustomerRepository,
        customer_id: &str,
    ) -> Result<(), CustomerError> {
        self.customer_orders = track(&mut self.request, repo.fetch_customer_orders(customer_id)).await?;
        Ok(())
    }

    pub async fn add_customer(&mut self, repo: &CustomerRepository, new_customer: NewCustomer) -> Result<(), CustomerError> {
        let customer = track(&mut self.request, repo.create_customer(new_customer)).await?;
        self.customers.push(customer);
        Ok(())
    }
}
