use serde::Serialize;

use crate::domain::order::{Order, OrderStatus};

/// Takings split by fulfilment path. Only paid orders count: pickup ends
/// in `COMPLETED`, delivery in `DELIVERED`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevenueSummary {
    pub pickup_orders: usize,
    pub delivery_orders: usize,
    pub pickup_revenue: f64,
    pub delivery_revenue: f64,
    pub total_revenue: f64,
}

impl RevenueSummary {
    pub fn from_orders(orders: &[Order]) -> Self {
        let mut summary = Self::default();

        for order in orders.iter().filter(|o| o.payment_status) {
            match order.status {
                OrderStatus::Completed => {
                    summary.pickup_orders += 1;
                    summary.pickup_revenue += order.total_amount;
                }
                OrderStatus::Delivered => {
                    summary.delivery_orders += 1;
                    summary.delivery_revenue += order.total_amount;
                }
                _ => {}
            }
        }

        summary.total_revenue = summary.pickup_revenue + summary.delivery_revenue;
        summary
    }
}
