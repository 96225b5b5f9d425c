use serde::{Deserialize, Serialize};

use crate::Recipe;

/// Lifecycle of an order. `Served` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderStatus {
    Pending,
    Active,
    Served,
    Failed,
}

/// A time-windowed request for a recipe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub meal: Recipe,
    /// Step at which the order becomes active.
    pub start: u32,
    /// Assigned on activation: `start + order_time`.
    pub deadline: Option<u32>,
    pub status: OrderStatus,
}

impl Order {
    /// A pending order that activates at `start`.
    pub fn pending(meal: Recipe, start: u32) -> Self {
        Order {
            meal,
            start,
            deadline: None,
            status: OrderStatus::Pending,
        }
    }

    /// An already active order with an explicit deadline.
    pub fn active(meal: Recipe, start: u32, deadline: u32) -> Self {
        Order {
            meal,
            start,
            deadline: Some(deadline),
            status: OrderStatus::Active,
        }
    }

    pub fn onions(&self) -> u8 {
        self.meal.counts().0
    }

    pub fn tomatoes(&self) -> u8 {
        self.meal.counts().1
    }

    /// Deadline used for ranking; pending orders rank by the deadline they will get.
    fn ranking_deadline(&self, order_time: u32) -> u32 {
        self.deadline
            .unwrap_or_else(|| self.start.saturating_add(order_time))
    }
}

/// Orders whose status changed during one lifecycle pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LifecycleChanges {
    pub activated: Vec<usize>,
    pub failed: Vec<usize>,
}

/// Order a partially filled pot is working towards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetChoice {
    pub index: usize,
    pub onions: u8,
    pub tomatoes: u8,
    /// Contents already equal the order's composition.
    pub exact: bool,
}

/// All orders of an episode together with completion and failure history.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    orders: Vec<Order>,
    completed: Vec<usize>,
    failed: Vec<usize>,
}

impl OrderBook {
    /// Builds a book from orders in any status. Orders already served or
    /// failed are recorded in list order.
    pub fn new(orders: Vec<Order>) -> Self {
        let completed = Self::indices_with(&orders, OrderStatus::Served);
        let failed = Self::indices_with(&orders, OrderStatus::Failed);
        OrderBook {
            orders,
            completed,
            failed,
        }
    }

    fn indices_with(orders: &[Order], status: OrderStatus) -> Vec<usize> {
        orders
            .iter()
            .enumerate()
            .filter(|(_, order)| order.status == status)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn get(&self, index: usize) -> Option<&Order> {
        self.orders.get(index)
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Order> {
        self.with_status(OrderStatus::Pending)
    }

    /// Active orders that have not been served yet.
    pub fn active(&self) -> impl Iterator<Item = &Order> {
        self.with_status(OrderStatus::Active)
    }

    /// Served orders in the order they were served.
    pub fn completed(&self) -> impl Iterator<Item = &Order> {
        self.completed.iter().map(|&index| &self.orders[index])
    }

    /// Failed orders in the order they failed.
    pub fn failed(&self) -> impl Iterator<Item = &Order> {
        self.failed.iter().map(|&index| &self.orders[index])
    }

    fn with_status(&self, status: OrderStatus) -> impl Iterator<Item = &Order> {
        self.orders.iter().filter(move |order| order.status == status)
    }

    pub fn pending_count(&self) -> usize {
        self.pending().count()
    }

    pub fn active_count(&self) -> usize {
        self.active().count()
    }

    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    pub fn failed_count(&self) -> usize {
        self.failed.len()
    }

    /// No order is pending and every activated order was served or failed.
    pub fn all_resolved(&self) -> bool {
        self.orders
            .iter()
            .all(|order| matches!(order.status, OrderStatus::Served | OrderStatus::Failed))
    }

    /// Runs the lifecycle pass for `step`.
    ///
    /// Pending orders whose start has been reached become active with a
    /// deadline; then every active order whose deadline lies before `step`
    /// fails. Terminal orders are never touched.
    pub fn advance(&mut self, step: u32, order_time: u32) -> LifecycleChanges {
        let mut changes = LifecycleChanges::default();

        for (index, order) in self.orders.iter_mut().enumerate() {
            if order.status == OrderStatus::Pending && order.start <= step {
                order.status = OrderStatus::Active;
                order.deadline = Some(order.start.saturating_add(order_time));
                changes.activated.push(index);
            }
        }

        for (index, order) in self.orders.iter_mut().enumerate() {
            if order.status == OrderStatus::Active && order.deadline.is_some_and(|d| step > d) {
                order.status = OrderStatus::Failed;
                changes.failed.push(index);
            }
        }
        self.failed.extend_from_slice(&changes.failed);

        changes
    }

    /// True iff some active order asks for `recipe`.
    pub fn wants(&self, recipe: Recipe) -> bool {
        self.active().any(|order| order.meal == recipe)
    }

    /// The active order a soup of `recipe` would be served to: the matching
    /// one with the earliest deadline, first in list order on ties.
    pub fn serve_candidate(&self, recipe: Recipe) -> Option<usize> {
        self.orders
            .iter()
            .enumerate()
            .filter(|(_, order)| order.status == OrderStatus::Active && order.meal == recipe)
            .min_by_key(|(index, order)| (order.deadline.unwrap_or(u32::MAX), *index))
            .map(|(index, _)| index)
    }

    /// Marks an active order as served. Returns `false` if it was not active.
    pub fn serve(&mut self, index: usize) -> bool {
        match self.orders.get_mut(index) {
            Some(order) if order.status == OrderStatus::Active => {
                order.status = OrderStatus::Served;
                self.completed.push(index);
                true
            }
            _ => false,
        }
    }

    /// Chooses the order a pot holding `(onions, tomatoes)` is working towards.
    ///
    /// Candidates are active orders followed by pending ones; an order is
    /// compatible when it needs at least the pot's contents. Exact matches
    /// win, then the fewest missing ingredients, then the earliest deadline
    /// (pending orders use `start + order_time`), then candidate order.
    /// Returns `None` when no order can use the contents.
    pub fn select_target(&self, onions: u8, tomatoes: u8, order_time: u32) -> Option<TargetChoice> {
        let active = self.indexed(OrderStatus::Active);
        let pending = self.indexed(OrderStatus::Pending);

        active
            .chain(pending)
            .enumerate()
            .filter(|(_, (_, order))| order.onions() >= onions && order.tomatoes() >= tomatoes)
            .min_by_key(|(rank, (_, order))| {
                let missing = (order.onions() - onions) + (order.tomatoes() - tomatoes);
                (missing, order.ranking_deadline(order_time), *rank)
            })
            .map(|(_, (index, order))| TargetChoice {
                index,
                onions: order.onions(),
                tomatoes: order.tomatoes(),
                exact: order.onions() == onions && order.tomatoes() == tomatoes,
            })
    }

    fn indexed(&self, status: OrderStatus) -> impl Iterator<Item = (usize, &Order)> {
        self.orders
            .iter()
            .enumerate()
            .filter(move |(_, order)| order.status == status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activation_waits_for_start() {
        let mut book = OrderBook::new(vec![Order::pending(Recipe::OnionSoup, 5)]);
        for step in 0..5 {
            assert!(book.advance(step, 600).activated.is_empty());
        }
        assert_eq!(book.pending_count(), 1);

        let changes = book.advance(5, 600);
        assert_eq!(changes.activated, vec![0]);
        assert_eq!(book.pending_count(), 0);
        let order = book.active().next().unwrap();
        assert_eq!(order.deadline, Some(605));
    }

    #[test]
    fn expiry_is_strictly_after_deadline() {
        let mut book = OrderBook::new(vec![Order::active(Recipe::OnionSoup, 0, 10)]);
        assert!(book.advance(10, 600).failed.is_empty());
        assert_eq!(book.advance(11, 600).failed, vec![0]);
        assert_eq!(book.failed_count(), 1);
        assert_eq!(book.active_count(), 0);
        // terminal orders stay put
        assert!(book.advance(12, 600).failed.is_empty());
        assert_eq!(book.failed_count(), 1);
    }

    #[test]
    fn each_order_has_exactly_one_status() {
        let mut book = OrderBook::new(vec![
            Order::pending(Recipe::OnionSoup, 0),
            Order::pending(Recipe::TomatoSoup, 3),
            Order::pending(Recipe::OnionTomatoSoup, 6),
        ]);
        for step in 0..40 {
            book.advance(step, 10);
            if step == 4 {
                let index = book.serve_candidate(Recipe::OnionSoup).unwrap();
                assert!(book.serve(index));
            }
            let total = book.pending_count()
                + book.active_count()
                + book.completed_count()
                + book.failed_count();
            assert_eq!(total, book.len());
        }
        assert_eq!(book.completed_count(), 1);
        assert_eq!(book.failed_count(), 2);
        assert!(book.all_resolved());
        assert!(!book.serve(0));
    }

    #[test]
    fn serve_prefers_earliest_deadline() {
        let book = OrderBook::new(vec![
            Order::active(Recipe::OnionSoup, 0, 900),
            Order::active(Recipe::TomatoSoup, 0, 100),
            Order::active(Recipe::OnionSoup, 0, 300),
        ]);
        assert_eq!(book.serve_candidate(Recipe::OnionSoup), Some(2));
        assert_eq!(book.serve_candidate(Recipe::OnionTomatoSoup), None);
        assert!(book.wants(Recipe::TomatoSoup));
    }

    #[test]
    fn exact_match_beats_superset() {
        let book = OrderBook::new(vec![
            Order::active(Recipe::OnionTomatoSoup, 0, 100),
            Order::active(Recipe::OnionSoup, 0, 500),
        ]);
        let choice = book.select_target(1, 0, 600).unwrap();
        assert_eq!(choice.index, 1);
        assert!(choice.exact);
    }

    #[test]
    fn superset_target_when_no_exact_match() {
        let book = OrderBook::new(vec![
            Order::active(Recipe::TomatoSoup, 0, 100),
            Order::pending(Recipe::OnionTomatoSoup, 50),
        ]);
        let choice = book.select_target(1, 0, 600).unwrap();
        assert_eq!(choice.index, 1);
        assert!(!choice.exact);
        assert_eq!((choice.onions, choice.tomatoes), (1, 1));
    }

    #[test]
    fn ties_break_on_deadline() {
        let book = OrderBook::new(vec![
            Order::pending(Recipe::OnionSoup, 400),
            Order::active(Recipe::OnionSoup, 0, 900),
            Order::active(Recipe::OnionSoup, 0, 600),
        ]);
        // pending order ranks with deadline 400 + 600 = 1000
        assert_eq!(book.select_target(1, 0, 600).unwrap().index, 2);
    }

    #[test]
    fn incompatible_contents_have_no_target() {
        let book = OrderBook::new(vec![Order::active(Recipe::TomatoSoup, 0, 100)]);
        assert_eq!(book.select_target(1, 0, 600), None);
        assert!(OrderBook::default().select_target(0, 1, 600).is_none());
    }
}
