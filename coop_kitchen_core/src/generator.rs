use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    Recipe,
    config::OrderGenConfig,
    order::Order,
};

/// Seeded source of per-episode order schedules.
#[derive(Debug, Clone)]
pub struct OrderGenerator {
    rng: StdRng,
    seed: Option<u64>,
}

impl OrderGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            seed: Some(seed),
        }
    }

    /// A generator seeded from OS entropy. Episodes are not reproducible.
    pub fn from_entropy() -> Self {
        Self {
            rng: StdRng::from_os_rng(),
            seed: None,
        }
    }

    /// The seed the generator was last created with, if any.
    pub fn seed(&self) -> Option<u64> {
        self.seed
    }

    /// Draws one episode's orders.
    ///
    /// The first order starts at step 0; each later one starts a uniformly
    /// drawn gap after the previous. Recipes are drawn uniformly.
    pub fn generate(&mut self, config: &OrderGenConfig) -> Vec<Order> {
        let mut start = 0u32;
        let mut orders = Vec::with_capacity(config.orders_per_episode);
        for i in 0..config.orders_per_episode {
            if i > 0 {
                start = start.saturating_add(
                    self.rng
                        .random_range(config.order_gap_min..=config.order_gap_max),
                );
            }
            let meal = Recipe::ALL[self.rng.random_range(0..Recipe::ALL.len())];
            orders.push(Order::pending(meal, start));
        }
        tracing::debug!(seed = ?self.seed, count = orders.len(), "Generated orders");
        orders
    }
}
