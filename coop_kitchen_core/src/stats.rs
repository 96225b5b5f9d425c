//! Per-episode counters gathered from step results.

use serde::{Deserialize, Serialize};

use crate::{
    Action, NUM_AGENTS, SoupState,
    environment::{Event, StepResult},
};

/// Why an episode stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Every order was served or failed.
    OrdersResolved,
    MaxSteps,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeStats {
    pub seed: Option<u64>,
    pub steps: u32,
    pub score: u32,
    pub failed_orders: usize,
    pub completed_orders: usize,
    pub unserved_active_end: usize,
    pub pending_left_end: usize,
    pub perfect: bool,
    pub total_reward: f32,
    /// Done soups nobody ordered.
    pub wrong_serve_attempts: u32,
    /// Undercooked or burnt soups.
    pub not_done_serve_attempts: u32,
    pub wrong_done_soup_pickups: u32,
    pub burnt_soup_pickups: u32,
    pub wrong_pot_adds: u32,
    pub collision_attempts: u32,
    pub both_idle_steps: u32,
    pub handoffs: u32,
    pub end_reason: Option<EndReason>,
}

impl EpisodeStats {
    pub fn new(seed: Option<u64>) -> Self {
        EpisodeStats {
            seed,
            ..Default::default()
        }
    }

    /// Folds one step into the counters.
    pub fn record(&mut self, actions: [Action; NUM_AGENTS], result: &StepResult) {
        let info = &result.info;
        self.steps = info.step;
        self.score = info.score;
        self.failed_orders = info.failed_orders;
        self.completed_orders = info.completed_orders;
        self.unserved_active_end = info.unserved_active;
        self.pending_left_end = info.pending_orders;
        self.perfect |= info.perfect;
        self.total_reward += result.reward;

        if actions.iter().all(|action| *action == Action::Stay) {
            self.both_idle_steps += 1;
        }

        for event in &info.events {
            match event {
                Event::ServeRejected {
                    state: SoupState::Done,
                    ..
                } => self.wrong_serve_attempts += 1,
                Event::ServeRejected { .. } => self.not_done_serve_attempts += 1,
                Event::SoupCollected {
                    state: SoupState::Done,
                    wanted: false,
                    ..
                } => self.wrong_done_soup_pickups += 1,
                Event::SoupCollected {
                    state: SoupState::Burnt,
                    ..
                } => self.burnt_soup_pickups += 1,
                Event::PotAddRejected { .. } => self.wrong_pot_adds += 1,
                Event::Collision { .. } => self.collision_attempts += 1,
                Event::ItemPlaced { handoff: true, .. } => self.handoffs += 1,
                _ => {}
            }
        }

        if result.done {
            let resolved = info.pending_orders == 0 && info.unserved_active == 0;
            self.end_reason = Some(if resolved {
                EndReason::OrdersResolved
            } else {
                EndReason::MaxSteps
            });
        }
    }

    pub fn is_finished(&self) -> bool {
        self.end_reason.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Direction, Item, Position, Recipe,
        config::EnvConfig,
        environment::Kitchen,
        order::Order,
    };

    #[test]
    fn counts_serve_attempts_and_idle_steps() {
        let mut kitchen = Kitchen::from_preset("level_2", EnvConfig::default()).unwrap();
        kitchen.reset(Some(0));
        kitchen.set_orders(vec![Order::active(Recipe::OnionSoup, 0, 600)]);
        let mut stats = EpisodeStats::new(Some(0));

        kitchen.agents[1].position = Position::new(3, 1);
        kitchen.agents[1].direction = Direction::Up;
        kitchen.agents[1].holding = Some(Item::Soup {
            state: SoupState::Done,
            recipe: Recipe::TomatoSoup,
        });
        let actions = [Action::Stay, Action::Interact];
        let result = kitchen.step(actions[0], actions[1]);
        stats.record(actions, &result);

        let idle = [Action::Stay, Action::Stay];
        let result = kitchen.step(idle[0], idle[1]);
        stats.record(idle, &result);

        assert_eq!(stats.wrong_serve_attempts, 1);
        assert_eq!(stats.not_done_serve_attempts, 0);
        assert_eq!(stats.both_idle_steps, 1);
        assert_eq!(stats.steps, 2);
        assert!(!stats.is_finished());
    }

    #[test]
    fn end_reason_on_max_steps() {
        let config = EnvConfig {
            max_steps: 3,
            ..EnvConfig::default()
        };
        let mut kitchen = Kitchen::from_preset("level_3", config).unwrap();
        kitchen.reset(Some(0));
        let mut stats = EpisodeStats::new(Some(0));
        let actions = [Action::Stay, Action::Stay];
        for _ in 0..3 {
            let result = kitchen.step(actions[0], actions[1]);
            stats.record(actions, &result);
        }
        assert_eq!(stats.end_reason, Some(EndReason::MaxSteps));
        assert_eq!(stats.both_idle_steps, 3);
        assert!((stats.total_reward + 0.03).abs() < 1e-5);
    }
}
