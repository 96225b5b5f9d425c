use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::{
    Action, AgentId, Direction, Ingredient, Item, NUM_AGENTS, Position, Recipe, SoupState,
    config::{ConfigError, EnvConfig},
    connectivity::{Connectivity, StationDistances},
    generator::OrderGenerator,
    level::{Level, LevelError, Tile},
    order::{Order, OrderBook},
    pot::{AddOutcome, Pot, PotTransition, RejectReason},
};

/// Errors that prevent a kitchen from being built.
#[derive(Debug, thiserror::Error)]
pub enum KitchenError {
    #[error(transparent)]
    Level(#[from] LevelError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

/// Holds the state of an agent within the kitchen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentState {
    pub position: Position,
    pub direction: Direction,
    pub holding: Option<Item>,
}

impl AgentState {
    fn spawn(position: Position) -> Self {
        AgentState {
            position,
            direction: Direction::Up,
            holding: None,
        }
    }
}

/// What the serving station is showing after a serve attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ServeDisplay {
    Served(Recipe),
    Rejected,
}

/// Cosmetic state of the serving station. Has no effect on rewards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServingStation {
    pub display: Option<ServeDisplay>,
    pub ticks_left: u32,
}

impl ServingStation {
    fn show(&mut self, display: ServeDisplay, ticks: u32) {
        self.display = Some(display);
        self.ticks_left = ticks;
    }

    fn tick(&mut self) {
        if self.ticks_left > 0 {
            self.ticks_left -= 1;
            if self.ticks_left == 0 {
                self.display = None;
            }
        }
    }
}

/// Something that happened during a step. Collected for diagnostics and episode statistics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    OrderActivated { order: usize },
    OrderFailed { order: usize },
    Swapped,
    /// A move was blocked by the other agent.
    Collision { agent: AgentId },
    Dispensed { agent: AgentId, item: Item },
    IngredientAdded { agent: AgentId, ingredient: Ingredient, started: bool },
    PotAddRejected { agent: AgentId, ingredient: Ingredient, reason: RejectReason },
    SoupCollected { agent: AgentId, state: SoupState, recipe: Recipe, wanted: bool },
    PotCooked,
    PotBurnt,
    Served { agent: AgentId, recipe: Recipe, order: usize, reward: f32 },
    ServeRejected { agent: AgentId, state: SoupState, recipe: Recipe },
    Discarded { agent: AgentId, item: Item },
    ItemPlaced { agent: AgentId, item: Item, position: Position, handoff: bool },
    ItemPickedUp { agent: AgentId, item: Item, position: Position },
}

/// One agent's raw view: itself first, then its partner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentView {
    pub self_pos: Position,
    pub other_pos: Position,
    pub self_dir: Direction,
    pub other_dir: Direction,
    pub self_holding: Option<Item>,
    pub other_holding: Option<Item>,
}

/// Raw observation for both agents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub agents: [AgentView; NUM_AGENTS],
}

/// Additional information from a step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    pub step: u32,
    pub score: u32,
    pub failed_orders: usize,
    pub completed_orders: usize,
    pub pending_orders: usize,
    pub unserved_active: usize,
    /// The episode hit `max_steps`.
    pub truncated: bool,
    /// Terminal step with every order served and none failed.
    pub perfect: bool,
    pub events: Vec<Event>,
}

/// Step result from the kitchen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub observation: Observation,
    pub reward: f32,
    pub done: bool,
    pub info: StepInfo,
}

/// The cooperative kitchen simulation.
///
/// Per-episode state is public so tooling can inspect it and tests can stage
/// scenarios; the layout, configuration and derived connectivity are read-only.
#[derive(Debug, Clone)]
pub struct Kitchen {
    level: Level,
    config: EnvConfig,
    connectivity: Connectivity,
    station_distances: StationDistances,
    generator: Option<OrderGenerator>,
    spawns: [Position; NUM_AGENTS],
    events: Vec<Event>,
    pub agents: [AgentState; NUM_AGENTS],
    pub pot: Pot,
    pub serving: ServingStation,
    pub orders: OrderBook,
    pub wall_items: HashMap<Position, Item>,
    pub step_count: u32,
    pub score: u32,
    /// Soups ladled out of the pot this episode, done or burnt.
    pub soups_collected: u32,
    pub handoffs_rewarded: u32,
}

impl Kitchen {
    /// Creates a kitchen for `level`. No orders exist until [`Kitchen::reset`] is called.
    pub fn new(level: Level, config: EnvConfig) -> Result<Self, KitchenError> {
        config.validate()?;
        let spawn1 = level
            .find_first(Tile::Spawn1)
            .ok_or(LevelError::MissingTile(Tile::Spawn1.to_char()))?;
        let spawn2 = level
            .find_first(Tile::Spawn2)
            .ok_or(LevelError::MissingTile(Tile::Spawn2.to_char()))?;
        let connectivity = Connectivity::build(&level);
        let station_distances = StationDistances::build(&level);

        Ok(Kitchen {
            level,
            config,
            connectivity,
            station_distances,
            generator: None,
            spawns: [spawn1, spawn2],
            events: Vec::new(),
            agents: [AgentState::spawn(spawn1), AgentState::spawn(spawn2)],
            pot: Pot::default(),
            serving: ServingStation::default(),
            orders: OrderBook::default(),
            wall_items: HashMap::new(),
            step_count: 0,
            score: 0,
            soups_collected: 0,
            handoffs_rewarded: 0,
        })
    }

    /// Builds a kitchen from a named preset.
    pub fn from_preset(name: &str, config: EnvConfig) -> Result<Self, KitchenError> {
        Self::new(Level::preset(name)?, config)
    }

    /// Starts a new episode.
    ///
    /// A given seed reseeds the order generator; without one the generator
    /// keeps its stream, falling back to OS entropy if it was never seeded.
    pub fn reset(&mut self, seed: Option<u64>) -> Observation {
        let generator = match (seed, self.generator.take()) {
            (Some(seed), _) => OrderGenerator::new(seed),
            (None, Some(generator)) => generator,
            (None, None) => OrderGenerator::from_entropy(),
        };
        let generator = self.generator.insert(generator);
        let orders = generator.generate(&self.config.orders);

        self.orders = OrderBook::new(orders);
        self.agents = [
            AgentState::spawn(self.spawns[0]),
            AgentState::spawn(self.spawns[1]),
        ];
        self.pot.reset();
        self.serving = ServingStation::default();
        self.wall_items.clear();
        self.events.clear();
        self.step_count = 0;
        self.score = 0;
        self.soups_collected = 0;
        self.handoffs_rewarded = 0;

        // Derived from the layout, rebuilt on every reset.
        self.connectivity = Connectivity::build(&self.level);
        self.station_distances = StationDistances::build(&self.level);

        tracing::debug!(seed = ?seed, orders = self.orders.len(), "Kitchen reset");
        self.observation()
    }

    /// Replaces the episode's orders, e.g. with a fixed schedule.
    pub fn set_orders(&mut self, orders: Vec<Order>) {
        self.orders = OrderBook::new(orders);
    }

    /// Steps with raw action codes. Unknown codes mean stay.
    pub fn step_indices(&mut self, action1: u8, action2: u8) -> StepResult {
        self.step(Action::from_index(action1), Action::from_index(action2))
    }

    /// Advances the simulation by one step with both agents' actions.
    pub fn step(&mut self, action1: Action, action2: Action) -> StepResult {
        self.events.clear();
        let mut reward = self.config.rewards.step_penalty;

        // Order lifecycle runs against the step count before it is incremented.
        let changes = self.orders.advance(self.step_count, self.config.order_time);
        for order in changes.activated {
            tracing::debug!(order, step = self.step_count, "Order activated");
            self.events.push(Event::OrderActivated { order });
        }
        for order in changes.failed {
            tracing::debug!(order, step = self.step_count, "Order failed");
            reward += self.config.rewards.order_failed;
            self.events.push(Event::OrderFailed { order });
        }

        self.step_count += 1;

        let actions = [action1, action2];
        self.resolve_movement(actions);

        for (agent, action) in actions.into_iter().enumerate() {
            if action == Action::Interact {
                reward += self.handle_interact(agent);
            }
        }

        match self.pot.tick(self.config.cook_time, self.config.burn_time) {
            Some(PotTransition::Cooked) => {
                tracing::debug!(recipe = ?self.pot.recipe, "Soup cooked");
                self.events.push(Event::PotCooked);
                if self.soups_collected < self.config.rewards.soup_reward_cap {
                    reward += self.shaping(self.config.rewards.soup_cooked);
                }
            }
            Some(PotTransition::Burnt) => {
                tracing::debug!(recipe = ?self.pot.recipe, "Soup burnt");
                self.events.push(Event::PotBurnt);
                reward += self.config.rewards.soup_burnt;
            }
            None => {}
        }

        self.serving.tick();

        let truncated = self.step_count >= self.config.max_steps;
        let done = self.orders.all_resolved() || truncated;
        let perfect = done
            && !self.orders.is_empty()
            && self.score as usize == self.orders.len()
            && self.orders.failed_count() == 0;
        if perfect {
            reward += self.config.rewards.perfect_bonus;
        }

        tracing::trace!(step = self.step_count, reward, done, "Step");

        let info = StepInfo {
            step: self.step_count,
            score: self.score,
            failed_orders: self.orders.failed_count(),
            completed_orders: self.orders.completed_count(),
            pending_orders: self.orders.pending_count(),
            unserved_active: self.orders.active_count(),
            truncated,
            perfect,
            events: std::mem::take(&mut self.events),
        };

        StepResult {
            observation: self.observation(),
            reward,
            done,
            info,
        }
    }

    /// Moves both agents. Movement actions turn the agent even when the move
    /// is blocked. Opposing moves into each other's cells swap the agents;
    /// otherwise agent 1 resolves against agent 2's old cell, then agent 2
    /// against agent 1's new cell.
    fn resolve_movement(&mut self, actions: [Action; NUM_AGENTS]) {
        let mut candidates = [None; NUM_AGENTS];
        for (agent, action) in actions.into_iter().enumerate() {
            if let Action::Move(direction) = action {
                self.agents[agent].direction = direction;
                candidates[agent] = Some(
                    self.level
                        .tiles()
                        .neighbor(self.agents[agent].position, direction),
                );
            }
        }

        let current = [self.agents[0].position, self.agents[1].position];
        if let [Some(Some(first)), Some(Some(second))] = candidates {
            if first == current[1] && second == current[0] {
                self.agents[0].position = first;
                self.agents[1].position = second;
                self.events.push(Event::Swapped);
                return;
            }
        }

        for agent in 0..NUM_AGENTS {
            let Some(candidate) = candidates[agent] else {
                continue;
            };
            let other = self.agents[1 - agent].position;
            match candidate {
                Some(target) if target == other => {
                    self.events.push(Event::Collision { agent });
                }
                Some(target) if self.level.is_walkable(target) => {
                    self.agents[agent].position = target;
                }
                _ => {}
            }
        }
    }

    /// Applies `agent`'s interaction with the tile it faces and returns the reward delta.
    pub fn handle_interact(&mut self, agent: AgentId) -> f32 {
        let AgentState {
            position,
            direction,
            ..
        } = self.agents[agent];
        let Some((tile, front)) = self.level.in_front(position, direction) else {
            return 0.0;
        };

        match tile {
            Tile::OnionDispenser => self.dispense(agent, Item::Onion),
            Tile::TomatoDispenser => self.dispense(agent, Item::Tomato),
            Tile::BowlRack => self.dispense(agent, Item::Bowl),
            Tile::Pot => self.interact_pot(agent),
            Tile::ServingStation => self.interact_serve(agent),
            Tile::Garbage => self.interact_garbage(agent),
            Tile::Counter => self.interact_counter(agent, front),
            Tile::Floor | Tile::Spawn1 | Tile::Spawn2 => 0.0,
        }
    }

    fn dispense(&mut self, agent: AgentId, item: Item) -> f32 {
        if self.agents[agent].holding.is_none() {
            self.agents[agent].holding = Some(item);
            self.events.push(Event::Dispensed { agent, item });
        }
        0.0
    }

    fn interact_pot(&mut self, agent: AgentId) -> f32 {
        let rewards = &self.config.rewards;
        let under_cap = self.soups_collected < rewards.soup_reward_cap;

        match self.agents[agent].holding {
            Some(Item::Bowl) => {
                let Some((state, recipe)) = self.pot.take_soup() else {
                    return 0.0;
                };
                let wanted = self.orders.wants(recipe);
                let reward = match state {
                    SoupState::Done if wanted && under_cap => self.shaping(rewards.soup_collected),
                    SoupState::Done if wanted => 0.0,
                    SoupState::Done => rewards.unwanted_soup_collected,
                    _ => rewards.burnt_soup_collected,
                };
                self.soups_collected += 1;
                self.agents[agent].holding = Some(Item::Soup { state, recipe });
                self.events.push(Event::SoupCollected {
                    agent,
                    state,
                    recipe,
                    wanted,
                });
                reward
            }
            Some(item) => {
                let Some(ingredient) = item.ingredient() else {
                    return 0.0;
                };
                match self.pot.add(ingredient, &self.orders, self.config.order_time) {
                    AddOutcome::Rejected(reason) => {
                        self.events.push(Event::PotAddRejected {
                            agent,
                            ingredient,
                            reason,
                        });
                        rewards.invalid_pot_add
                    }
                    AddOutcome::Added { started } => {
                        self.agents[agent].holding = None;
                        self.events.push(Event::IngredientAdded {
                            agent,
                            ingredient,
                            started,
                        });
                        if under_cap {
                            self.shaping(rewards.ingredient_added)
                        } else {
                            0.0
                        }
                    }
                }
            }
            None => 0.0,
        }
    }

    fn interact_serve(&mut self, agent: AgentId) -> f32 {
        let Some(Item::Soup { state, recipe }) = self.agents[agent].holding else {
            return 0.0;
        };
        self.agents[agent].holding = None;

        let rewards = &self.config.rewards;
        let candidate = match state {
            SoupState::Done => self.orders.serve_candidate(recipe),
            SoupState::Start | SoupState::Burnt => None,
        };

        if let Some(order) = candidate {
            let deadline = self
                .orders
                .get(order)
                .and_then(|o| o.deadline)
                .unwrap_or(self.step_count);
            let slack = deadline.saturating_sub(self.step_count) as f32
                / self.config.order_time as f32;
            let reward = rewards.serve_base + rewards.serve_time_bonus * slack.clamp(0.0, 1.0);

            self.orders.serve(order);
            self.score += 1;
            self.serving
                .show(ServeDisplay::Served(recipe), self.config.serve_display_ticks);
            tracing::debug!(order, recipe = recipe.name(), reward, "Order served");
            self.events.push(Event::Served {
                agent,
                recipe,
                order,
                reward,
            });
            return reward;
        }

        self.serving
            .show(ServeDisplay::Rejected, self.config.serve_display_ticks);
        self.events.push(Event::ServeRejected {
            agent,
            state,
            recipe,
        });
        match state {
            SoupState::Done => rewards.wrong_serve,
            SoupState::Start | SoupState::Burnt => rewards.bad_soup_serve,
        }
    }

    fn interact_garbage(&mut self, agent: AgentId) -> f32 {
        match self.agents[agent].holding.take() {
            Some(item) => {
                self.events.push(Event::Discarded { agent, item });
                self.config.rewards.garbage
            }
            None => 0.0,
        }
    }

    fn interact_counter(&mut self, agent: AgentId, counter: Position) -> f32 {
        match (self.agents[agent].holding, self.wall_items.get(&counter).copied()) {
            (None, Some(item)) => {
                self.wall_items.remove(&counter);
                self.agents[agent].holding = Some(item);
                self.events.push(Event::ItemPickedUp {
                    agent,
                    item,
                    position: counter,
                });
                0.0
            }
            (Some(item), None) => {
                self.wall_items.insert(counter, item);
                self.agents[agent].holding = None;
                let handoff = self.connectivity.is_handoff_counter(counter);
                self.events.push(Event::ItemPlaced {
                    agent,
                    item,
                    position: counter,
                    handoff,
                });
                if handoff
                    && item.is_done_soup()
                    && self.handoffs_rewarded < self.config.rewards.handoff_reward_cap
                {
                    self.handoffs_rewarded += 1;
                    self.shaping(self.config.rewards.handoff)
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }

    /// Shaping terms are dropped in sparse mode.
    fn shaping(&self, value: f32) -> f32 {
        if self.config.shaped() { value } else { 0.0 }
    }

    /// Raw observation: each agent sees itself first.
    pub fn observation(&self) -> Observation {
        let view = |me: usize| {
            let (own, other) = (&self.agents[me], &self.agents[1 - me]);
            AgentView {
                self_pos: own.position,
                other_pos: other.position,
                self_dir: own.direction,
                other_dir: other.direction,
                self_holding: own.holding,
                other_holding: other.holding,
            }
        };
        Observation {
            agents: [view(0), view(1)],
        }
    }

    /// The tile an agent at `position` facing `direction` would interact with.
    pub fn tile_in_front(&self, position: Position, direction: Direction) -> Option<(Tile, Position)> {
        self.level.in_front(position, direction)
    }

    pub fn level(&self) -> &Level {
        &self.level
    }

    pub fn config(&self) -> &EnvConfig {
        &self.config
    }

    pub fn connectivity(&self) -> &Connectivity {
        &self.connectivity
    }

    pub fn station_distances(&self) -> &StationDistances {
        &self.station_distances
    }

    pub fn spawns(&self) -> [Position; NUM_AGENTS] {
        self.spawns
    }

    /// Seed of the current order stream, if it was seeded explicitly.
    pub fn seed(&self) -> Option<u64> {
        self.generator.as_ref().and_then(OrderGenerator::seed)
    }
}
