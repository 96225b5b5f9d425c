use std::collections::{HashMap, HashSet, VecDeque};

use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::{
    Action, AgentId, Direction, Ingredient, Item, Position, SoupState,
    environment::Kitchen,
    level::Tile,
    pot::PotState,
};

/// Trait defining the behavior of a baseline controller.
/// A policy picks one agent's action from the kitchen state after the previous step.
pub trait Policy {
    /// Short name used in logs and reports.
    fn name(&self) -> &'static str;

    /// Determines the action `agent` takes next.
    /// `&mut self` allows the policy to keep internal state (e.g. an RNG or stuck counter).
    fn act(&mut self, kitchen: &Kitchen, agent: AgentId) -> Action;
}

/// Picks uniformly among the six actions.
#[derive(Debug)]
pub struct RandomPolicy {
    rng: StdRng,
}

impl RandomPolicy {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }
}

impl Policy for RandomPolicy {
    fn name(&self) -> &'static str {
        "random"
    }

    fn act(&mut self, _kitchen: &Kitchen, _agent: AgentId) -> Action {
        Action::from_index(self.rng.random_range(0..Action::COUNT as u8))
    }
}

/// Move attempts without progress before the chef sidesteps randomly.
const STUCK_LIMIT: u32 = 3;

/// A scripted cook that plans one goal at a time.
///
/// Each step it ranks goals by what it holds, the pot state and the orders,
/// then walks the shortest path to a cell next to the first reachable goal,
/// turns to face it and interacts. Items it cannot take further itself are
/// left on handoff counters for its partner.
#[derive(Debug)]
pub struct PlanningChef {
    rng: StdRng,
    last_position: Option<Position>,
    stuck_moves: u32,
}

impl PlanningChef {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            last_position: None,
            stuck_moves: 0,
        }
    }

    /// Candidate target tiles in priority order.
    fn goals(&self, kitchen: &Kitchen, agent: AgentId) -> Vec<Vec<Position>> {
        let mut goals = Vec::new();
        let other = kitchen.agents[1 - agent].holding;

        match kitchen.agents[agent].holding {
            Some(Item::Soup {
                state: SoupState::Done,
                ..
            }) => {
                goals.push(stations(kitchen, Tile::ServingStation));
                goals.push(empty_handoffs(kitchen));
            }
            Some(Item::Soup { .. }) => goals.push(stations(kitchen, Tile::Garbage)),
            Some(Item::Bowl) => {
                goals.push(stations(kitchen, Tile::Pot));
                goals.push(empty_handoffs(kitchen));
            }
            Some(item) => {
                if item.ingredient().is_some_and(|i| pot_accepts(kitchen, i)) {
                    goals.push(stations(kitchen, Tile::Pot));
                    goals.push(empty_handoffs(kitchen));
                } else {
                    goals.push(stations(kitchen, Tile::Garbage));
                    goals.push(empty_handoffs(kitchen));
                }
            }
            None => {
                let useful: Vec<Position> = kitchen
                    .wall_items
                    .iter()
                    .filter(|(_, item)| useful_for(kitchen, agent, **item))
                    .map(|(position, _)| *position)
                    .collect();
                goals.push(useful);

                match kitchen.pot.state {
                    PotState::Idle => {
                        for ingredient in wanted_ingredients(kitchen) {
                            let item = Item::from(ingredient);
                            if other != Some(item) && !on_counter(kitchen, item) {
                                goals.push(stations(kitchen, dispenser(ingredient)));
                            }
                        }
                    }
                    PotState::Start | PotState::Done | PotState::Burnt => {
                        if other != Some(Item::Bowl) && !on_counter(kitchen, Item::Bowl) {
                            goals.push(stations(kitchen, Tile::BowlRack));
                        }
                    }
                }
            }
        }
        goals
    }

    fn sidestep(&mut self) -> Action {
        let index = self.rng.random_range(0..Direction::ALL.len());
        Action::Move(Direction::ALL[index])
    }
}

impl Policy for PlanningChef {
    fn name(&self) -> &'static str {
        "chef"
    }

    fn act(&mut self, kitchen: &Kitchen, agent: AgentId) -> Action {
        let position = kitchen.agents[agent].position;

        let action = self
            .goals(kitchen, agent)
            .iter()
            .find_map(|targets| approach(kitchen, agent, targets))
            .unwrap_or(Action::Stay);

        if let Action::Move(_) = action {
            if self.last_position == Some(position) {
                self.stuck_moves += 1;
            } else {
                self.stuck_moves = 0;
            }
        } else {
            self.stuck_moves = 0;
        }
        self.last_position = Some(position);

        if self.stuck_moves >= STUCK_LIMIT {
            self.stuck_moves = 0;
            return self.sidestep();
        }
        action
    }
}

fn dispenser(ingredient: Ingredient) -> Tile {
    match ingredient {
        Ingredient::Onion => Tile::OnionDispenser,
        Ingredient::Tomato => Tile::TomatoDispenser,
    }
}

fn stations(kitchen: &Kitchen, tile: Tile) -> Vec<Position> {
    kitchen
        .level()
        .tiles()
        .enumerate()
        .filter(|(_, t)| **t == tile)
        .map(|(position, _)| position)
        .collect()
}

fn empty_handoffs(kitchen: &Kitchen) -> Vec<Position> {
    let mut counters: Vec<Position> = kitchen
        .connectivity()
        .handoff_counters()
        .iter()
        .filter(|position| !kitchen.wall_items.contains_key(*position))
        .copied()
        .collect();
    counters.sort();
    counters
}

fn on_counter(kitchen: &Kitchen, item: Item) -> bool {
    kitchen.wall_items.values().any(|placed| *placed == item)
}

/// True iff some station of this kind borders the agent's component.
fn can_reach(kitchen: &Kitchen, agent: AgentId, tile: Tile) -> bool {
    let connectivity = kitchen.connectivity();
    let Some(component) = connectivity.component_id(kitchen.agents[agent].position) else {
        return false;
    };
    stations(kitchen, tile)
        .into_iter()
        .any(|station| connectivity.wall_accessible_from(component, station))
}

/// Whether the pot would take `ingredient` right now.
fn pot_accepts(kitchen: &Kitchen, ingredient: Ingredient) -> bool {
    let pot = &kitchen.pot;
    if pot.state != PotState::Idle {
        return false;
    }
    let (onions, tomatoes) = match ingredient {
        Ingredient::Onion if pot.onions == 0 => (1, pot.tomatoes),
        Ingredient::Tomato if pot.tomatoes == 0 => (pot.onions, 1),
        _ => return false,
    };
    kitchen
        .orders
        .select_target(onions, tomatoes, kitchen.config().order_time)
        .is_some()
}

/// Ingredients still missing for the pot's target, or for the order the
/// pot would pick next when it is empty. Only cooks while an order is active.
fn wanted_ingredients(kitchen: &Kitchen) -> Vec<Ingredient> {
    let pot = &kitchen.pot;
    if pot.state != PotState::Idle || kitchen.orders.active_count() == 0 {
        return Vec::new();
    }
    let target = pot.target.or_else(|| {
        kitchen
            .orders
            .select_target(pot.onions, pot.tomatoes, kitchen.config().order_time)
            .map(|choice| (choice.onions, choice.tomatoes))
    });
    let Some((onions, tomatoes)) = target else {
        return Vec::new();
    };

    let mut wanted = Vec::new();
    if onions > pot.onions {
        wanted.push(Ingredient::Onion);
    }
    if tomatoes > pot.tomatoes {
        wanted.push(Ingredient::Tomato);
    }
    wanted
}

/// Whether picking `item` off a counter moves the team forward for this agent.
fn useful_for(kitchen: &Kitchen, agent: AgentId, item: Item) -> bool {
    match item {
        Item::Soup {
            state: SoupState::Done,
            ..
        } => can_reach(kitchen, agent, Tile::ServingStation),
        Item::Soup { .. } => false,
        Item::Bowl => kitchen.pot.state != PotState::Idle && can_reach(kitchen, agent, Tile::Pot),
        Item::Onion | Item::Tomato => {
            item.ingredient().is_some_and(|i| pot_accepts(kitchen, i))
                && can_reach(kitchen, agent, Tile::Pot)
        }
    }
}

fn direction_between(from: Position, to: Position) -> Option<Direction> {
    Direction::ALL
        .into_iter()
        .find(|direction| from.step(*direction) == Some(to))
}

/// First action towards interacting with the nearest of `targets`.
///
/// Breadth-first search over walkable cells, treating the partner's cell as
/// blocked. Returns `None` when no cell next to a target is reachable.
fn approach(kitchen: &Kitchen, agent: AgentId, targets: &[Position]) -> Option<Action> {
    if targets.is_empty() {
        return None;
    }
    let level = kitchen.level();
    let tiles = level.tiles();
    let start = kitchen.agents[agent].position;
    let blocked = kitchen.agents[1 - agent].position;

    let mut came_from: HashMap<Position, Position> = HashMap::new();
    let mut visited = HashSet::from([start]);
    let mut frontier = VecDeque::from([start]);

    while let Some(current) = frontier.pop_front() {
        let facing = Direction::ALL.into_iter().find(|direction| {
            tiles
                .neighbor(current, *direction)
                .is_some_and(|neighbor| targets.contains(&neighbor))
        });

        if let Some(direction) = facing {
            if current == start {
                return Some(if kitchen.agents[agent].direction == direction {
                    Action::Interact
                } else {
                    Action::Move(direction)
                });
            }
            // Walk back to the first hop.
            let mut hop = current;
            while let Some(&previous) = came_from.get(&hop) {
                if previous == start {
                    break;
                }
                hop = previous;
            }
            return direction_between(start, hop).map(Action::Move);
        }

        for next in tiles.neighbors4(current) {
            if next == blocked || !level.is_walkable(next) || !visited.insert(next) {
                continue;
            }
            came_from.insert(next, current);
            frontier.push_back(next);
        }
    }
    None
}
