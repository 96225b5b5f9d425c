//! Feature derivation - converts kitchen state to normalised feature frames

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::{
    AgentId, Direction, Item, Position, SoupState,
    connectivity::DISTANCE_STATIONS,
    environment::Kitchen,
    level::Tile,
    order::Order,
    pot::PotState,
};

/// Number of features in one frame.
pub const FRAME_SIZE: usize = 74;

/// Counts on handoff counters are divided by this and clamped.
const HANDOFF_COUNT_SCALE: f32 = 5.0;

/// Teammate slots of a decentralised frame hold this value.
pub const MASKED: f32 = -1.0;

/// Whose point of view a frame is encoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Perspective {
    /// Agent 1 as "self". Used for the centralised joint-action learner.
    Agent1,
    Agent2,
    /// One agent's own view: everything describing the teammate is [`MASKED`].
    Decentralised(AgentId),
}

impl Perspective {
    pub fn agent(self) -> AgentId {
        match self {
            Perspective::Agent1 => 0,
            Perspective::Agent2 => 1,
            Perspective::Decentralised(agent) => agent,
        }
    }

    /// True if teammate information is hidden.
    pub fn is_masked(self) -> bool {
        matches!(self, Perspective::Decentralised(_))
    }
}

/// Derives the normalised feature frames learners consume.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    /// Encodes one frame of [`FRAME_SIZE`] values, in `[0, 1]` apart from
    /// masked teammate slots.
    ///
    /// Layout: directions (4), holdings (6 + 6), front tiles (10 + 10), station
    /// distance and reachability (24), pot state (4), pot contents (2), pot timer
    /// (1), target order (3), handoff counter summary (4).
    pub fn encode(kitchen: &Kitchen, perspective: Perspective) -> Vec<f32> {
        let me = perspective.agent();
        let masked = perspective.is_masked();
        let own = &kitchen.agents[me];
        let other = &kitchen.agents[1 - me];
        let config = kitchen.config();

        let mut frame = Vec::with_capacity(FRAME_SIZE);

        push_direction(&mut frame, own.direction);
        if masked {
            frame.extend([MASKED; 2]);
        } else {
            push_direction(&mut frame, other.direction);
        }

        frame.extend(holding_one_hot(own.holding));
        if masked {
            frame.extend([MASKED; 6]);
        } else {
            frame.extend(holding_one_hot(other.holding));
        }

        frame.extend(front_features(kitchen, own.position, own.direction));
        if masked {
            frame.extend([MASKED; 10]);
        } else {
            frame.extend(front_features(kitchen, other.position, other.direction));
        }

        let distances = kitchen.station_distances();
        for station in DISTANCE_STATIONS {
            let (distance, reach) = distances.distance_and_reach(own.position, station);
            frame.extend([distance, reach]);
            if masked {
                frame.extend([MASKED; 2]);
            } else {
                let (distance, reach) = distances.distance_and_reach(other.position, station);
                frame.extend([distance, reach]);
            }
        }

        let mut pot_one_hot = [0.0; 4];
        pot_one_hot[match kitchen.pot.state {
            PotState::Idle => 0,
            PotState::Start => 1,
            PotState::Done => 2,
            PotState::Burnt => 3,
        }] = 1.0;
        frame.extend(pot_one_hot);
        frame.push(kitchen.pot.onions as f32);
        frame.push(kitchen.pot.tomatoes as f32);
        frame.push((kitchen.pot.timer as f32 / config.burn_time as f32).clamp(0.0, 1.0));

        frame.extend(target_order_features(kitchen));
        if masked {
            frame.extend([MASKED; 4]);
        } else {
            frame.extend(handoff_summary(kitchen));
        }

        debug_assert_eq!(frame.len(), FRAME_SIZE);
        frame
    }
}

fn push_direction(frame: &mut Vec<f32>, direction: Direction) {
    let (dx, dy) = direction.delta();
    frame.push((dx as f32 + 1.0) / 2.0);
    frame.push((dy as f32 + 1.0) / 2.0);
}

/// One-hot over none, onion, tomato, bowl, done soup, burnt soup.
/// An undercooked soup encodes as none.
fn holding_one_hot(holding: Option<Item>) -> [f32; 6] {
    let mut one_hot = [0.0; 6];
    let slot = match holding {
        Some(Item::Onion) => 1,
        Some(Item::Tomato) => 2,
        Some(Item::Bowl) => 3,
        Some(Item::Soup {
            state: SoupState::Done,
            ..
        }) => 4,
        Some(Item::Soup {
            state: SoupState::Burnt,
            ..
        }) => 5,
        None
        | Some(Item::Soup {
            state: SoupState::Start,
            ..
        }) => 0,
    };
    one_hot[slot] = 1.0;
    one_hot
}

fn item_code(item: Item) -> f32 {
    match item {
        Item::Onion => 0.2,
        Item::Tomato => 0.4,
        Item::Bowl => 0.6,
        Item::Soup { .. } => 0.8,
    }
}

/// Station flags for the faced tile, then counter details.
fn front_features(kitchen: &Kitchen, position: Position, direction: Direction) -> [f32; 10] {
    let mut features = [0.0; 10];
    let Some((tile, front)) = kitchen.tile_in_front(position, direction) else {
        return features;
    };

    let flag = match tile {
        Tile::Pot => Some(0),
        Tile::BowlRack => Some(1),
        Tile::ServingStation => Some(2),
        Tile::Garbage => Some(3),
        Tile::OnionDispenser => Some(4),
        Tile::TomatoDispenser => Some(5),
        Tile::Counter => Some(6),
        Tile::Floor | Tile::Spawn1 | Tile::Spawn2 => None,
    };
    if let Some(index) = flag {
        features[index] = 1.0;
    }

    if tile == Tile::Counter {
        if kitchen.connectivity().is_handoff_counter(front) {
            features[8] = 1.0;
        }
        if let Some(item) = kitchen.wall_items.get(&front) {
            features[7] = 1.0;
            features[9] = item_code(*item);
        }
    }
    features
}

/// Time left, onions and tomatoes of the order the team should work on:
/// the active order due first, else the next pending one.
fn target_order_features(kitchen: &Kitchen) -> [f32; 3] {
    let order_time = kitchen.config().order_time as f32;
    let step = kitchen.step_count;

    let target: Option<&Order> = kitchen
        .orders
        .active()
        .min_by_key(|order| order.deadline.unwrap_or(u32::MAX))
        .or_else(|| kitchen.orders.pending().next());

    let Some(order) = target else {
        return [0.0; 3];
    };
    let until = order.deadline.unwrap_or(order.start);
    let time_left = (until as f32 - step as f32) / order_time;
    [
        time_left.clamp(0.0, 1.0),
        order.onions() as f32,
        order.tomatoes() as f32,
    ]
}

/// Onions, tomatoes, bowls and done soups waiting on handoff counters.
fn handoff_summary(kitchen: &Kitchen) -> [f32; 4] {
    let mut counts = [0u32; 4];
    for (position, item) in &kitchen.wall_items {
        if !kitchen.connectivity().is_handoff_counter(*position) {
            continue;
        }
        match item {
            Item::Onion => counts[0] += 1,
            Item::Tomato => counts[1] += 1,
            Item::Bowl => counts[2] += 1,
            Item::Soup {
                state: SoupState::Done,
                ..
            } => counts[3] += 1,
            Item::Soup { .. } => {}
        }
    }
    counts.map(|count| (count as f32 / HANDOFF_COUNT_SCALE).clamp(0.0, 1.0))
}

/// Keeps the most recent frames for stacked observations.
#[derive(Debug, Clone)]
pub struct FrameStack {
    frames: VecDeque<Vec<f32>>,
    depth: usize,
}

impl FrameStack {
    /// # Panics
    ///
    /// Panics if `depth` is zero.
    pub fn new(depth: usize) -> Self {
        assert!(depth > 0, "frame stack depth must be positive");
        FrameStack {
            frames: VecDeque::with_capacity(depth),
            depth,
        }
    }

    /// Clears history, pads with zero frames and pushes `frame` last.
    pub fn reset(&mut self, frame: Vec<f32>) {
        self.frames.clear();
        for _ in 1..self.depth {
            self.frames.push_back(vec![0.0; frame.len()]);
        }
        self.frames.push_back(frame);
    }

    pub fn push(&mut self, frame: Vec<f32>) {
        if self.frames.len() == self.depth {
            self.frames.pop_front();
        }
        self.frames.push_back(frame);
    }

    /// Frames concatenated oldest first.
    pub fn stacked(&self) -> Vec<f32> {
        self.frames.iter().flatten().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Recipe, config::EnvConfig};

    fn kitchen() -> Kitchen {
        let mut kitchen = Kitchen::from_preset("level_3", EnvConfig::default()).unwrap();
        kitchen.reset(Some(42));
        kitchen
    }

    #[test]
    fn frame_shape_and_range() {
        let kitchen = kitchen();
        for perspective in [Perspective::Agent1, Perspective::Agent2] {
            let frame = FeatureEncoder::encode(&kitchen, perspective);
            assert_eq!(frame.len(), FRAME_SIZE);
            assert!(frame.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    /// Indices of every teammate slot in a frame.
    fn teammate_slots() -> Vec<usize> {
        let mut slots: Vec<usize> = (2..4).chain(10..16).chain(26..36).collect();
        for station in 0..DISTANCE_STATIONS.len() {
            slots.extend([36 + station * 4 + 2, 36 + station * 4 + 3]);
        }
        slots.extend(70..74);
        slots
    }

    #[test]
    fn decentralised_view_masks_the_teammate() {
        let mut kitchen = Kitchen::from_preset("level_2", EnvConfig::default()).unwrap();
        kitchen.reset(Some(5));
        kitchen.agents[0].holding = Some(Item::Onion);
        kitchen.wall_items.insert(Position::new(5, 2), Item::Bowl);

        let hidden = teammate_slots();
        assert_eq!(hidden.len(), 34);

        for agent in 0..2 {
            let full = FeatureEncoder::encode(
                &kitchen,
                if agent == 0 { Perspective::Agent1 } else { Perspective::Agent2 },
            );
            let masked = FeatureEncoder::encode(&kitchen, Perspective::Decentralised(agent));
            assert_eq!(masked.len(), FRAME_SIZE);
            for (index, (value, seen)) in masked.iter().zip(&full).enumerate() {
                if hidden.contains(&index) {
                    assert_eq!(*value, MASKED, "slot {index} should be masked");
                } else {
                    assert_eq!(value, seen, "slot {index} should match the full view");
                    assert!((0.0..=1.0).contains(value));
                }
            }
        }

        // Own holding stays visible, the partner's onion does not leak.
        let frame = FeatureEncoder::encode(&kitchen, Perspective::Decentralised(1));
        assert_eq!(frame[4], 1.0);
        assert!(frame[10..16].iter().all(|v| *v == MASKED));
    }

    #[test]
    fn holding_slots() {
        let mut kitchen = kitchen();
        let cases = [
            (None, 0),
            (Some(Item::Onion), 1),
            (Some(Item::Tomato), 2),
            (Some(Item::Bowl), 3),
            (
                Some(Item::Soup {
                    state: SoupState::Done,
                    recipe: Recipe::OnionSoup,
                }),
                4,
            ),
            (
                Some(Item::Soup {
                    state: SoupState::Burnt,
                    recipe: Recipe::TomatoSoup,
                }),
                5,
            ),
        ];
        for (holding, slot) in cases {
            kitchen.agents[0].holding = holding;
            let frame = FeatureEncoder::encode(&kitchen, Perspective::Agent1);
            let one_hot = &frame[4..10];
            assert_eq!(one_hot[slot], 1.0);
            assert_eq!(one_hot.iter().sum::<f32>(), 1.0);
            // seen as the partner from agent 2's side
            let frame = FeatureEncoder::encode(&kitchen, Perspective::Agent2);
            assert_eq!(frame[10 + slot], 1.0);
        }
    }

    #[test]
    fn pot_state_slots() {
        let mut kitchen = kitchen();
        for (state, slot) in [
            (PotState::Idle, 0),
            (PotState::Start, 1),
            (PotState::Done, 2),
            (PotState::Burnt, 3),
        ] {
            kitchen.pot.state = state;
            let frame = FeatureEncoder::encode(&kitchen, Perspective::Agent1);
            assert_eq!(frame[60 + slot], 1.0);
            assert_eq!(frame[60..64].iter().sum::<f32>(), 1.0);
        }
    }

    #[test]
    fn front_tile_flags() {
        let mut kitchen = kitchen();
        let cases = [
            (Position::new(5, 2), Direction::Down, 0),
            (Position::new(5, 6), Direction::Down, 3),
            (Position::new(1, 1), Direction::Left, 4),
        ];
        for (position, direction, flag) in cases {
            kitchen.agents[0].position = position;
            kitchen.agents[0].direction = direction;
            let frame = FeatureEncoder::encode(&kitchen, Perspective::Agent1);
            assert_eq!(frame[16 + flag], 1.0, "{position:?} {direction:?}");
        }
    }

    #[test]
    fn counter_item_code() {
        let mut kitchen = kitchen();
        kitchen.agents[0].position = Position::new(1, 2);
        kitchen.agents[0].direction = Direction::Left;
        kitchen.wall_items.insert(Position::new(0, 2), Item::Bowl);
        let frame = FeatureEncoder::encode(&kitchen, Perspective::Agent1);
        let front = &frame[16..26];
        assert_eq!(front[6], 1.0);
        assert_eq!(front[7], 1.0);
        assert_eq!(front[8], 0.0);
        assert!((front[9] - 0.6).abs() < 1e-6);
    }

    #[test]
    fn target_order_info() {
        let mut kitchen = kitchen();
        kitchen.set_orders(vec![Order::active(Recipe::OnionTomatoSoup, 0, 600)]);
        kitchen.step_count = 0;
        let frame = FeatureEncoder::encode(&kitchen, Perspective::Agent1);
        let info = &frame[67..70];
        assert!((0.0..=1.0).contains(&info[0]));
        assert_eq!(info[1], 1.0);
        assert_eq!(info[2], 1.0);
    }

    #[test]
    fn handoff_summary_counts_only_handoffs() {
        let mut kitchen = Kitchen::from_preset("level_2", EnvConfig::default()).unwrap();
        kitchen.reset(Some(1));
        kitchen.wall_items.insert(Position::new(5, 1), Item::Onion);
        kitchen.wall_items.insert(Position::new(5, 2), Item::Onion);
        kitchen.wall_items.insert(Position::new(0, 1), Item::Onion);
        kitchen.wall_items.insert(
            Position::new(5, 3),
            Item::Soup {
                state: SoupState::Done,
                recipe: Recipe::OnionSoup,
            },
        );
        let frame = FeatureEncoder::encode(&kitchen, Perspective::Agent1);
        let summary = &frame[70..74];
        assert!((summary[0] - 0.4).abs() < 1e-6);
        assert_eq!(summary[1], 0.0);
        assert_eq!(summary[2], 0.0);
        assert!((summary[3] - 0.2).abs() < 1e-6);
    }

    #[test]
    fn frame_stack_pads_and_rolls() {
        let mut stack = FrameStack::new(3);
        stack.reset(vec![1.0, 1.0]);
        assert_eq!(stack.stacked(), vec![0.0, 0.0, 0.0, 0.0, 1.0, 1.0]);
        stack.push(vec![2.0, 2.0]);
        stack.push(vec![3.0, 3.0]);
        assert_eq!(stack.stacked(), vec![1.0, 1.0, 2.0, 2.0, 3.0, 3.0]);
        stack.push(vec![4.0, 4.0]);
        assert_eq!(stack.stacked().len(), 6);
        assert_eq!(stack.stacked()[..2], [2.0, 2.0]);
    }
}
