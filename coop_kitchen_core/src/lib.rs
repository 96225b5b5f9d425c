use serde::{Deserialize, Serialize};

pub mod config;
pub mod connectivity;
pub mod environment;
pub mod features;
pub mod generator;
pub mod level;
pub mod map;
pub mod order;
pub mod policy;
pub mod pot;
pub mod stats;

/// Index of an agent in the kitchen (0 or 1).
pub type AgentId = usize;

/// Number of agents in every kitchen.
pub const NUM_AGENTS: usize = 2;

/// Represents a 2D coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub x: usize,
    pub y: usize,
}

impl Position {
    pub const fn new(x: usize, y: usize) -> Self {
        Position { x, y }
    }

    /// Returns the position one step along `direction`, or `None` if that
    /// would leave the non-negative quadrant. Upper bounds are checked by the grid.
    pub fn step(self, direction: Direction) -> Option<Position> {
        let (dx, dy) = direction.delta();
        Some(Position {
            x: self.x.checked_add_signed(dx)?,
            y: self.y.checked_add_signed(dy)?,
        })
    }
}

/// Facing direction of an agent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    #[default]
    Up,
    Down,
    Left,
    Right,
}

impl Direction {
    pub const ALL: [Direction; 4] = [
        Direction::Up,
        Direction::Down,
        Direction::Left,
        Direction::Right,
    ];

    /// Unit vector of the direction, with y growing downwards.
    pub fn delta(self) -> (isize, isize) {
        match self {
            Direction::Up => (0, -1),
            Direction::Down => (0, 1),
            Direction::Left => (-1, 0),
            Direction::Right => (1, 0),
        }
    }
}

/// Discrete action an agent takes in one step.
///
/// The numeric codes are the ones external learners use: `0` stay, `1` up,
/// `2` down, `3` left, `4` right, `5` interact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    Stay,
    Move(Direction),
    Interact,
}

impl Action {
    pub const COUNT: usize = 6;

    /// Decodes an action code. Unrecognised codes are treated as `Stay`.
    pub fn from_index(index: u8) -> Action {
        match index {
            1 => Action::Move(Direction::Up),
            2 => Action::Move(Direction::Down),
            3 => Action::Move(Direction::Left),
            4 => Action::Move(Direction::Right),
            5 => Action::Interact,
            _ => Action::Stay,
        }
    }

    pub fn index(self) -> u8 {
        match self {
            Action::Stay => 0,
            Action::Move(Direction::Up) => 1,
            Action::Move(Direction::Down) => 2,
            Action::Move(Direction::Left) => 3,
            Action::Move(Direction::Right) => 4,
            Action::Interact => 5,
        }
    }
}

/// Raw soup ingredients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Ingredient {
    Onion,
    Tomato,
}

/// A named combination of ingredient counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Recipe {
    OnionSoup,
    TomatoSoup,
    OnionTomatoSoup,
}

impl Recipe {
    pub const ALL: [Recipe; 3] = [Recipe::OnionSoup, Recipe::TomatoSoup, Recipe::OnionTomatoSoup];

    /// Required `(onions, tomatoes)` for the recipe.
    pub fn counts(self) -> (u8, u8) {
        match self {
            Recipe::OnionSoup => (1, 0),
            Recipe::TomatoSoup => (0, 1),
            Recipe::OnionTomatoSoup => (1, 1),
        }
    }

    /// Finds the recipe made of exactly these counts.
    pub fn from_counts(onions: u8, tomatoes: u8) -> Option<Recipe> {
        Recipe::ALL
            .into_iter()
            .find(|recipe| recipe.counts() == (onions, tomatoes))
    }

    pub fn name(self) -> &'static str {
        match self {
            Recipe::OnionSoup => "onion-soup",
            Recipe::TomatoSoup => "tomato-soup",
            Recipe::OnionTomatoSoup => "onion-tomato-soup",
        }
    }
}

/// Cooking state of a soup taken out of the pot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoupState {
    Start,
    Done,
    Burnt,
}

/// Represents items an agent can hold or leave on a counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Item {
    Onion,
    Tomato,
    Bowl,
    Soup { state: SoupState, recipe: Recipe },
}

impl Item {
    pub fn ingredient(self) -> Option<Ingredient> {
        match self {
            Item::Onion => Some(Ingredient::Onion),
            Item::Tomato => Some(Ingredient::Tomato),
            _ => None,
        }
    }

    pub fn is_done_soup(self) -> bool {
        matches!(
            self,
            Item::Soup {
                state: SoupState::Done,
                ..
            }
        )
    }
}

impl From<Ingredient> for Item {
    fn from(ingredient: Ingredient) -> Self {
        match ingredient {
            Ingredient::Onion => Item::Onion,
            Ingredient::Tomato => Item::Tomato,
        }
    }
}

impl std::fmt::Display for Item {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Item::Onion => f.write_str("onion"),
            Item::Tomato => f.write_str("tomato"),
            Item::Bowl => f.write_str("bowl"),
            Item::Soup { state, recipe } => {
                let state = match state {
                    SoupState::Start => "start",
                    SoupState::Done => "done",
                    SoupState::Burnt => "burnt",
                };
                write!(f, "bowl-{}-{}", state, recipe.name())
            }
        }
    }
}
