use serde::{Deserialize, Serialize};

use crate::{Ingredient, Recipe, SoupState, order::OrderBook};

/// Cooking state of the pot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum PotState {
    #[default]
    Idle,
    Start,
    Done,
    Burnt,
}

/// Why an ingredient was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RejectReason {
    /// The pot is cooking or holds a finished soup.
    NotIdle,
    /// At most one of each ingredient fits.
    Duplicate,
    /// No active or pending order can use the resulting contents.
    Useless,
}

/// Result of offering an ingredient to the pot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    Rejected(RejectReason),
    Added {
        /// Contents matched the target order exactly and cooking began.
        started: bool,
    },
}

/// Timer driven state change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PotTransition {
    Cooked,
    Burnt,
}

/// The kitchen's single cooking pot.
///
/// The timer counts every tick since cooking began and is not reset when
/// the soup is done, so `burn_time` bounds the total of both phases.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pot {
    pub state: PotState,
    pub onions: u8,
    pub tomatoes: u8,
    pub timer: u32,
    /// Composition of the order the contents are aimed at.
    pub target: Option<(u8, u8)>,
    /// Recipe being cooked, set when cooking begins.
    pub recipe: Option<Recipe>,
}

impl Pot {
    pub fn reset(&mut self) {
        *self = Pot::default();
    }

    pub fn is_empty(&self) -> bool {
        self.onions == 0 && self.tomatoes == 0
    }

    /// Offers an ingredient. On success the contents grow by one, a target is
    /// chosen from `orders`, and cooking starts if the target is complete.
    ///
    /// A partial pot that no order can finish any more is emptied when the
    /// offered ingredient is refused as useless, so it can be refilled.
    pub fn add(&mut self, ingredient: Ingredient, orders: &OrderBook, order_time: u32) -> AddOutcome {
        if self.state != PotState::Idle {
            return AddOutcome::Rejected(RejectReason::NotIdle);
        }

        let (onions, tomatoes) = match ingredient {
            Ingredient::Onion if self.onions >= 1 => {
                return AddOutcome::Rejected(RejectReason::Duplicate);
            }
            Ingredient::Tomato if self.tomatoes >= 1 => {
                return AddOutcome::Rejected(RejectReason::Duplicate);
            }
            Ingredient::Onion => (self.onions + 1, self.tomatoes),
            Ingredient::Tomato => (self.onions, self.tomatoes + 1),
        };

        let Some(choice) = orders.select_target(onions, tomatoes, order_time) else {
            if !self.is_empty() {
                tracing::debug!(
                    onions = self.onions,
                    tomatoes = self.tomatoes,
                    "Discarding stale pot contents"
                );
                self.reset();
            }
            return AddOutcome::Rejected(RejectReason::Useless);
        };

        self.onions = onions;
        self.tomatoes = tomatoes;
        self.target = Some((choice.onions, choice.tomatoes));

        if choice.exact {
            self.state = PotState::Start;
            self.timer = 0;
            self.recipe = Recipe::from_counts(onions, tomatoes);
            tracing::debug!(recipe = ?self.recipe, "Pot started cooking");
        }
        AddOutcome::Added {
            started: choice.exact,
        }
    }

    /// Advances the timer while cooking and applies threshold transitions.
    pub fn tick(&mut self, cook_time: u32, burn_time: u32) -> Option<PotTransition> {
        match self.state {
            PotState::Start => {
                self.timer += 1;
                if self.timer >= cook_time {
                    self.state = PotState::Done;
                    return Some(PotTransition::Cooked);
                }
                None
            }
            PotState::Done => {
                self.timer += 1;
                if self.timer >= burn_time {
                    self.state = PotState::Burnt;
                    return Some(PotTransition::Burnt);
                }
                None
            }
            PotState::Idle | PotState::Burnt => None,
        }
    }

    /// Ladles a done or burnt soup into a bowl and empties the pot.
    /// Returns `None`, leaving the pot untouched, if there is nothing to take.
    pub fn take_soup(&mut self) -> Option<(SoupState, Recipe)> {
        let state = match self.state {
            PotState::Done => SoupState::Done,
            PotState::Burnt => SoupState::Burnt,
            PotState::Idle | PotState::Start => return None,
        };
        let recipe = self
            .recipe
            .or_else(|| Recipe::from_counts(self.onions, self.tomatoes))?;
        self.reset();
        Some((state, recipe))
    }
}
