use super::direction::Direction;

/// Stepped price concession applied to exit orders that keep failing to fill.
///
/// The step only ever grows, capped at `max`. Long exits sell lower, short
/// exits buy higher.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceConcession {
    direction: Direction,
    step: f64,
    increment: f64,
    max: f64,
}

impl PriceConcession {
    pub fn new(direction: Direction, increment: f64, max: f64) -> Self {
        Self {
            direction,
            step: 0.0,
            increment: increment.max(0.0),
            max: max.max(0.0),
        }
    }

    pub fn step(&self) -> f64 {
        self.step
    }

    /// Step with the direction sign applied (positive for long, negative for short)
    pub fn signed_step(&self) -> f64 {
        self.direction.sign() * self.step
    }

    pub fn at_max(&self) -> bool {
        self.step >= self.max
    }

    /// Raise the step by one increment. Returns false once capped.
    pub fn raise(&mut self) -> bool {
        if self.at_max() {
            return false;
        }
        self.step = (self.step + self.increment).min(self.max);
        true
    }

    /// Price to quote after the concession
    pub fn apply(&self, price: f64) -> f64 {
        price * (1.0 - self.signed_step())
    }
}
