use serde::{Deserialize, Serialize};
use std::ops::{Add, Sub};

use super::constraints::Mask;

/// A per-phase scalar where an absent phase is distinct from a present zero.
///
/// `None` means "this phase does not exist at this site" (a single-phase
/// site has no B or C); `Some(0.0)` means "phase exists, currently zero".
/// Arithmetic propagates `None` the way floating-point NaN propagates: any
/// operation touching an absent phase stays absent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PhaseValues {
    pub a: Option<f64>,
    pub b: Option<f64>,
    pub c: Option<f64>,
}

impl PhaseValues {
    pub fn new(a: Option<f64>, b: Option<f64>, c: Option<f64>) -> Self {
        Self { a, b, c }
    }

    /// Single-phase site with only A present.
    pub fn single(a: f64) -> Self {
        Self { a: Some(a), b: None, c: None }
    }

    /// Two-phase site (A and B present, C absent).
    pub fn two_phase(a: f64, b: f64) -> Self {
        Self { a: Some(a), b: Some(b), c: None }
    }

    /// Three-phase site, all phases present.
    pub fn three_phase(a: f64, b: f64, c: f64) -> Self {
        Self { a: Some(a), b: Some(b), c: Some(c) }
    }

    /// All-absent value, useful as an accumulator seed for sites with an
    /// as-yet-unknown phase count.
    pub fn absent() -> Self {
        Self { a: None, b: None, c: None }
    }

    /// Sum of present phases; absent phases contribute nothing.
    pub fn total(&self) -> f64 {
        self.a.unwrap_or(0.0) + self.b.unwrap_or(0.0) + self.c.unwrap_or(0.0)
    }

    /// How many phases are present (0, 1, 2, or 3).
    pub fn count(&self) -> u8 {
        [self.a, self.b, self.c].iter().filter(|p| p.is_some()).count() as u8
    }

    /// The set of present phases, encoded as the tightest `Mask` that
    /// contains exactly the present phases. Returns `None` if no phase is
    /// present (a malformed/empty snapshot).
    pub fn active_phases(&self) -> Option<Mask> {
        match (self.a.is_some(), self.b.is_some(), self.c.is_some()) {
            (true, false, false) => Some(Mask::A),
            (false, true, false) => Some(Mask::B),
            (false, false, true) => Some(Mask::C),
            (true, true, false) => Some(Mask::Ab),
            (true, false, true) => Some(Mask::Ac),
            (false, true, true) => Some(Mask::Bc),
            (true, true, true) => Some(Mask::Abc),
            (false, false, false) => None,
        }
    }

    /// Read the value on a single named phase (0, 1, or 2 -> A, B, C).
    pub fn get(&self, phase: PhaseLetter) -> Option<f64> {
        match phase {
            PhaseLetter::A => self.a,
            PhaseLetter::B => self.b,
            PhaseLetter::C => self.c,
        }
    }

    /// Return a copy with a single phase replaced.
    pub fn set(&self, phase: PhaseLetter, value: Option<f64>) -> Self {
        let mut next = *self;
        match phase {
            PhaseLetter::A => next.a = value,
            PhaseLetter::B => next.b = value,
            PhaseLetter::C => next.c = value,
        }
        next
    }

    /// Elementwise map over present phases; absent phases stay absent.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            a: self.a.map(&f),
            b: self.b.map(&f),
            c: self.c.map(&f),
        }
    }

    /// Elementwise combination of two `PhaseValues`; a phase absent in
    /// either operand is absent in the result.
    pub fn zip_with(&self, other: &Self, f: impl Fn(f64, f64) -> f64) -> Self {
        Self {
            a: zip_opt(self.a, other.a, &f),
            b: zip_opt(self.b, other.b, &f),
            c: zip_opt(self.c, other.c, &f),
        }
    }

    /// Clamp negative present values to zero (floating point error or a
    /// sensor mismatch can otherwise produce a physically meaningless
    /// negative current).
    pub fn clamp_non_negative(&self) -> Self {
        self.map(|v| v.max(0.0))
    }
}

fn zip_opt(a: Option<f64>, b: Option<f64>, f: impl Fn(f64, f64) -> f64) -> Option<f64> {
    match (a, b) {
        (Some(x), Some(y)) => Some(f(x, y)),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PhaseLetter {
    A,
    B,
    C,
}

impl Add for PhaseValues {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        self.zip_with(&rhs, |x, y| x + y)
    }
}

impl Sub for PhaseValues {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        self.zip_with(&rhs, |x, y| x - y)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_propagates_through_addition() {
        let a = PhaseValues::single(3.0);
        let b = PhaseValues::two_phase(1.0, 1.0);
        let sum = a + b;
        assert_eq!(sum.a, Some(4.0));
        assert_eq!(sum.b, None, "B present in one operand but absent in the other must stay absent");
        assert_eq!(sum.c, None);
    }

    #[test]
    fn total_ignores_absent_phases() {
        let v = PhaseValues::two_phase(10.0, 5.0);
        assert_eq!(v.total(), 15.0);
        assert_eq!(v.count(), 2);
    }

    #[test]
    fn zero_is_not_absent() {
        let v = PhaseValues::three_phase(0.0, 0.0, 0.0);
        assert_eq!(v.count(), 3);
        assert_eq!(v.total(), 0.0);
    }

    #[test]
    fn active_phases_mask() {
        assert_eq!(PhaseValues::single(1.0).active_phases(), Some(Mask::A));
        assert_eq!(PhaseValues::two_phase(1.0, 1.0).active_phases(), Some(Mask::Ab));
        assert_eq!(PhaseValues::three_phase(1.0, 1.0, 1.0).active_phases(), Some(Mask::Abc));
        assert_eq!(PhaseValues::absent().active_phases(), None);
    }

    #[test]
    fn clamp_non_negative_only_touches_present() {
        let v = PhaseValues::two_phase(-1.0, 2.0);
        let clamped = v.clamp_non_negative();
        assert_eq!(clamped.a, Some(0.0));
        assert_eq!(clamped.b, Some(2.0));
        assert_eq!(clamped.c, None);
    }
}
