use serde::{Deserialize, Serialize};
use strum::EnumIter;

use super::phase::PhaseLetter;

/// Which phase combination a load is wired to, or a pool constraint applies
/// to. Bit-encoded internally (A=1, B=2, C=4) so overlap tests are a single
/// `&`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize, Deserialize)]
pub enum Mask {
    A,
    B,
    C,
    Ab,
    Ac,
    Bc,
    Abc,
}

impl Mask {
    fn bits(self) -> u8 {
        match self {
            Mask::A => 0b001,
            Mask::B => 0b010,
            Mask::C => 0b100,
            Mask::Ab => 0b011,
            Mask::Ac => 0b101,
            Mask::Bc => 0b110,
            Mask::Abc => 0b111,
        }
    }

    /// How many phases this mask spans (1, 2, or 3).
    pub fn phase_count(self) -> u8 {
        self.bits().count_ones() as u8
    }

    /// True if `self` and `other` share at least one phase.
    pub fn overlaps(self, other: Mask) -> bool {
        self.bits() & other.bits() != 0
    }

    /// True if this mask includes the given single phase.
    pub fn contains(self, phase: PhaseLetter) -> bool {
        let bit = match phase {
            PhaseLetter::A => 0b001,
            PhaseLetter::B => 0b010,
            PhaseLetter::C => 0b100,
        };
        self.bits() & bit != 0
    }

    /// The individual single-phase letters spanned by this mask.
    pub fn phases(self) -> Vec<PhaseLetter> {
        [PhaseLetter::A, PhaseLetter::B, PhaseLetter::C]
            .into_iter()
            .filter(|p| self.contains(*p))
            .collect()
    }

    /// All seven combination keys, for iterating a `PhaseConstraints`.
    pub fn all() -> [Mask; 7] {
        [Mask::A, Mask::B, Mask::C, Mask::Ab, Mask::Ac, Mask::Bc, Mask::Abc]
    }
}

/// Maximum current (A) usable at each of the seven fixed phase-combination
/// keys. Represents both independent per-phase limits (e.g. a grid breaker,
/// where `AB = A + B` exactly) and shared pools (e.g. an asymmetric inverter,
/// where `ABC` is a genuine shared total smaller than `A + B + C`).
///
/// Invariants, maintained by every constructor and mutator:
/// - `ab <= a + b`, `ac <= a + c`, `bc <= b + c`
/// - `abc <= a + b + c`
/// - every field >= 0
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseConstraints {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub ab: f64,
    pub ac: f64,
    pub bc: f64,
    pub abc: f64,
}

impl Default for PhaseConstraints {
    fn default() -> Self {
        Self::zero()
    }
}

impl PhaseConstraints {
    /// All-zero constraints (no current available anywhere).
    pub fn zero() -> Self {
        Self { a: 0.0, b: 0.0, c: 0.0, ab: 0.0, ac: 0.0, bc: 0.0, abc: 0.0 }
    }

    /// Independent per-phase limits (e.g. a grid breaker rated identically
    /// on each phase, with no shared total smaller than the sum). Pair and
    /// triple keys are exact sums, since nothing is shared between phases.
    pub fn from_per_phase(a: f64, b: f64, c: f64) -> Self {
        Self {
            a,
            b,
            c,
            ab: a + b,
            ac: a + c,
            bc: b + c,
            abc: a + b + c,
        }
    }

    /// A shared pool of `total` amps (e.g. an asymmetric inverter), with an
    /// optional per-phase ceiling. Every key is capped by both the relevant
    /// per-phase ceiling and the shared total.
    pub fn from_pool(total: f64, per_phase_cap: Option<f64>) -> Self {
        let cap = per_phase_cap.unwrap_or(f64::INFINITY);
        let single = total.min(cap);
        let pair = total.min(2.0 * cap);
        Self {
            a: single,
            b: single,
            c: single,
            ab: pair,
            ac: pair,
            bc: pair,
            abc: total,
        }
    }

    fn get(&self, mask: Mask) -> f64 {
        match mask {
            Mask::A => self.a,
            Mask::B => self.b,
            Mask::C => self.c,
            Mask::Ab => self.ab,
            Mask::Ac => self.ac,
            Mask::Bc => self.bc,
            Mask::Abc => self.abc,
        }
    }

    fn get_mut(&mut self, mask: Mask) -> &mut f64 {
        match mask {
            Mask::A => &mut self.a,
            Mask::B => &mut self.b,
            Mask::C => &mut self.c,
            Mask::Ab => &mut self.ab,
            Mask::Ac => &mut self.ac,
            Mask::Bc => &mut self.bc,
            Mask::Abc => &mut self.abc,
        }
    }

    fn single_phase_value(&self, phase: PhaseLetter) -> f64 {
        match phase {
            PhaseLetter::A => self.a,
            PhaseLetter::B => self.b,
            PhaseLetter::C => self.c,
        }
    }

    /// Maximum *per-phase* current a load occupying exactly `mask` may draw.
    /// The minimum of: each individual phase in the mask; the mask's own
    /// combination key divided by its phase count; and `abc` divided by the
    /// phase count. That last term is the one most often missed — it is
    /// what prevents a 1-phase load from drawing the full per-phase cap when
    /// the pool's shared total is tighter than 3x the per-phase cap.
    pub fn get_available(&self, mask: Mask) -> f64 {
        let n = mask.phase_count() as f64;
        let per_phase_min = mask
            .phases()
            .into_iter()
            .map(|p| self.single_phase_value(p))
            .fold(f64::INFINITY, f64::min);
        let combo = self.get(mask) / n;
        let abc_share = self.abc / n;
        per_phase_min.min(combo).min(abc_share).max(0.0)
    }

    /// Record a load drawing `current` amps on each phase of `mask`. Every
    /// single phase in the mask drops by `current`; every combination key
    /// (including `abc`) that overlaps any phase in the mask drops by
    /// `current * mask.phase_count()`, since that key represents capacity
    /// shared across all loads touching any of those phases. Re-normalizes
    /// afterward.
    pub fn deduct(&mut self, current: f64, mask: Mask) {
        let n = mask.phase_count() as f64;
        let total_draw = current * n;

        for phase in mask.phases() {
            let field = match phase {
                PhaseLetter::A => &mut self.a,
                PhaseLetter::B => &mut self.b,
                PhaseLetter::C => &mut self.c,
            };
            *field -= current;
        }

        for combo in [Mask::Ab, Mask::Ac, Mask::Bc, Mask::Abc] {
            if combo.overlaps(mask) {
                *self.get_mut(combo) -= total_draw;
            }
        }

        self.normalize();
    }

    /// Cascade-reduce combination keys so the invariants hold again, and
    /// clamp every field at zero. Called automatically after `deduct`; safe
    /// to call redundantly.
    pub fn normalize(&mut self) {
        self.a = self.a.max(0.0);
        self.b = self.b.max(0.0);
        self.c = self.c.max(0.0);
        self.ab = self.ab.max(0.0).min(self.a + self.b);
        self.ac = self.ac.max(0.0).min(self.a + self.c);
        self.bc = self.bc.max(0.0).min(self.b + self.c);
        self.abc = self.abc.max(0.0).min(self.a + self.b + self.c);
    }

    /// Elementwise sum of two constraint sets (e.g. grid + inverter limits),
    /// re-normalized.
    pub fn add(&self, other: &Self) -> Self {
        let mut sum = Self {
            a: self.a + other.a,
            b: self.b + other.b,
            c: self.c + other.c,
            ab: self.ab + other.ab,
            ac: self.ac + other.ac,
            bc: self.bc + other.bc,
            abc: self.abc + other.abc,
        };
        sum.normalize();
        sum
    }
}
