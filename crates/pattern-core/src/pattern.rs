use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Closed enumeration of every supported pattern, per spec §3. Modeled as a
/// tagged variant rather than the source's string keys so that
/// `category_of` is total and exhaustive-checked by the compiler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PatternKind {
    // Bullish continuation
    AscendingTriangle,
    BullFlag,
    BullPennant,
    CupAndHandle,
    RisingChannel,
    RisingWedgeContinuation,
    RectangleBullish,

    // Bearish continuation
    DescendingTriangle,
    BearFlag,
    BearPennant,
    InvertedCupHandle,
    FallingChannel,
    FallingWedgeContinuation,
    RectangleBearish,

    // Bullish reversal
    DoubleBottom,
    TripleBottom,
    InverseHeadShoulders,
    FallingWedgeReversal,

    // Bearish reversal
    DoubleTop,
    TripleTop,
    HeadShoulders,
    RisingWedgeReversal,

    // Bilateral / neutral
    SymmetricalTriangle,
    Diamond,
    RectangleNeutral,
    ExpandingTriangle,
    PennantNeutral,

    // Harmonic
    Gartley,
    Butterfly,
    Bat,
    Crab,
    Abcd,
    Cypher,

    // Candlestick — single bar
    Doji,
    SpinningTop,
    Marubozu,
    GravestoneDoji,
    Hammer,
    ShootingStar,

    // Candlestick — composite
    BullishEngulfing,
    BearishEngulfing,
    BullishHarami,
    BearishHarami,
    PiercingLine,
    DarkCloudCover,
    MorningStar,
    EveningStar,
    ThreeWhiteSoldiers,
    ThreeBlackCrows,
    TweezerTops,
    TweezerBottoms,
    RisingThreeMethods,
    FallingThreeMethods,

    // Divergence
    BullishDivergence,
    BearishDivergence,
    HiddenBullishDivergence,
    HiddenBearishDivergence,
}

/// Partition of `PatternKind`, per spec §3. Note that several kinds
/// (`Hammer`, `ShootingStar`, `MorningStar`, `EveningStar`,
/// `BullishEngulfing`, `BearishEngulfing`) would fall under a reversal
/// category by shape alone; the source's final category assignment puts
/// every candlestick-shaped kind in `Candlestick` instead (see DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    BullishContinuation,
    BearishContinuation,
    BullishReversal,
    BearishReversal,
    BilateralNeutral,
    Harmonic,
    Candlestick,
    Divergence,
}

/// Total function from kind to category.
pub fn category_of(kind: PatternKind) -> Category {
    use Category::*;
    use PatternKind::*;
    match kind {
        AscendingTriangle | BullFlag | BullPennant | CupAndHandle | RisingChannel
        | RisingWedgeContinuation | RectangleBullish => BullishContinuation,

        DescendingTriangle | BearFlag | BearPennant | InvertedCupHandle | FallingChannel
        | FallingWedgeContinuation | RectangleBearish => BearishContinuation,

        DoubleBottom | TripleBottom | InverseHeadShoulders | FallingWedgeReversal => {
            BullishReversal
        }

        DoubleTop | TripleTop | HeadShoulders | RisingWedgeReversal => BearishReversal,

        SymmetricalTriangle | Diamond | RectangleNeutral | ExpandingTriangle | PennantNeutral => {
            BilateralNeutral
        }

        Gartley | Butterfly | Bat | Crab | Abcd | Cypher => Harmonic,

        Doji | SpinningTop | Marubozu | GravestoneDoji | Hammer | ShootingStar
        | BullishEngulfing | BearishEngulfing | BullishHarami | BearishHarami | PiercingLine
        | DarkCloudCover | MorningStar | EveningStar | ThreeWhiteSoldiers | ThreeBlackCrows
        | TweezerTops | TweezerBottoms | RisingThreeMethods | FallingThreeMethods => Candlestick,

        BullishDivergence | BearishDivergence | HiddenBullishDivergence
        | HiddenBearishDivergence => Divergence,
    }
}

impl PatternKind {
    pub fn category(self) -> Category {
        category_of(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurningPointKind {
    Peak,
    Trough,
}

/// A local extreme produced by the peak/trough extractor (spec §4.1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurningPoint {
    pub index: usize,
    pub value: f64,
    pub kind: TurningPointKind,
}

/// Least-squares (or two-point) line fit over a span of indices (spec §4.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Trendline {
    pub start_index: usize,
    pub end_index: usize,
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
}

impl Trendline {
    #[inline]
    pub fn value_at(&self, index: usize) -> f64 {
        self.slope * index as f64 + self.intercept
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum VolumeTrend {
    Increasing,
    Decreasing,
    Stable,
    Unknown,
}

/// Volume behavior over a pattern's index range (spec §4.3).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VolumeProfile {
    pub average_volume: f64,
    pub trend: VolumeTrend,
    pub confirms_pattern: bool,
    pub breakout_volume: Option<f64>,
}

/// An accepted pattern candidate. Immutable; owns its key-level map (no
/// back-references into the series).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedPattern {
    pub kind: PatternKind,
    pub category: Category,
    pub confidence: f64,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub start_index: usize,
    pub end_index: usize,
    pub key_levels: BTreeMap<String, f64>,
    pub volume_profile: VolumeProfile,
    pub description: String,
    pub fibonacci_levels: Option<BTreeMap<String, f64>>,
}

impl DetectedPattern {
    #[inline]
    pub fn duration_bars(&self) -> usize {
        self.end_index - self.start_index + 1
    }

    #[inline]
    pub fn is_bullish(&self) -> bool {
        matches!(
            self.category,
            Category::BullishContinuation | Category::BullishReversal
        )
    }

    #[inline]
    pub fn is_bearish(&self) -> bool {
        matches!(
            self.category,
            Category::BearishContinuation | Category::BearishReversal
        )
    }

    #[inline]
    pub fn is_reversal(&self) -> bool {
        matches!(
            self.category,
            Category::BullishReversal | Category::BearishReversal
        )
    }

    /// Overlap length in bars between two patterns' index ranges (spec §4.12
    /// step 6 / §8 invariant 7): zero if they don't intersect.
    pub fn overlap_bars(&self, other: &DetectedPattern) -> usize {
        let start = self.start_index.max(other.start_index);
        let end = self.end_index.min(other.end_index);
        if end >= start {
            end - start + 1
        } else {
            0
        }
    }
}

/// Deterministic tie-breaker required by spec §5/§9: `(confidence desc, kind
/// asc, start_index asc, end_index asc)`. `f64::total_cmp` gives a total
/// order even across NaN (which should never occur in a valid confidence,
/// but keeps the sort panic-free).
pub fn pattern_order_key(p: &DetectedPattern) -> (std::cmp::Reverse<OrderedF64>, PatternKind, usize, usize) {
    (
        std::cmp::Reverse(OrderedF64(p.confidence)),
        p.kind,
        p.start_index,
        p.end_index,
    )
}

/// Thin total-order wrapper around `f64` for sort keys.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrderedF64(pub f64);

impl Eq for OrderedF64 {}

impl PartialOrd for OrderedF64 {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OrderedF64 {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0.total_cmp(&other.0)
    }
}
