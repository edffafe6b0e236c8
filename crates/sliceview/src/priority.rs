/// Global offset ranking slice-view chunk requests as their own class
/// relative to other request kinds sharing the scheduler.
pub const BASE_PRIORITY: f64 = -1e12;

/// Stride between consecutive visible scales.
///
/// Negative so the scale index is the primary sort key (coarser scales are
/// always more urgent); its magnitude must exceed any achievable distance
/// term, which the clip-bounded enumeration keeps far below this.
pub const SCALE_PRIORITY_MULTIPLIER: f64 = -1e7;

/// Scalar signal of how visible a layer's view currently is, including the
/// sentinel meaning "not visible at all".
#[derive(Debug, Copy, Clone, PartialEq, PartialOrd)]
pub struct VisibilityWeight(f64);

impl VisibilityWeight {
    /// Sentinel: the view is not visible; no chunk may be requested.
    pub const IGNORED: Self = Self(f64::NEG_INFINITY);
    /// Fully visible.
    pub const MAX: Self = Self(f64::INFINITY);

    pub fn new(weight: f64) -> Self {
        Self(weight)
    }

    pub fn get(self) -> f64 {
        self.0
    }

    pub fn is_ignored(self) -> bool {
        self.0 == f64::NEG_INFINITY
    }
}

/// Coarse request bucket; everything in `Visible` is served before anything
/// in `Prefetch`, regardless of score.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityTier {
    Visible,
    Prefetch,
}

/// Monotone mapping from visibility weight to (tier, base priority): more
/// visible means an earlier tier and a larger base priority.
///
/// Callers handle the `IGNORED` sentinel before asking for a tier.
pub fn tier_and_base_priority(weight: VisibilityWeight) -> (PriorityTier, f64) {
    debug_assert!(!weight.is_ignored(), "ignored visibility has no tier");
    if weight.get() == f64::INFINITY {
        (PriorityTier::Visible, 0.0)
    } else {
        (PriorityTier::Prefetch, weight.get())
    }
}

#[cfg(test)]
mod tests {
    use super::{
        tier_and_base_priority, PriorityTier, VisibilityWeight, SCALE_PRIORITY_MULTIPLIER,
    };

    #[test]
    fn mapping_is_monotone_in_weight() {
        let weights = [-3.0, 0.0, 2.5, 1e6, f64::INFINITY];
        let mut previous: Option<(PriorityTier, f64)> = None;
        for w in weights {
            let (tier, base) = tier_and_base_priority(VisibilityWeight::new(w));
            if let Some((prev_tier, prev_base)) = previous {
                // Higher weight: tier never later, base never smaller.
                assert!(tier <= prev_tier || base >= prev_base);
                if tier == prev_tier {
                    assert!(base >= prev_base);
                }
            }
            previous = Some((tier, base));
        }
    }

    #[test]
    fn full_visibility_gets_the_visible_tier() {
        assert_eq!(
            tier_and_base_priority(VisibilityWeight::MAX),
            (PriorityTier::Visible, 0.0)
        );
        assert_eq!(
            tier_and_base_priority(VisibilityWeight::new(7.0)),
            (PriorityTier::Prefetch, 7.0)
        );
    }

    #[test]
    fn sentinel_is_distinguished() {
        assert!(VisibilityWeight::IGNORED.is_ignored());
        assert!(!VisibilityWeight::new(-1e300).is_ignored());
    }

    #[test]
    fn scale_stride_is_negative_and_large() {
        assert!(SCALE_PRIORITY_MULTIPLIER < 0.0);
        assert!(SCALE_PRIORITY_MULTIPLIER.abs() >= 1e6);
    }
}
