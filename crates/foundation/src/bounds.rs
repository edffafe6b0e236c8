use crate::vec::Vec3;

/// Axis-aligned lower/upper bounds.
///
/// Used for clip bounds in chunk-layout space; an axis where
/// `lower >= upper` makes the box empty.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Box3 {
    pub lower: Vec3,
    pub upper: Vec3,
}

impl Box3 {
    pub fn new(lower: Vec3, upper: Vec3) -> Self {
        Self { lower, upper }
    }

    /// Bounds that clip nothing.
    pub fn everything() -> Self {
        Self::new(
            Vec3::splat(f64::NEG_INFINITY),
            Vec3::splat(f64::INFINITY),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.lower.x >= self.upper.x
            || self.lower.y >= self.upper.y
            || self.lower.z >= self.upper.z
    }

    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.lower.x
            && p.x < self.upper.x
            && p.y >= self.lower.y
            && p.y < self.upper.y
            && p.z >= self.lower.z
            && p.z < self.upper.z
    }

    pub fn intersection(&self, other: &Self) -> Self {
        Self::new(
            Vec3::new(
                self.lower.x.max(other.lower.x),
                self.lower.y.max(other.lower.y),
                self.lower.z.max(other.lower.z),
            ),
            Vec3::new(
                self.upper.x.min(other.upper.x),
                self.upper.y.min(other.upper.y),
                self.upper.z.min(other.upper.z),
            ),
        )
    }

    pub fn clamp(&self, p: Vec3) -> Vec3 {
        Vec3::new(
            p.x.clamp(self.lower.x, self.upper.x),
            p.y.clamp(self.lower.y, self.upper.y),
            p.z.clamp(self.lower.z, self.upper.z),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::Box3;
    use crate::vec::Vec3;

    #[test]
    fn intersection_and_emptiness() {
        let a = Box3::new(Vec3::ZERO, Vec3::splat(10.0));
        let b = Box3::new(Vec3::splat(5.0), Vec3::splat(20.0));
        let i = a.intersection(&b);
        assert_eq!(i, Box3::new(Vec3::splat(5.0), Vec3::splat(10.0)));
        assert!(!i.is_empty());

        let disjoint = Box3::new(Vec3::splat(30.0), Vec3::splat(40.0));
        assert!(a.intersection(&disjoint).is_empty());
    }

    #[test]
    fn contains_is_half_open() {
        let b = Box3::new(Vec3::ZERO, Vec3::splat(10.0));
        assert!(b.contains(Vec3::ZERO));
        assert!(!b.contains(Vec3::splat(10.0)));
    }

    #[test]
    fn clamp_pins_to_bounds() {
        let b = Box3::new(Vec3::ZERO, Vec3::splat(10.0));
        assert_eq!(b.clamp(Vec3::new(-5.0, 5.0, 25.0)), Vec3::new(0.0, 5.0, 10.0));
    }
}
