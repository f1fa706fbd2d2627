use glam::Vec3;

/// Physics collision volume derived from a model.
#[derive(Debug, Clone, PartialEq)]
pub enum CollisionShape {
    /// Input point set of a convex hull, in model space. The hull itself is
    /// computed by the physics layer.
    ConvexHull { points: Vec<Vec3> },
}

impl CollisionShape {
    pub fn point_count(&self) -> usize {
        match self {
            CollisionShape::ConvexHull { points } => points.len(),
        }
    }

    /// Axis-aligned bounds, `None` for an empty point set.
    pub fn bounds(&self) -> Option<(Vec3, Vec3)> {
        match self {
            CollisionShape::ConvexHull { points } => {
                let first = *points.first()?;
                Some(
                    points
                        .iter()
                        .fold((first, first), |(lo, hi), p| (lo.min(*p), hi.max(*p))),
                )
            }
        }
    }
}
