//! Error types for the collision core.
//!
//! Precondition failures that the engine used to assert on (singular inverses,
//! zero support directions, flat bounding boxes, empty manifolds) are reported
//! through [`CollisionError`] instead of aborting.

use crate::collision::narrowphase::DegenerateReason;

/// Main error type for the crate.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CollisionError {
    /// Matrix inversion was requested on a matrix whose determinant is zero
    /// (or within the caller-supplied tolerance of zero).
    #[error("matrix is singular (determinant {determinant})")]
    SingularMatrix {
        /// Determinant that failed the check.
        determinant: f64,
    },
    /// A support mapping was queried with a zero-length direction.
    #[error("support direction has zero length")]
    ZeroDirection,
    /// A bounding-box half extent used for inertia approximation is not positive.
    #[error("bounding box half extent along axis {axis} is not positive ({extent})")]
    NonPositiveExtent {
        /// Axis index (0 = x, 1 = y, 2 = z).
        axis: usize,
        /// Offending half extent.
        extent: f64,
    },
    /// Local scaling must be strictly positive on every axis.
    #[error("local scaling must be strictly positive, got [{x}, {y}, {z}]")]
    InvalidScaling {
        /// Scale along x.
        x: f64,
        /// Scale along y.
        y: f64,
        /// Scale along z.
        z: f64,
    },
    /// A contact manifold without contact points reached callback assembly.
    #[error("contact manifold {index} has no contact points")]
    EmptyManifold {
        /// Position of the manifold in the pair's manifold chain.
        index: usize,
    },
    /// The narrow phase could not produce a reliable answer.
    #[error("narrow-phase query is numerically degenerate: {0:?}")]
    Degenerate(DegenerateReason),
    /// Mesh cooking failed.
    #[error(transparent)]
    Mesh(#[from] MeshError),
    /// The pooled allocator refused a request.
    #[error(transparent)]
    Alloc(#[from] AllocError),
}

/// Structural problems found while building a half-edge polyhedron.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MeshError {
    /// A closed polyhedron needs at least four vertices.
    #[error("polyhedron needs at least 4 vertices, got {count}")]
    TooFewVertices {
        /// Number of vertices supplied.
        count: usize,
    },
    /// A face lists fewer than three distinct vertices.
    #[error("face {face} has fewer than 3 vertices")]
    FaceTooSmall {
        /// Face index.
        face: usize,
    },
    /// A face references a vertex that does not exist.
    #[error("face {face} references vertex {vertex} but only {count} vertices exist")]
    IndexOutOfRange {
        /// Face index.
        face: usize,
        /// Referenced vertex index.
        vertex: usize,
        /// Number of vertices.
        count: usize,
    },
    /// Two faces traverse the same directed edge (inconsistent winding or non-manifold mesh).
    #[error("directed edge {from} -> {to} is used by more than one face")]
    DuplicateEdge {
        /// Origin vertex.
        from: usize,
        /// Destination vertex.
        to: usize,
    },
    /// A half-edge has no opposite half-edge (the mesh is open).
    #[error("half-edge {from} -> {to} has no twin")]
    MissingTwin {
        /// Origin vertex.
        from: usize,
        /// Destination vertex.
        to: usize,
    },
    /// A vertex is not referenced by any face.
    #[error("vertex {vertex} is not used by any face")]
    IsolatedVertex {
        /// Vertex index.
        vertex: usize,
    },
    /// A face has no measurable area, so it has no normal.
    #[error("face {face} has zero area")]
    DegenerateFace {
        /// Face index.
        face: usize,
    },
    /// A half-edge invariant does not hold after construction.
    #[error("half-edge invariant violated: {0}")]
    BrokenInvariant(String),
}

/// Failures reported by [`crate::utils::allocator::PoolAllocator`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AllocError {
    /// The pool is configured to fail instead of growing and its budget is spent.
    #[error("pool exhausted: {requested} bytes requested, {reserved} of {capacity} bytes reserved")]
    Exhausted {
        /// Requested size.
        requested: usize,
        /// Bytes already reserved by the pool.
        reserved: usize,
        /// Configured budget.
        capacity: usize,
    },
    /// The request is larger than the largest size class.
    #[error("allocation of {requested} bytes exceeds the largest size class ({max} bytes)")]
    TooLarge {
        /// Requested size.
        requested: usize,
        /// Largest slot size the pool serves.
        max: usize,
    },
    /// The payload type needs stronger alignment than pool slots provide.
    #[error("alignment {align} exceeds the pool slot alignment {max}")]
    UnsupportedAlignment {
        /// Requested alignment.
        align: usize,
        /// Alignment guaranteed by the pool.
        max: usize,
    },
    /// A block was released with a different size than it was allocated with.
    #[error("block released with size {actual}, allocated with {expected}")]
    SizeMismatch {
        /// Size given at allocation.
        expected: usize,
        /// Size given at release.
        actual: usize,
    },
    /// A block was released to a pool that did not allocate it.
    #[error("block belongs to pool {owner}, released to pool {pool}")]
    ForeignBlock {
        /// Pool that owns the block.
        owner: u64,
        /// Pool the release was attempted on.
        pool: u64,
    },
}

/// Convenient Result type alias for collision operations.
pub type Result<T> = std::result::Result<T, CollisionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mesh_errors_convert_into_collision_errors() {
        let err: CollisionError = MeshError::IsolatedVertex { vertex: 7 }.into();
        assert!(matches!(err, CollisionError::Mesh(MeshError::IsolatedVertex { vertex: 7 })));
        assert!(err.to_string().contains("vertex 7"));
    }

    #[test]
    fn alloc_error_display_mentions_sizes() {
        let err = AllocError::SizeMismatch {
            expected: 32,
            actual: 16,
        };
        let text = err.to_string();
        assert!(text.contains("32") && text.contains("16"));
    }
}
