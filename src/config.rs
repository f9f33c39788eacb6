//! Global configuration constants for the collision core.

use serde::{Deserialize, Serialize};

/// Default collision margin added around polyhedra and boxes.
pub const DEFAULT_OBJECT_MARGIN: f64 = 0.04;

/// Hard cap on simplex refinement steps performed by one GJK query.
pub const GJK_MAX_ITERATIONS: usize = 64;

/// Relative progress threshold: the loop stops once a new support point reduces
/// the squared distance by less than this fraction.
pub const GJK_RELATIVE_TOLERANCE: f64 = 1e-6;

/// Squared distance below which the origin counts as touching the simplex,
/// as a fraction of the squared length of the farthest simplex point.
pub const GJK_TOUCHING_TOLERANCE: f64 = 1e-12;

/// Maximum number of contact points kept in one manifold.
pub const MAX_CONTACT_POINTS_IN_MANIFOLD: usize = 4;

/// Maximum number of manifolds kept for one overlapping pair.
pub const MAX_MANIFOLDS_IN_SET: usize = 3;

/// Cosine threshold for two contact normals to share a manifold.
pub const MANIFOLD_NORMAL_TOLERANCE: f64 = 0.95;

/// Contact points closer than this (on body A, local space) are merged.
pub const PERSISTENT_CONTACT_DISTANCE: f64 = 0.03;

/// Default chunk size carved into slots by the pooled allocator.
pub const DEFAULT_POOL_CHUNK_SIZE: usize = 16 * 1024;

/// Smallest slot served by the pool, as a power of two (16 bytes).
pub const POOL_MIN_SIZE_CLASS_POWER: u32 = 4;

/// Largest slot served by the pool, as a power of two (1 MiB).
pub const POOL_MAX_SIZE_CLASS_POWER: u32 = 20;

/// Alignment guaranteed for every pooled block.
pub const POOL_BLOCK_ALIGNMENT: usize = 64;

/// Tunables for the GJK narrow phase.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NarrowPhaseConfig {
    pub max_iterations: usize,
    pub relative_tolerance: f64,
    /// Squared gap, relative to the squared size of the simplex, below which
    /// the shapes count as touching.
    pub touching_tolerance: f64,
    /// When false, margins are ignored and only the core shapes are compared.
    pub use_margins: bool,
}

impl Default for NarrowPhaseConfig {
    fn default() -> Self {
        Self {
            max_iterations: GJK_MAX_ITERATIONS,
            relative_tolerance: GJK_RELATIVE_TOLERANCE,
            touching_tolerance: GJK_TOUCHING_TOLERANCE,
            use_margins: true,
        }
    }
}

/// What the pool does once its byte budget is spent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExhaustionPolicy {
    /// Keep reserving chunks; `capacity_bytes` is ignored.
    #[default]
    Grow,
    /// Report [`crate::error::AllocError::Exhausted`] instead of reserving past the budget.
    Fail,
}

/// Pooled allocator settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    pub chunk_size: usize,
    pub exhaustion: ExhaustionPolicy,
    pub capacity_bytes: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_POOL_CHUNK_SIZE,
            exhaustion: ExhaustionPolicy::Grow,
            capacity_bytes: usize::MAX,
        }
    }
}

impl PoolConfig {
    /// Fixed-budget pool that fails once `capacity_bytes` are reserved.
    pub fn bounded(capacity_bytes: usize) -> Self {
        Self {
            exhaustion: ExhaustionPolicy::Fail,
            capacity_bytes,
            ..Self::default()
        }
    }
}
