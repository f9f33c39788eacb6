//! Convex Contact – narrow-phase collision core for rigid-body engines.
//!
//! The crate covers the part of a physics pipeline between the broad phase
//! and the solver: convex polyhedra cooked into shared half-edge meshes, a GJK
//! support-mapping query that separates "apart", "touching" and "numerically
//! unreliable" outcomes, contact manifold sets per overlapping pair, and the
//! pooled per-body manifold chains handed to collision callbacks.

pub mod collision;
pub mod config;
pub mod core;
pub mod error;
pub mod utils;

pub use glam::{DMat3, DQuat, DVec3};

pub use collision::{
    report_contacts, BodySide, BoxShape, CollisionCallback, CollisionCallbackInfo, CollisionShape,
    ContactManifold, ContactManifoldListElement, ContactManifoldSet, ContactPoint,
    ConvexPolyhedronShape, DegenerateReason, GjkAlgorithm, GjkOutcome, GjkResult, NarrowPhase,
    OverlappingPair, PointShape, ProxyShape, Raycast, RaycastHit, RaycastQuery, SphereShape,
    SupportMap,
};
pub use config::{ExhaustionPolicy, NarrowPhaseConfig, PoolConfig};
pub use crate::core::{
    Aabb, HalfEdgeStructure, Matrix3, PolyhedronMesh, PolyhedronMeshBuilder, PolyhedronMeshData,
    Transform,
};
pub use error::{AllocError, CollisionError, MeshError, Result};
pub use utils::{Arena, Handle, PoolAllocator, PoolBox};
