//! Collision detection: shapes, GJK narrow phase, manifolds and contact callbacks.

pub mod callback;
pub mod contact;
pub mod convex_polyhedron;
pub mod narrowphase;
pub mod pair;
pub mod queries;
pub mod shapes;

pub use callback::{
    report_contacts, BodySide, CollisionCallback, CollisionCallbackInfo, ContactManifoldChain,
    ContactManifoldListElement,
};
pub use contact::{ContactManifold, ContactManifoldSet, ContactPoint};
pub use convex_polyhedron::ConvexPolyhedronShape;
pub use narrowphase::{
    DegenerateReason, GjkAlgorithm, GjkOutcome, GjkResult, IntersectionInfo, MarginContact,
    NarrowPhase, SeparationInfo,
};
pub use pair::{OverlappingPair, ProxyShape};
pub use queries::{Raycast, RaycastHit, RaycastQuery};
pub use shapes::{BoxShape, CollisionShape, PointShape, SphereShape, SupportHint, SupportMap};
