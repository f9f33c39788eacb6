//! Numeric and topological substrate: 3x3 matrices, transforms, bounds and
//! half-edge polyhedra.

pub mod half_edge;
pub mod matrix;
pub mod mesh;
pub mod types;

pub use half_edge::{HalfEdge, HalfEdgeFace, HalfEdgeStructure, HalfEdgeVertex};
pub use matrix::Matrix3;
pub use mesh::{Aabb, PolyhedronMesh, PolyhedronMeshBuilder, PolyhedronMeshData};
pub use types::Transform;
