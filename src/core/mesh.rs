use std::collections::HashMap;

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::half_edge::HalfEdgeStructure;
use crate::error::{CollisionError, MeshError, Result};
use crate::utils::logging::ScopedTimer;

/// Axis-aligned bounding box used for shape bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Self { min, max }
    }

    pub fn empty() -> Self {
        Self {
            min: DVec3::splat(f64::INFINITY),
            max: DVec3::splat(f64::NEG_INFINITY),
        }
    }

    pub fn extend(&mut self, point: DVec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Self {
        let mut bounds = Self::empty();
        for p in points {
            bounds.extend(p);
        }
        bounds
    }

    /// Grows the box by `amount` on every side.
    pub fn inflate(&self, amount: f64) -> Self {
        Self {
            min: self.min - DVec3::splat(amount),
            max: self.max + DVec3::splat(amount),
        }
    }

    pub fn center(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Half extents of the box.
    pub fn extent(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    pub fn contains_point(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }
}

/// Convex polyhedron mesh shared by every shape instance built from it.
///
/// Cooked once from raw vertex/face buffers and never mutated afterwards.
/// Serialised as those buffers; deserialising cooks them again, so a stored
/// mesh goes through the same validation as a freshly built one.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "PolyhedronMeshData", into = "PolyhedronMeshData")]
pub struct PolyhedronMesh {
    vertices: Vec<DVec3>,
    structure: HalfEdgeStructure,
    face_normals: Vec<DVec3>,
    bounds: Aabb,
    centroid: DVec3,
}

impl PolyhedronMesh {
    pub fn builder(vertices: Vec<DVec3>, faces: Vec<Vec<u32>>) -> PolyhedronMeshBuilder {
        PolyhedronMeshBuilder::new(vertices, faces)
    }

    /// Box with the given half extents centred on the origin.
    pub fn cuboid(half_extents: DVec3) -> Result<Self> {
        let vertices = (0..8)
            .map(|i| {
                DVec3::new(
                    if i & 1 == 0 { -half_extents.x } else { half_extents.x },
                    if i & 2 == 0 { -half_extents.y } else { half_extents.y },
                    if i & 4 == 0 { -half_extents.z } else { half_extents.z },
                )
            })
            .collect();
        let faces = vec![
            vec![0, 4, 6, 2],
            vec![1, 3, 7, 5],
            vec![0, 1, 5, 4],
            vec![2, 6, 7, 3],
            vec![0, 2, 3, 1],
            vec![4, 5, 7, 6],
        ];
        PolyhedronMeshBuilder::new(vertices, faces).build()
    }

    pub fn structure(&self) -> &HalfEdgeStructure {
        &self.structure
    }

    pub fn vertices(&self) -> &[DVec3] {
        &self.vertices
    }

    pub fn vertex(&self, index: usize) -> DVec3 {
        self.vertices[index]
    }

    pub fn nb_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn nb_faces(&self) -> usize {
        self.face_normals.len()
    }

    /// Outward unit normal of a face.
    pub fn face_normal(&self, face: usize) -> DVec3 {
        self.face_normals[face]
    }

    pub fn bounds(&self) -> Aabb {
        self.bounds
    }

    pub fn centroid(&self) -> DVec3 {
        self.centroid
    }
}

/// Raw buffers a [`PolyhedronMesh`] is cooked from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolyhedronMeshData {
    pub vertices: Vec<DVec3>,
    pub faces: Vec<Vec<u32>>,
}

impl TryFrom<PolyhedronMeshData> for PolyhedronMesh {
    type Error = CollisionError;

    fn try_from(data: PolyhedronMeshData) -> Result<Self> {
        PolyhedronMeshBuilder::new(data.vertices, data.faces).build()
    }
}

impl From<PolyhedronMesh> for PolyhedronMeshData {
    fn from(mesh: PolyhedronMesh) -> Self {
        let faces = (0..mesh.structure.nb_faces())
            .map(|face| {
                mesh.structure
                    .face_vertices(face)
                    .map(|v| v as u32)
                    .collect()
            })
            .collect();
        Self {
            vertices: mesh.vertices,
            faces,
        }
    }
}

/// Helper used to cook polyhedron meshes from raw vertex/index buffers.
#[derive(Debug, Clone)]
pub struct PolyhedronMeshBuilder {
    vertices: Vec<DVec3>,
    faces: Vec<Vec<u32>>,
}

impl PolyhedronMeshBuilder {
    /// Faces list vertex indices counter-clockwise as seen from outside.
    pub fn new(vertices: Vec<DVec3>, faces: Vec<Vec<u32>>) -> Self {
        Self { vertices, faces }
    }

    pub fn from_triangles(vertices: Vec<DVec3>, indices: Vec<[u32; 3]>) -> Self {
        let faces = indices.into_iter().map(|tri| tri.to_vec()).collect();
        Self { vertices, faces }
    }

    /// Deduplicates vertices using a quantized grid for stability.
    ///
    /// Grid keys are the bit patterns of the rounded coordinates, so tiny
    /// epsilons never saturate and merge distinct vertices. An epsilon too
    /// small to scale every coordinate finitely leaves the vertices untouched.
    pub fn weld_vertices(mut self, epsilon: f64) -> Self {
        let inv = 1.0 / epsilon;
        if !(epsilon > 0.0 && inv.is_finite())
            || self.vertices.is_empty()
            || self.vertices.iter().any(|v| !(*v * inv).is_finite())
        {
            return self;
        }

        // `+ 0.0` folds -0.0 into 0.0 so both land in the same cell.
        let cell = |c: f64| ((c * inv).round() + 0.0).to_bits();
        let mut map: HashMap<(u64, u64, u64), u32> = HashMap::new();
        let mut welded: Vec<DVec3> = Vec::new();
        let mut remap: Vec<u32> = Vec::with_capacity(self.vertices.len());

        for v in &self.vertices {
            let key = (cell(v.x), cell(v.y), cell(v.z));
            let index = *map.entry(key).or_insert_with(|| {
                let idx = welded.len() as u32;
                welded.push(*v);
                idx
            });
            remap.push(index);
        }

        for face in &mut self.faces {
            for index in face.iter_mut() {
                if let Some(&mapped) = remap.get(*index as usize) {
                    *index = mapped;
                }
            }
            face.dedup();
            while face.len() > 1 && face.first() == face.last() {
                face.pop();
            }
        }

        self.vertices = welded;
        self
    }

    /// Recenters vertices around their centroid to keep transforms stable.
    pub fn recenter(mut self) -> Self {
        if self.vertices.is_empty() {
            return self;
        }
        let centroid: DVec3 =
            self.vertices.iter().copied().sum::<DVec3>() / self.vertices.len() as f64;
        for vertex in &mut self.vertices {
            *vertex -= centroid;
        }
        self
    }

    pub fn build(self) -> Result<PolyhedronMesh> {
        let _timer = ScopedTimer::new("mesh::build");
        let faces: Vec<Vec<usize>> = self
            .faces
            .iter()
            .map(|face| face.iter().map(|&i| i as usize).collect())
            .collect();
        let structure = HalfEdgeStructure::build(self.vertices.len(), &faces)?;

        let face_normals = (0..structure.nb_faces())
            .map(|face| newell_normal(&self.vertices, structure.face_vertices(face), face))
            .collect::<std::result::Result<Vec<_>, MeshError>>()?;

        let bounds = Aabb::from_points(self.vertices.iter().copied());
        let centroid = self.vertices.iter().copied().sum::<DVec3>() / self.vertices.len() as f64;

        log::debug!(
            "cooked polyhedron: {} vertices, {} faces, {} half-edges",
            structure.nb_vertices(),
            structure.nb_faces(),
            structure.nb_half_edges()
        );

        Ok(PolyhedronMesh {
            vertices: self.vertices,
            structure,
            face_normals,
            bounds,
            centroid,
        })
    }
}

fn newell_normal(
    vertices: &[DVec3],
    face_vertices: impl Iterator<Item = usize>,
    face: usize,
) -> std::result::Result<DVec3, MeshError> {
    let points: Vec<DVec3> = face_vertices.map(|v| vertices[v]).collect();
    let mut normal = DVec3::ZERO;
    for (i, current) in points.iter().enumerate() {
        let next = points[(i + 1) % points.len()];
        normal.x += (current.y - next.y) * (current.z + next.z);
        normal.y += (current.z - next.z) * (current.x + next.x);
        normal.z += (current.x - next.x) * (current.y + next.y);
    }
    normal
        .try_normalize()
        .ok_or(MeshError::DegenerateFace { face })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn cuboid_normals_point_outward() {
        let mesh = PolyhedronMesh::cuboid(DVec3::ONE).expect("cube cooks");
        assert_eq!(mesh.nb_faces(), 6);
        for face in 0..mesh.nb_faces() {
            let normal = mesh.face_normal(face);
            let first = mesh.structure().face_vertices(face).next().expect("face has vertices");
            assert!(normal.dot(mesh.vertex(first)) > 0.0, "face {face} normal points inward");
            assert_relative_eq!(normal.length(), 1.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn recenter_moves_centroid_to_origin() {
        let offset = DVec3::new(3.0, -1.0, 2.0);
        let vertices = vec![
            offset,
            offset + DVec3::X,
            offset + DVec3::Y,
            offset + DVec3::Z,
        ];
        let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];
        let mesh = PolyhedronMesh::builder(vertices, faces)
            .recenter()
            .build()
            .expect("tetrahedron cooks");
        assert_relative_eq!(mesh.centroid().length(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn zero_area_face_is_rejected() {
        let vertices = vec![
            DVec3::ZERO,
            DVec3::X,
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::Z,
        ];
        let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];
        assert!(PolyhedronMesh::builder(vertices, faces).build().is_err());
    }

    fn offset_tetrahedron() -> (Vec<DVec3>, Vec<Vec<u32>>) {
        let vertices = vec![
            DVec3::splat(1.0),
            DVec3::new(3.0, 1.0, 1.0),
            DVec3::new(1.0, 3.0, 1.0),
            DVec3::new(1.0, 1.0, 3.0),
        ];
        let faces = vec![vec![0, 2, 1], vec![0, 1, 3], vec![0, 3, 2], vec![1, 2, 3]];
        (vertices, faces)
    }

    #[test]
    fn tiny_weld_epsilon_keeps_distinct_vertices() {
        let (vertices, faces) = offset_tetrahedron();
        for epsilon in [1e-20, 1e-300, f64::MIN_POSITIVE, 1e-320] {
            let mesh = PolyhedronMesh::builder(vertices.clone(), faces.clone())
                .weld_vertices(epsilon)
                .build()
                .expect("no vertices merged");
            assert_eq!(mesh.nb_vertices(), 4);
        }
    }

    #[test]
    fn weld_merges_signed_zero() {
        let builder = PolyhedronMeshBuilder::new(vec![DVec3::ZERO, DVec3::splat(-0.0)], Vec::new())
            .weld_vertices(1e-3);
        assert_eq!(builder.vertices.len(), 1);
    }

    #[test]
    fn stored_meshes_are_cooked_again() {
        let mesh = PolyhedronMesh::cuboid(DVec3::new(1.0, 2.0, 3.0)).expect("cube cooks");
        let data = PolyhedronMeshData::from(mesh.clone());
        assert_eq!(data.faces.len(), 6);
        let restored = PolyhedronMesh::try_from(data).expect("stored cube cooks");
        assert_eq!(restored.vertices(), mesh.vertices());
        assert_eq!(restored.structure(), mesh.structure());

        // A stored mesh with a face dropped is open and must not load.
        let (vertices, mut faces) = offset_tetrahedron();
        faces.pop();
        let err = PolyhedronMesh::try_from(PolyhedronMeshData { vertices, faces }).unwrap_err();
        assert!(matches!(err, CollisionError::Mesh(MeshError::MissingTwin { .. })));
    }

    #[test]
    fn aabb_overlap_and_containment() {
        let a = Aabb::new(DVec3::ZERO, DVec3::ONE);
        let b = Aabb::new(DVec3::splat(0.5), DVec3::splat(2.0));
        let c = Aabb::new(DVec3::splat(1.5), DVec3::splat(2.0));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert!(a.contains_point(DVec3::splat(0.25)));
        assert_eq!(a.inflate(0.5).extent(), DVec3::ONE);
    }
}
