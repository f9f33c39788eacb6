//! Half-edge topology of a closed convex polyhedron.
//!
//! Every directed edge of every face becomes one [`HalfEdge`] that knows its
//! origin vertex, the face it bounds, the next half-edge around that face and
//! its twin running the opposite way on the neighbouring face. That gives O(1)
//! adjacency queries, which the support-mapping hill climb relies on.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::error::MeshError;

/// Vertex record: index of its position plus one outgoing half-edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfEdgeVertex {
    pub point_index: usize,
    pub edge_index: usize,
}

/// Face record: the half-edges bounding the face, in winding order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfEdgeFace {
    pub edges: Vec<usize>,
}

impl HalfEdgeFace {
    pub fn degree(&self) -> usize {
        self.edges.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HalfEdge {
    /// Vertex the half-edge starts from.
    pub vertex_index: usize,
    pub twin_edge_index: usize,
    pub next_edge_index: usize,
    pub face_index: usize,
}

/// Immutable half-edge structure, built once per mesh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HalfEdgeStructure {
    vertices: Vec<HalfEdgeVertex>,
    faces: Vec<HalfEdgeFace>,
    edges: Vec<HalfEdge>,
}

impl HalfEdgeStructure {
    /// Builds the structure from polygonal faces wound counter-clockwise when
    /// seen from outside.
    ///
    /// Structural errors (open or non-manifold meshes, bad indices) are always
    /// reported. The full invariant walk of [`Self::validate`] only runs in
    /// debug builds.
    pub fn build(vertex_count: usize, faces: &[Vec<usize>]) -> Result<Self, MeshError> {
        if vertex_count < 4 {
            return Err(MeshError::TooFewVertices {
                count: vertex_count,
            });
        }

        let edge_count: usize = faces.iter().map(Vec::len).sum();
        let mut edges: Vec<HalfEdge> = Vec::with_capacity(edge_count);
        let mut directed: HashMap<(usize, usize), usize> = HashMap::with_capacity(edge_count);
        let mut half_edge_faces = Vec::with_capacity(faces.len());

        for (face_index, face) in faces.iter().enumerate() {
            let degree = face.len();
            if degree < 3 {
                return Err(MeshError::FaceTooSmall { face: face_index });
            }
            if let Some(&vertex) = face.iter().find(|&&v| v >= vertex_count) {
                return Err(MeshError::IndexOutOfRange {
                    face: face_index,
                    vertex,
                    count: vertex_count,
                });
            }

            let first = edges.len();
            for i in 0..degree {
                let from = face[i];
                let to = face[(i + 1) % degree];
                if from == to {
                    return Err(MeshError::FaceTooSmall { face: face_index });
                }
                if directed.insert((from, to), first + i).is_some() {
                    return Err(MeshError::DuplicateEdge { from, to });
                }
                edges.push(HalfEdge {
                    vertex_index: from,
                    twin_edge_index: usize::MAX,
                    next_edge_index: first + (i + 1) % degree,
                    face_index,
                });
            }
            half_edge_faces.push(HalfEdgeFace {
                edges: (first..first + degree).collect(),
            });
        }

        for index in 0..edges.len() {
            let from = edges[index].vertex_index;
            let to = edges[edges[index].next_edge_index].vertex_index;
            let twin = directed
                .get(&(to, from))
                .copied()
                .ok_or(MeshError::MissingTwin { from, to })?;
            edges[index].twin_edge_index = twin;
        }

        let mut outgoing: Vec<Option<usize>> = vec![None; vertex_count];
        for (index, edge) in edges.iter().enumerate() {
            outgoing[edge.vertex_index].get_or_insert(index);
        }
        let vertices = outgoing
            .into_iter()
            .enumerate()
            .map(|(vertex, edge)| {
                edge.map(|edge_index| HalfEdgeVertex {
                    point_index: vertex,
                    edge_index,
                })
                .ok_or(MeshError::IsolatedVertex { vertex })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let structure = Self {
            vertices,
            faces: half_edge_faces,
            edges,
        };

        if cfg!(debug_assertions) {
            structure.validate()?;
        }

        Ok(structure)
    }

    /// Checks twin symmetry, face cycles and vertex rings.
    pub fn validate(&self) -> Result<(), MeshError> {
        for (index, edge) in self.edges.iter().enumerate() {
            let twin = self
                .edges
                .get(edge.twin_edge_index)
                .ok_or_else(|| MeshError::BrokenInvariant(format!("edge {index} has no twin")))?;
            if twin.twin_edge_index != index || edge.twin_edge_index == index {
                return Err(MeshError::BrokenInvariant(format!(
                    "twin of twin of edge {index} is {}",
                    twin.twin_edge_index
                )));
            }
            if twin.vertex_index != self.edge_destination(index) {
                return Err(MeshError::BrokenInvariant(format!(
                    "twin of edge {index} does not start at its destination"
                )));
            }
        }

        for (face_index, face) in self.faces.iter().enumerate() {
            let Some(&start) = face.edges.first() else {
                return Err(MeshError::BrokenInvariant(format!("face {face_index} is empty")));
            };
            let mut current = start;
            for step in 0..face.degree() {
                if self.edges[current].face_index != face_index || face.edges[step] != current {
                    return Err(MeshError::BrokenInvariant(format!(
                        "face {face_index} cycle leaves the face at step {step}"
                    )));
                }
                current = self.edges[current].next_edge_index;
            }
            if current != start {
                return Err(MeshError::BrokenInvariant(format!(
                    "face {face_index} cycle does not close after {} steps",
                    face.degree()
                )));
            }
        }

        let mut outgoing_counts = vec![0usize; self.vertices.len()];
        for edge in &self.edges {
            outgoing_counts[edge.vertex_index] += 1;
        }
        for (vertex, record) in self.vertices.iter().enumerate() {
            let mut ring = 0;
            let mut current = record.edge_index;
            loop {
                if self.edges[current].vertex_index != vertex {
                    return Err(MeshError::BrokenInvariant(format!(
                        "ring of vertex {vertex} reaches edge {current} from another vertex"
                    )));
                }
                ring += 1;
                if ring > outgoing_counts[vertex] {
                    return Err(MeshError::BrokenInvariant(format!(
                        "ring of vertex {vertex} does not close"
                    )));
                }
                current = self.edges[self.edges[current].twin_edge_index].next_edge_index;
                if current == record.edge_index {
                    break;
                }
            }
            if ring != outgoing_counts[vertex] {
                return Err(MeshError::BrokenInvariant(format!(
                    "vertex {vertex} has {} outgoing edges but its ring visits {ring}",
                    outgoing_counts[vertex]
                )));
            }
        }

        Ok(())
    }

    pub fn nb_vertices(&self) -> usize {
        self.vertices.len()
    }

    pub fn nb_faces(&self) -> usize {
        self.faces.len()
    }

    pub fn nb_half_edges(&self) -> usize {
        self.edges.len()
    }

    pub fn vertex(&self, index: usize) -> &HalfEdgeVertex {
        &self.vertices[index]
    }

    pub fn face(&self, index: usize) -> &HalfEdgeFace {
        &self.faces[index]
    }

    pub fn half_edge(&self, index: usize) -> &HalfEdge {
        &self.edges[index]
    }

    pub fn faces(&self) -> &[HalfEdgeFace] {
        &self.faces
    }

    pub fn edge_destination(&self, edge: usize) -> usize {
        self.edges[self.edges[edge].next_edge_index].vertex_index
    }

    /// Vertices of a face, in winding order.
    pub fn face_vertices(&self, face: usize) -> impl Iterator<Item = usize> + '_ {
        self.faces[face]
            .edges
            .iter()
            .map(move |&edge| self.edges[edge].vertex_index)
    }

    /// Half-edges leaving `vertex`, walked through `twin -> next`.
    pub fn outgoing_edges(&self, vertex: usize) -> OutgoingEdges<'_> {
        let start = self.vertices[vertex].edge_index;
        OutgoingEdges {
            structure: self,
            start,
            current: Some(start),
            remaining: self.edges.len(),
        }
    }

    pub fn vertex_neighbors(&self, vertex: usize) -> impl Iterator<Item = usize> + '_ {
        self.outgoing_edges(vertex)
            .map(move |edge| self.edge_destination(edge))
    }
}

/// Iterator over the ring of half-edges leaving one vertex.
pub struct OutgoingEdges<'a> {
    structure: &'a HalfEdgeStructure,
    start: usize,
    current: Option<usize>,
    remaining: usize,
}

impl Iterator for OutgoingEdges<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        let edge = self.current?;
        if self.remaining == 0 {
            self.current = None;
            return None;
        }
        self.remaining -= 1;
        let edges = &self.structure.edges;
        let following = edges[edges[edge].twin_edge_index].next_edge_index;
        self.current = (following != self.start).then_some(following);
        Some(edge)
    }
}
