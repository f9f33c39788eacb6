//! Cooks a hull from a triangle soup and runs the basic queries against it.

use std::sync::Arc;

use convex_contact::*;

fn main() -> Result<()> {
    // Two triangles per face of a 2 x 1 x 1 box, with duplicated corners.
    let corners = PolyhedronMesh::cuboid(DVec3::new(1.0, 0.5, 0.5))?;
    let mut vertices = Vec::new();
    let mut triangles = Vec::new();
    for face in 0..corners.nb_faces() {
        let ring: Vec<DVec3> = corners
            .structure()
            .face_vertices(face)
            .map(|v| corners.vertex(v))
            .collect();
        for tri in [[0, 1, 2], [0, 2, 3]] {
            let base = vertices.len() as u32;
            vertices.extend(tri.iter().map(|&i| ring[i]));
            triangles.push([base, base + 1, base + 2]);
        }
    }

    let mesh = Arc::new(
        PolyhedronMeshBuilder::from_triangles(vertices, triangles)
            .weld_vertices(1e-6)
            .build()?,
    );
    println!(
        "hull: {} vertices, {} faces, {} half-edges",
        mesh.nb_vertices(),
        mesh.nb_faces(),
        mesh.structure().nb_half_edges()
    );

    let mut hull = ConvexPolyhedronShape::new(Arc::clone(&mesh));
    hull.set_edge_hill_climbing(true);
    let inertia = hull.local_inertia_tensor(2.0)?;
    println!("inertia (mass 2): {inertia:?}");

    let direction = DVec3::new(1.0, 1.0, -1.0);
    println!("support {direction}: {}", hull.support_point(direction, false)?);

    for point in [DVec3::ZERO, DVec3::new(0.9, 0.4, 0.0), DVec3::new(1.5, 0.0, 0.0)] {
        println!("inside {point}: {}", hull.test_point_inside(point)?);
    }

    let ray = RaycastQuery::new(DVec3::new(-5.0, 0.1, 0.0), DVec3::X, 20.0);
    match Raycast::cast_shape(&ray, &CollisionShape::from(hull.clone()), &Transform::IDENTITY) {
        Some(hit) => println!("ray hit at {} (distance {:.3})", hit.point, hit.distance),
        None => println!("ray missed"),
    }

    let other = Transform::new(DVec3::new(2.5, 0.2, 0.0), DQuat::from_rotation_z(0.4));
    let result = GjkAlgorithm::compute(
        &hull,
        &Transform::IDENTITY,
        &SphereShape::new(0.5),
        &other,
        &NarrowPhaseConfig::default(),
    );
    println!("gjk after {} iterations: {:?}", result.iterations, result.outcome);
    Ok(())
}
