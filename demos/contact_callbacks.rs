//! Runs the narrow phase over a row of boxes and prints the per-body
//! manifold chains handed to the collision callback.

use std::sync::Arc;

use convex_contact::*;

struct PrintContacts;

impl CollisionCallback for PrintContacts {
    fn notify_contact(&mut self, info: &CollisionCallbackInfo<'_>) {
        for side in BodySide::BOTH {
            let body = info.body(side);
            for element in info.elements(side) {
                let manifold = element.manifold();
                println!(
                    "body {:>2} ({side:?}): {} point(s), normal {}",
                    body.index(),
                    manifold.nb_contact_points(),
                    manifold.normal()
                );
            }
        }
    }
}

fn main() -> Result<()> {
    let mesh = Arc::new(PolyhedronMesh::cuboid(DVec3::splat(0.5))?);
    let shape: Arc<CollisionShape> = Arc::new(ConvexPolyhedronShape::new(mesh).into());

    let proxies: Vec<ProxyShape> = (0..6u32)
        .map(|i| {
            ProxyShape::new(
                Handle::from_index(i),
                Handle::from_index(i),
                Arc::clone(&shape),
                Transform::from_position(DVec3::new(i as f64 * 1.05, 0.0, 0.0)),
            )
        })
        .collect();

    let mut pairs: Vec<OverlappingPair> = proxies
        .windows(2)
        .map(|w| OverlappingPair::new(w[0].clone(), w[1].clone()))
        .filter(OverlappingPair::bounds_overlap)
        .collect();

    let config = NarrowPhaseConfig::default();
    let results = NarrowPhase::test_pairs(&mut pairs, &config);
    for (pair, result) in pairs.iter().zip(&results) {
        println!("{:?}: {:?}", pair.key(), result.outcome);
    }

    let pool = PoolAllocator::default();
    let reported = report_contacts(&pairs, &pool, &mut PrintContacts)?;
    let stats = pool.stats();
    println!(
        "{reported} pair(s) reported; pool holds {} bytes in {} chunk(s), {} outstanding",
        stats.reserved_bytes, stats.chunks, stats.outstanding
    );
    Ok(())
}
