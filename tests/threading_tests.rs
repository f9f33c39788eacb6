use std::sync::Arc;
use std::thread;

use convex_contact::{
    report_contacts, BodySide, CollisionCallback, CollisionCallbackInfo, CollisionShape,
    ConvexPolyhedronShape, GjkAlgorithm, Handle, NarrowPhase, NarrowPhaseConfig, OverlappingPair,
    PolyhedronMesh, PoolAllocator, ProxyShape, Transform,
};
use glam::{DQuat, DVec3};

#[test]
fn shared_types_are_send_and_sync() {
    fn assert_sync_send<T: Sync + Send>() {}
    assert_sync_send::<PoolAllocator>();
    assert_sync_send::<PolyhedronMesh>();
    assert_sync_send::<CollisionShape>();
    assert_sync_send::<OverlappingPair>();
}

#[test]
fn pool_serves_concurrent_threads() {
    let pool = Arc::new(PoolAllocator::default());
    let handles: Vec<_> = (0..4)
        .map(|t| {
            let pool = Arc::clone(&pool);
            thread::spawn(move || {
                for round in 0..200 {
                    let size = 16 + (t * 31 + round * 7) % 500;
                    let block = pool.allocate(size).unwrap();
                    // SAFETY: the block spans `size` writable bytes.
                    unsafe { std::ptr::write_bytes(block.as_ptr().as_ptr(), t as u8, size) };
                    pool.release(block, size).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }
    assert_eq!(pool.outstanding(), 0);
}

#[test]
fn shared_mesh_queries_agree_across_threads() {
    let mesh = Arc::new(PolyhedronMesh::cuboid(DVec3::ONE).unwrap());
    let expected = {
        let shape = ConvexPolyhedronShape::new(Arc::clone(&mesh));
        let b = Transform::from_position(DVec3::new(3.5, 0.0, 0.0));
        GjkAlgorithm::compute(&shape, &Transform::IDENTITY, &shape, &b, &NarrowPhaseConfig::default())
            .separation()
            .map(|s| s.distance)
            .unwrap()
    };

    let handles: Vec<_> = (0..4)
        .map(|t| {
            let mesh = Arc::clone(&mesh);
            thread::spawn(move || {
                let shape = ConvexPolyhedronShape::new(mesh);
                let angle = t as f64 * 0.5;
                let a = Transform::new(DVec3::ZERO, DQuat::from_rotation_x(angle));
                let b = Transform::new(DVec3::new(3.5, 0.0, 0.0), DQuat::from_rotation_x(-angle));
                GjkAlgorithm::compute(&shape, &a, &shape, &b, &NarrowPhaseConfig::default())
                    .separation()
                    .map(|s| s.distance)
            })
        })
        .collect();
    for handle in handles {
        let distance = handle.join().unwrap().expect("cubes stay apart");
        approx::assert_relative_eq!(distance, expected, epsilon = 1e-6);
    }
}

struct Counter(usize);

impl CollisionCallback for Counter {
    fn notify_contact(&mut self, info: &CollisionCallbackInfo<'_>) {
        self.0 += info.elements(BodySide::Second).count();
    }
}

#[test]
fn parallel_batch_then_callbacks() {
    let mesh = Arc::new(PolyhedronMesh::cuboid(DVec3::splat(0.5)).unwrap());
    let shape: Arc<CollisionShape> = Arc::new(ConvexPolyhedronShape::new(mesh).into());
    let mut pairs: Vec<OverlappingPair> = (0..64u32)
        .map(|i| {
            let x = if i % 2 == 0 { 1.05 } else { 3.0 };
            OverlappingPair::new(
                ProxyShape::new(Handle::from_index(2 * i), Handle::from_index(2 * i), Arc::clone(&shape), Transform::IDENTITY),
                ProxyShape::new(
                    Handle::from_index(2 * i + 1),
                    Handle::from_index(2 * i + 1),
                    Arc::clone(&shape),
                    Transform::from_position(DVec3::new(x, 0.0, 0.0)),
                ),
            )
        })
        .collect();

    NarrowPhase::test_pairs(&mut pairs, &NarrowPhaseConfig::default());
    let pool = PoolAllocator::default();
    let mut counter = Counter(0);
    let reported = report_contacts(&pairs, &pool, &mut counter).unwrap();
    assert_eq!(reported, 32);
    assert_eq!(counter.0, 32);
    assert_eq!(pool.outstanding(), 0);
}
