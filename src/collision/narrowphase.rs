//! Support-mapping narrow phase.
//!
//! [`GjkAlgorithm`] runs the Gilbert-Johnson-Keerthi distance loop on the
//! margin-less cores of two convex shapes. The simplex lives on the stack for
//! the duration of one query and stores, for each Minkowski-difference point,
//! the local witness points on both shapes so that closest points can be
//! recovered from the barycentric weights of the final simplex.
//!
//! Margins are applied afterwards: cores further apart than the summed margins
//! are separated, otherwise the shapes touch and the shallow contact is
//! reported. Deep core penetration carries no contact data.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::pair::OverlappingPair;
use super::shapes::{PointShape, SupportHint, SupportMap};
use crate::{
    config::NarrowPhaseConfig,
    core::Transform,
    error::{CollisionError, Result},
    utils::logging::ScopedTimer,
};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Relative volume (or area) below which a simplex counts as flat.
const FLAT_TOLERANCE: f64 = 1e-12;

/// Why a query ended without a trustworthy answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DegenerateReason {
    /// A new support point coincides with one already in the simplex.
    CoincidentSupport,
    /// The simplex collapsed to lower dimension (collinear or coplanar points).
    FlatSimplex,
    /// The iteration cap was reached before convergence.
    IterationLimit,
}

/// Closest features of two separated shapes, in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeparationInfo {
    pub distance: f64,
    pub point_a: DVec3,
    pub point_b: DVec3,
    /// Unit vector from A towards B.
    pub normal: DVec3,
}

/// Contact between margin-inflated shapes whose cores are disjoint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MarginContact {
    /// Unit vector from A towards B.
    pub normal: DVec3,
    pub depth: f64,
    pub point_a: DVec3,
    pub point_b: DVec3,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct IntersectionInfo {
    /// `None` when the cores themselves overlap.
    pub margin_contact: Option<MarginContact>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GjkOutcome {
    Separated(SeparationInfo),
    Intersecting(IntersectionInfo),
    Degenerate(DegenerateReason),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GjkResult {
    pub outcome: GjkOutcome,
    pub iterations: usize,
}

impl GjkResult {
    pub fn is_intersecting(&self) -> bool {
        matches!(self.outcome, GjkOutcome::Intersecting(_))
    }

    pub fn separation(&self) -> Option<&SeparationInfo> {
        match &self.outcome {
            GjkOutcome::Separated(info) => Some(info),
            _ => None,
        }
    }
}

/// One vertex of the Minkowski difference with its local witnesses.
#[derive(Debug, Clone, Copy, Default)]
struct SupportPoint {
    w: DVec3,
    local_a: DVec3,
    local_b: DVec3,
}

#[derive(Debug, Clone, Copy, Default)]
struct Simplex {
    points: [SupportPoint; 4],
    weights: [f64; 4],
    len: usize,
}

enum Closest {
    Point(DVec3),
    ContainsOrigin,
    Flat,
}

impl Simplex {
    fn push(&mut self, point: SupportPoint) {
        self.points[self.len] = point;
        self.weights[self.len] = 0.0;
        self.len += 1;
    }

    /// Squared length of the simplex point farthest from the origin; the
    /// touching test is taken relative to it.
    fn max_norm_squared(&self) -> f64 {
        self.points[..self.len]
            .iter()
            .map(|p| p.w.length_squared())
            .fold(0.0, f64::max)
    }

    fn contains(&self, w: DVec3) -> bool {
        self.points[..self.len].iter().any(|p| p.w == w)
    }

    /// Keeps only the listed points with the given weights.
    fn retain(&mut self, indices: &[usize], weights: &[f64]) -> DVec3 {
        let old = self.points;
        let mut v = DVec3::ZERO;
        for (slot, (&index, &weight)) in indices.iter().zip(weights).enumerate() {
            self.points[slot] = old[index];
            self.weights[slot] = weight;
            v += old[index].w * weight;
        }
        self.len = indices.len();
        v
    }

    /// Replaces the simplex by the smallest sub-simplex supporting the point
    /// closest to the origin.
    fn reduce(&mut self) -> Closest {
        match self.len {
            1 => Closest::Point(self.retain(&[0], &[1.0])),
            2 => self.reduce_segment(0, 1),
            3 => self.reduce_triangle(0, 1, 2),
            _ => self.reduce_tetrahedron(),
        }
    }

    fn reduce_segment(&mut self, i: usize, j: usize) -> Closest {
        match segment_closest(self.points[i].w, self.points[j].w) {
            Some(t) if t <= 0.0 => Closest::Point(self.retain(&[i], &[1.0])),
            Some(t) if t >= 1.0 => Closest::Point(self.retain(&[j], &[1.0])),
            Some(t) => Closest::Point(self.retain(&[i, j], &[1.0 - t, t])),
            None => Closest::Flat,
        }
    }

    fn reduce_triangle(&mut self, i: usize, j: usize, k: usize) -> Closest {
        let region = triangle_closest(self.points[i].w, self.points[j].w, self.points[k].w);
        self.apply_region(region, [i, j, k])
    }

    fn apply_region(&mut self, region: TriangleRegion, [i, j, k]: [usize; 3]) -> Closest {
        let v = match region {
            TriangleRegion::Vertex(0) => self.retain(&[i], &[1.0]),
            TriangleRegion::Vertex(1) => self.retain(&[j], &[1.0]),
            TriangleRegion::Vertex(_) => self.retain(&[k], &[1.0]),
            TriangleRegion::Edge(0, t) => self.retain(&[i, j], &[1.0 - t, t]),
            TriangleRegion::Edge(1, t) => self.retain(&[i, k], &[1.0 - t, t]),
            TriangleRegion::Edge(_, t) => self.retain(&[j, k], &[1.0 - t, t]),
            TriangleRegion::Face(u, v, w) => self.retain(&[i, j, k], &[u, v, w]),
            TriangleRegion::Flat => return Closest::Flat,
        };
        Closest::Point(v)
    }

    fn reduce_tetrahedron(&mut self) -> Closest {
        let [a, b, c, d] = [
            self.points[0].w,
            self.points[1].w,
            self.points[2].w,
            self.points[3].w,
        ];
        let volume = (b - a).dot((c - a).cross(d - a));
        let scale = (b - a).length() * (c - a).length() * (d - a).length();
        if volume.abs() <= FLAT_TOLERANCE * scale {
            return Closest::Flat;
        }

        // Each face with the vertex opposite to it.
        let faces = [([0, 1, 2], 3), ([0, 2, 3], 1), ([0, 3, 1], 2), ([1, 3, 2], 0)];
        let mut best: Option<(f64, TriangleRegion, [usize; 3])> = None;
        for (face, opposite) in faces {
            let [p, q, r] = face.map(|index| self.points[index].w);
            if !origin_outside_plane(p, q, r, self.points[opposite].w) {
                continue;
            }
            let region = triangle_closest(p, q, r);
            let Some(point) = region.point(p, q, r) else {
                return Closest::Flat;
            };
            let distance = point.length_squared();
            if best.as_ref().map_or(true, |(d, _, _)| distance < *d) {
                best = Some((distance, region, face));
            }
        }

        match best {
            None => Closest::ContainsOrigin,
            Some((_, region, face)) => self.apply_region(region, face),
        }
    }

    /// Closest points on both shapes (local space) from the current weights.
    fn witnesses(&self) -> (DVec3, DVec3) {
        self.points[..self.len]
            .iter()
            .zip(&self.weights[..self.len])
            .fold((DVec3::ZERO, DVec3::ZERO), |(a, b), (p, &weight)| {
                (a + p.local_a * weight, b + p.local_b * weight)
            })
    }
}

/// Parameter of the origin's projection onto segment `a b`; `None` when the
/// segment has no length.
fn segment_closest(a: DVec3, b: DVec3) -> Option<f64> {
    let ab = b - a;
    let len_sq = ab.length_squared();
    if len_sq <= f64::MIN_POSITIVE {
        return None;
    }
    Some((-a).dot(ab) / len_sq)
}

#[derive(Debug, Clone, Copy)]
enum TriangleRegion {
    /// 0 = a, 1 = b, 2 = c.
    Vertex(u8),
    /// 0 = ab, 1 = ac, 2 = bc, with the parameter along the edge.
    Edge(u8, f64),
    Face(f64, f64, f64),
    Flat,
}

impl TriangleRegion {
    fn point(&self, a: DVec3, b: DVec3, c: DVec3) -> Option<DVec3> {
        Some(match *self {
            TriangleRegion::Vertex(0) => a,
            TriangleRegion::Vertex(1) => b,
            TriangleRegion::Vertex(_) => c,
            TriangleRegion::Edge(0, t) => a + (b - a) * t,
            TriangleRegion::Edge(1, t) => a + (c - a) * t,
            TriangleRegion::Edge(_, t) => b + (c - b) * t,
            TriangleRegion::Face(u, v, w) => a * u + b * v + c * w,
            TriangleRegion::Flat => return None,
        })
    }
}

/// Voronoi-region test of the origin against triangle `a b c`.
fn triangle_closest(a: DVec3, b: DVec3, c: DVec3) -> TriangleRegion {
    let ab = b - a;
    let ac = c - a;

    let d1 = ab.dot(-a);
    let d2 = ac.dot(-a);
    if d1 <= 0.0 && d2 <= 0.0 {
        return TriangleRegion::Vertex(0);
    }

    let d3 = ab.dot(-b);
    let d4 = ac.dot(-b);
    if d3 >= 0.0 && d4 <= d3 {
        return TriangleRegion::Vertex(1);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        return TriangleRegion::Edge(0, d1 / (d1 - d3));
    }

    let d5 = ab.dot(-c);
    let d6 = ac.dot(-c);
    if d6 >= 0.0 && d5 <= d6 {
        return TriangleRegion::Vertex(2);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        return TriangleRegion::Edge(1, d2 / (d2 - d6));
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        return TriangleRegion::Edge(2, (d4 - d3) / ((d4 - d3) + (d5 - d6)));
    }

    // va + vb + vc is |ab x ac|^2.
    let area_sq = va + vb + vc;
    if area_sq <= FLAT_TOLERANCE * ab.length_squared() * ac.length_squared() {
        return TriangleRegion::Flat;
    }
    let v = vb / area_sq;
    let w = vc / area_sq;
    TriangleRegion::Face(1.0 - v - w, v, w)
}

/// True when the origin and `d` lie strictly on opposite sides of plane `a b c`.
fn origin_outside_plane(a: DVec3, b: DVec3, c: DVec3, d: DVec3) -> bool {
    let normal = (b - a).cross(c - a);
    let sign_origin = (-a).dot(normal);
    let sign_d = (d - a).dot(normal);
    sign_origin * sign_d < 0.0
}

/// GJK distance and intersection query between two convex shapes.
pub struct GjkAlgorithm;

impl GjkAlgorithm {
    pub fn compute<A, B>(
        shape_a: &A,
        transform_a: &Transform,
        shape_b: &B,
        transform_b: &Transform,
        config: &NarrowPhaseConfig,
    ) -> GjkResult
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let mut hint_a = SupportHint::default();
        let mut hint_b = SupportHint::default();
        let mut support = |direction: DVec3| {
            let local_a = shape_a.local_support_point_without_margin(
                transform_a.inverse_rotate(direction),
                &mut hint_a,
            );
            let local_b = shape_b.local_support_point_without_margin(
                transform_b.inverse_rotate(-direction),
                &mut hint_b,
            );
            SupportPoint {
                w: transform_a.transform_point(local_a) - transform_b.transform_point(local_b),
                local_a,
                local_b,
            }
        };

        let initial = (transform_b.position - transform_a.position)
            .try_normalize()
            .unwrap_or(DVec3::X);

        let mut simplex = Simplex::default();
        simplex.push(support(initial));
        let mut v = simplex.retain(&[0], &[1.0]);

        let finish = |outcome, iterations| GjkResult {
            outcome,
            iterations,
        };

        for iteration in 1..=config.max_iterations {
            let vv = v.length_squared();
            if vv <= config.touching_tolerance * simplex.max_norm_squared() {
                return finish(GjkOutcome::Intersecting(IntersectionInfo::default()), iteration);
            }

            let w = support(-v);
            if vv - v.dot(w.w) <= config.relative_tolerance * vv {
                let outcome = Self::separated(&simplex, transform_a, transform_b, shape_a, shape_b, config);
                return finish(outcome, iteration);
            }
            if simplex.contains(w.w) {
                return finish(
                    GjkOutcome::Degenerate(DegenerateReason::CoincidentSupport),
                    iteration,
                );
            }

            simplex.push(w);
            match simplex.reduce() {
                Closest::ContainsOrigin => {
                    return finish(GjkOutcome::Intersecting(IntersectionInfo::default()), iteration);
                }
                Closest::Flat => {
                    return finish(GjkOutcome::Degenerate(DegenerateReason::FlatSimplex), iteration);
                }
                Closest::Point(closest) => {
                    let closest_sq = closest.length_squared();
                    if closest_sq <= config.touching_tolerance * simplex.max_norm_squared() {
                        return finish(
                            GjkOutcome::Intersecting(IntersectionInfo::default()),
                            iteration,
                        );
                    }
                    v = closest;
                    if closest_sq >= vv {
                        // No progress: the distance is as small as it gets.
                        let outcome = Self::separated(
                            &simplex,
                            transform_a,
                            transform_b,
                            shape_a,
                            shape_b,
                            config,
                        );
                        return finish(outcome, iteration);
                    }
                }
            }
        }

        finish(
            GjkOutcome::Degenerate(DegenerateReason::IterationLimit),
            config.max_iterations,
        )
    }

    fn separated<A, B>(
        simplex: &Simplex,
        transform_a: &Transform,
        transform_b: &Transform,
        shape_a: &A,
        shape_b: &B,
        config: &NarrowPhaseConfig,
    ) -> GjkOutcome
    where
        A: SupportMap + ?Sized,
        B: SupportMap + ?Sized,
    {
        let (local_a, local_b) = simplex.witnesses();
        let core_a = transform_a.transform_point(local_a);
        let core_b = transform_b.transform_point(local_b);
        let offset = core_b - core_a;
        let core_distance = offset.length();
        let normal = offset / core_distance;

        let (margin_a, margin_b) = if config.use_margins {
            (shape_a.margin(), shape_b.margin())
        } else {
            (0.0, 0.0)
        };
        let point_a = core_a + normal * margin_a;
        let point_b = core_b - normal * margin_b;
        let margins = margin_a + margin_b;

        if core_distance > margins {
            GjkOutcome::Separated(SeparationInfo {
                distance: core_distance - margins,
                point_a,
                point_b,
                normal,
            })
        } else {
            GjkOutcome::Intersecting(IntersectionInfo {
                margin_contact: Some(MarginContact {
                    normal,
                    depth: margins - core_distance,
                    point_a,
                    point_b,
                }),
            })
        }
    }

    /// Whether `point` lies inside `shape` (both in the shape's local frame).
    ///
    /// The point is a zero-extent shape; touching the surface counts as inside.
    pub fn test_point_inside<S>(shape: &S, point: DVec3, config: &NarrowPhaseConfig) -> Result<bool>
    where
        S: SupportMap + ?Sized,
    {
        let result = Self::compute(
            shape,
            &Transform::IDENTITY,
            &PointShape,
            &Transform::from_position(point),
            config,
        );
        match result.outcome {
            GjkOutcome::Intersecting(_) => Ok(true),
            GjkOutcome::Separated(_) => Ok(false),
            GjkOutcome::Degenerate(reason) => Err(CollisionError::Degenerate(reason)),
        }
    }
}

/// Runs GJK over overlapping pairs and keeps their manifold sets current.
pub struct NarrowPhase;

impl NarrowPhase {
    /// Tests one pair. Margin contacts are added to the pair's manifold set,
    /// separation clears it; deep and degenerate results leave it untouched.
    pub fn test_pair(pair: &mut OverlappingPair, config: &NarrowPhaseConfig) -> GjkResult {
        let proxy_a = &pair.proxy_a;
        let proxy_b = &pair.proxy_b;
        let result = GjkAlgorithm::compute(
            proxy_a.shape.as_ref(),
            &proxy_a.transform,
            proxy_b.shape.as_ref(),
            &proxy_b.transform,
            config,
        );

        match result.outcome {
            GjkOutcome::Separated(_) => pair.manifold_set.clear(),
            GjkOutcome::Intersecting(IntersectionInfo {
                margin_contact: Some(contact),
            }) => {
                let point = super::contact::ContactPoint {
                    local_point_a: proxy_a.transform.inverse_transform_point(contact.point_a),
                    local_point_b: proxy_b.transform.inverse_transform_point(contact.point_b),
                    normal: contact.normal,
                    penetration_depth: contact.depth,
                };
                pair.manifold_set.add_contact_point(point);
            }
            GjkOutcome::Intersecting(_) => {
                log::trace!(
                    "pair {:?}/{:?}: cores overlap, no shallow contact",
                    pair.proxy_a.id,
                    pair.proxy_b.id
                );
            }
            GjkOutcome::Degenerate(reason) => {
                log::debug!(
                    "pair {:?}/{:?} ({} vs {}): degenerate narrow phase ({reason:?}) after {} iterations",
                    pair.proxy_a.id,
                    pair.proxy_b.id,
                    pair.proxy_a.shape.name(),
                    pair.proxy_b.shape.name(),
                    result.iterations
                );
            }
        }
        result
    }

    /// Tests every pair; pairs are independent, so the batch runs on the rayon
    /// pool when the `parallel` feature is on.
    pub fn test_pairs(pairs: &mut [OverlappingPair], config: &NarrowPhaseConfig) -> Vec<GjkResult> {
        let _timer = ScopedTimer::with_items("narrowphase::test_pairs", pairs.len());

        #[cfg(feature = "parallel")]
        let results: Vec<GjkResult> = pairs
            .par_iter_mut()
            .map(|pair| Self::test_pair(pair, config))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let results: Vec<GjkResult> = pairs
            .iter_mut()
            .map(|pair| Self::test_pair(pair, config))
            .collect();

        results
    }
}
