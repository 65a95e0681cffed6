//! Ray-occlusion queries against a layer-filtered collider scene.
//!
//! The placement core only needs one question answered: "what lies on the
//! segment between a camera and a joint". `OcclusionQuery` is that seam;
//! `Scene` is the in-crate implementation over spheres and axis-aligned boxes.

use nalgebra::Vector3;

/// Bit mask of collider layers a query considers.
pub type LayerMask = u32;

pub const ALL_LAYERS: LayerMask = u32::MAX;

const PARALLEL_EPS: f32 = 1e-8;

/// Identity of a scene object. Tracked joints use the same id space so a ray
/// hitting the joint's own collider is recognised as "the joint itself".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u32);

/// A single ray intersection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    pub distance: f32,
    pub object: ObjectId,
}

pub trait OcclusionQuery {
    /// All intersections along the ray within `max_distance`, sorted by
    /// distance. `direction` must be normalized. Colliders that contain the
    /// origin are not reported.
    fn ray_cast_all(
        &self,
        origin: &Vector3<f32>,
        direction: &Vector3<f32>,
        max_distance: f32,
        layer_mask: LayerMask,
    ) -> Vec<RayHit>;

    /// Nearest intersection only.
    fn ray_cast_first(
        &self,
        origin: &Vector3<f32>,
        direction: &Vector3<f32>,
        max_distance: f32,
        layer_mask: LayerMask,
    ) -> Option<RayHit> {
        self.ray_cast_all(origin, direction, max_distance, layer_mask)
            .into_iter()
            .next()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Shape {
    Sphere { center: Vector3<f32>, radius: f32 },
    Box { min: Vector3<f32>, max: Vector3<f32> },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    pub object: ObjectId,
    /// Layer index (0..32).
    pub layer: u8,
    pub shape: Shape,
}

impl Collider {
    pub fn sphere(object: ObjectId, center: Vector3<f32>, radius: f32) -> Self {
        Self { object, layer: 0, shape: Shape::Sphere { center, radius } }
    }

    /// Box from two opposite corners, in any order.
    pub fn cuboid(object: ObjectId, a: Vector3<f32>, b: Vector3<f32>) -> Self {
        Self {
            object,
            layer: 0,
            shape: Shape::Box { min: a.inf(&b), max: a.sup(&b) },
        }
    }

    pub fn on_layer(mut self, layer: u8) -> Self {
        self.layer = layer.min(31);
        self
    }

    pub fn layer_bit(&self) -> LayerMask {
        1u32 << self.layer.min(31)
    }

    /// Entry distance of the ray into this collider, if it is hit in front of
    /// the origin and no further than `max_distance`.
    pub fn ray_entry(
        &self,
        origin: &Vector3<f32>,
        direction: &Vector3<f32>,
        max_distance: f32,
    ) -> Option<f32> {
        let t = match &self.shape {
            Shape::Sphere { center, radius } => ray_sphere_entry(origin, direction, center, *radius)?,
            Shape::Box { min, max } => ray_box_entry(origin, direction, min, max)?,
        };
        (t <= max_distance).then_some(t)
    }
}

fn ray_sphere_entry(
    origin: &Vector3<f32>,
    direction: &Vector3<f32>,
    center: &Vector3<f32>,
    radius: f32,
) -> Option<f32> {
    let oc = origin - center;
    let c = oc.norm_squared() - radius * radius;
    if c <= 0.0 {
        return None;
    }
    let b = oc.dot(direction);
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let t = -b - disc.sqrt();
    (t >= 0.0).then_some(t)
}

/// Slab method. Returns the entry distance when the origin is outside the box.
fn ray_box_entry(
    origin: &Vector3<f32>,
    direction: &Vector3<f32>,
    min: &Vector3<f32>,
    max: &Vector3<f32>,
) -> Option<f32> {
    let inside = (0..3).all(|i| origin[i] >= min[i] && origin[i] <= max[i]);
    if inside {
        return None;
    }

    let mut tmin = f32::NEG_INFINITY;
    let mut tmax = f32::INFINITY;
    for i in 0..3 {
        let d = direction[i];
        if d.abs() < PARALLEL_EPS {
            // 平行: スラブの外側なら交差しない
            if origin[i] < min[i] || origin[i] > max[i] {
                return None;
            }
            continue;
        }
        let inv = 1.0 / d;
        let (t0, t1) = if inv >= 0.0 {
            ((min[i] - origin[i]) * inv, (max[i] - origin[i]) * inv)
        } else {
            ((max[i] - origin[i]) * inv, (min[i] - origin[i]) * inv)
        };
        tmin = tmin.max(t0);
        tmax = tmax.min(t1);
        if tmin > tmax {
            return None;
        }
    }

    (tmin >= 0.0).then_some(tmin)
}

/// Flat list of colliders. Queries are linear in the collider count.
#[derive(Debug, Clone, Default)]
pub struct Scene {
    colliders: Vec<Collider>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_colliders(colliders: Vec<Collider>) -> Self {
        Self { colliders }
    }

    pub fn extend<I: IntoIterator<Item = Collider>>(&mut self, colliders: I) {
        self.colliders.extend(colliders);
    }

    /// Copy of this scene with extra (per-frame) colliders appended.
    pub fn with_dynamic<I: IntoIterator<Item = Collider>>(&self, colliders: I) -> Scene {
        let mut scene = self.clone();
        scene.extend(colliders);
        scene
    }

    pub fn colliders(&self) -> &[Collider] {
        &self.colliders
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

impl OcclusionQuery for Scene {
    fn ray_cast_all(
        &self,
        origin: &Vector3<f32>,
        direction: &Vector3<f32>,
        max_distance: f32,
        layer_mask: LayerMask,
    ) -> Vec<RayHit> {
        let mut hits: Vec<RayHit> = self
            .colliders
            .iter()
            .filter(|c| c.layer_bit() & layer_mask != 0)
            .filter_map(|c| {
                c.ray_entry(origin, direction, max_distance)
                    .map(|distance| RayHit { distance, object: c.object })
            })
            .collect();
        hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        hits
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x_ray() -> (Vector3<f32>, Vector3<f32>) {
        (Vector3::new(-5.0, 0.0, 0.0), Vector3::new(1.0, 0.0, 0.0))
    }

    #[test]
    fn test_sphere_entry_distance() {
        let (o, d) = x_ray();
        let c = Collider::sphere(ObjectId(1), Vector3::zeros(), 1.0);
        let t = c.ray_entry(&o, &d, 100.0).unwrap();
        assert!((t - 4.0).abs() < 1e-5, "t={}", t);
        // 最大距離より手前で終わるレイは当たらない
        assert!(c.ray_entry(&o, &d, 3.5).is_none());
    }

    #[test]
    fn test_sphere_behind_and_inside() {
        let d = Vector3::new(1.0, 0.0, 0.0);
        let c = Collider::sphere(ObjectId(1), Vector3::zeros(), 1.0);
        assert!(c.ray_entry(&Vector3::new(5.0, 0.0, 0.0), &d, 100.0).is_none());
        assert!(c.ray_entry(&Vector3::new(0.5, 0.0, 0.0), &d, 100.0).is_none());
    }

    #[test]
    fn test_box_entry_and_miss() {
        let (o, d) = x_ray();
        let b = Collider::cuboid(ObjectId(2), Vector3::new(1.0, 1.0, 1.0), Vector3::new(-1.0, -1.0, -1.0));
        let t = b.ray_entry(&o, &d, 100.0).unwrap();
        assert!((t - 4.0).abs() < 1e-5, "t={}", t);

        let offset = Vector3::new(-5.0, 2.0, 0.0);
        assert!(b.ray_entry(&offset, &d, 100.0).is_none());
    }

    #[test]
    fn test_box_diagonal_ray() {
        let b = Collider::cuboid(ObjectId(2), Vector3::new(-1.0, -1.0, -1.0), Vector3::new(1.0, 1.0, 1.0));
        let o = Vector3::new(-3.0, -3.0, 0.0);
        let d = Vector3::new(1.0, 1.0, 0.0).normalize();
        let t = b.ray_entry(&o, &d, 100.0).unwrap();
        let expected = (2.0f32 * 2.0 + 2.0 * 2.0).sqrt();
        assert!((t - expected).abs() < 1e-4, "t={}", t);
    }

    #[test]
    fn test_scene_hits_sorted_and_layer_filtered() {
        let (o, d) = x_ray();
        let scene = Scene::with_colliders(vec![
            Collider::sphere(ObjectId(1), Vector3::new(2.0, 0.0, 0.0), 0.5),
            Collider::sphere(ObjectId(2), Vector3::new(-2.0, 0.0, 0.0), 0.5).on_layer(3),
            Collider::cuboid(ObjectId(3), Vector3::new(-0.2, -1.0, -1.0), Vector3::new(0.2, 1.0, 1.0)),
        ]);

        let hits = scene.ray_cast_all(&o, &d, 100.0, ALL_LAYERS);
        let ids: Vec<u32> = hits.iter().map(|h| h.object.0).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let hits = scene.ray_cast_all(&o, &d, 100.0, 1);
        let ids: Vec<u32> = hits.iter().map(|h| h.object.0).collect();
        assert_eq!(ids, vec![3, 1]);

        let first = scene.ray_cast_first(&o, &d, 100.0, 1).unwrap();
        assert_eq!(first.object, ObjectId(3));
    }

    #[test]
    fn test_with_dynamic_keeps_static() {
        let scene = Scene::with_colliders(vec![Collider::sphere(ObjectId(1), Vector3::zeros(), 1.0)]);
        let frame = scene.with_dynamic(vec![Collider::sphere(ObjectId(9), Vector3::x(), 0.1)]);
        assert_eq!(scene.len(), 1);
        assert_eq!(frame.len(), 2);
    }
}
