use nalgebra::{UnitQuaternion, Vector3};

use crate::config::PerformanceConfig;
use crate::scene::{Collider, ObjectId};
use crate::tracking::{TrackedPoint, TrackingFrame};

/// 17 関節の並び（MoveNet / COCO 順）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(usize)]
pub enum Joint {
    Nose = 0,
    LeftEye = 1,
    RightEye = 2,
    LeftEar = 3,
    RightEar = 4,
    LeftShoulder = 5,
    RightShoulder = 6,
    LeftElbow = 7,
    RightElbow = 8,
    LeftWrist = 9,
    RightWrist = 10,
    LeftHip = 11,
    RightHip = 12,
    LeftKnee = 13,
    RightKnee = 14,
    LeftAnkle = 15,
    RightAnkle = 16,
}

impl Joint {
    pub const COUNT: usize = 17;

    pub const ALL: [Joint; Joint::COUNT] = [
        Self::Nose,
        Self::LeftEye,
        Self::RightEye,
        Self::LeftEar,
        Self::RightEar,
        Self::LeftShoulder,
        Self::RightShoulder,
        Self::LeftElbow,
        Self::RightElbow,
        Self::LeftWrist,
        Self::RightWrist,
        Self::LeftHip,
        Self::RightHip,
        Self::LeftKnee,
        Self::RightKnee,
        Self::LeftAnkle,
        Self::RightAnkle,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Nose => "nose",
            Self::LeftEye => "left_eye",
            Self::RightEye => "right_eye",
            Self::LeftEar => "left_ear",
            Self::RightEar => "right_ear",
            Self::LeftShoulder => "left_shoulder",
            Self::RightShoulder => "right_shoulder",
            Self::LeftElbow => "left_elbow",
            Self::RightElbow => "right_elbow",
            Self::LeftWrist => "left_wrist",
            Self::RightWrist => "right_wrist",
            Self::LeftHip => "left_hip",
            Self::RightHip => "right_hip",
            Self::LeftKnee => "left_knee",
            Self::RightKnee => "right_knee",
            Self::LeftAnkle => "left_ankle",
            Self::RightAnkle => "right_ankle",
        }
    }

    /// 関節の ObjectId（コライダーと共通）
    pub fn object_id(self) -> ObjectId {
        ObjectId(self as u32)
    }

    /// 直立姿勢での位置（身長比）。x: 左, y: 床から上, z: 前
    fn rest_offset(self) -> Vector3<f32> {
        let (x, y, z) = match self {
            Self::Nose => (0.0, 0.94, 0.05),
            Self::LeftEye => (0.03, 0.96, 0.04),
            Self::RightEye => (-0.03, 0.96, 0.04),
            Self::LeftEar => (0.06, 0.95, 0.0),
            Self::RightEar => (-0.06, 0.95, 0.0),
            Self::LeftShoulder => (0.12, 0.82, 0.0),
            Self::RightShoulder => (-0.12, 0.82, 0.0),
            Self::LeftElbow => (0.15, 0.64, 0.0),
            Self::RightElbow => (-0.15, 0.64, 0.0),
            Self::LeftWrist => (0.16, 0.48, 0.02),
            Self::RightWrist => (-0.16, 0.48, 0.02),
            Self::LeftHip => (0.07, 0.53, 0.0),
            Self::RightHip => (-0.07, 0.53, 0.0),
            Self::LeftKnee => (0.07, 0.29, 0.01),
            Self::RightKnee => (-0.07, 0.29, 0.01),
            Self::LeftAnkle => (0.07, 0.04, 0.0),
            Self::RightAnkle => (-0.07, 0.04, 0.0),
        };
        Vector3::new(x, y, z)
    }

    /// 腕振りの振幅（身長比、前後方向）と左右の位相
    fn swing(self) -> Option<(f32, f32)> {
        match self {
            Self::LeftElbow => Some((0.04, 0.0)),
            Self::RightElbow => Some((0.04, std::f32::consts::PI)),
            Self::LeftWrist => Some((0.10, 0.0)),
            Self::RightWrist => Some((0.10, std::f32::consts::PI)),
            Self::LeftKnee => Some((0.05, std::f32::consts::PI)),
            Self::RightKnee => Some((0.05, 0.0)),
            Self::LeftAnkle => Some((0.08, std::f32::consts::PI)),
            Self::RightAnkle => Some((0.08, 0.0)),
            _ => None,
        }
    }
}

/// 胴体コライダーの ObjectId
pub const TORSO_ID: ObjectId = ObjectId(100);

/// 関節コライダーの半径（メートル）
const JOINT_RADIUS: f32 = 0.04;

/// 手足を振る周期（秒）
const STRIDE_PERIOD: f32 = 1.2;

/// トラッキング入力の代わりに使う手続き的な演者
///
/// 腰の高さが `center` に来るように立ち、中心のまわりを歩きながら向きを変える。
#[derive(Debug, Clone)]
pub struct Performer {
    center: Vector3<f32>,
    body_height: f32,
    spin_deg_per_sec: f32,
    wander_radius: f32,
    torso_occludes: bool,
}

impl Performer {
    pub fn new(center: Vector3<f32>, body_height: f32) -> Self {
        Self {
            center,
            body_height,
            spin_deg_per_sec: 0.0,
            wander_radius: 0.0,
            torso_occludes: false,
        }
    }

    pub fn from_config(center: Vector3<f32>, config: &PerformanceConfig) -> Self {
        Self {
            center,
            body_height: config.body_height,
            spin_deg_per_sec: config.spin_deg_per_sec,
            wander_radius: config.wander_radius,
            torso_occludes: config.torso_occludes,
        }
    }

    pub fn with_spin(mut self, deg_per_sec: f32) -> Self {
        self.spin_deg_per_sec = deg_per_sec;
        self
    }

    pub fn with_wander(mut self, radius: f32) -> Self {
        self.wander_radius = radius;
        self
    }

    pub fn with_torso(mut self, occludes: bool) -> Self {
        self.torso_occludes = occludes;
        self
    }

    /// 時刻 t の向き（Y軸まわり）
    fn heading(&self, t: f32) -> UnitQuaternion<f32> {
        UnitQuaternion::from_axis_angle(&Vector3::y_axis(), (self.spin_deg_per_sec * t).to_radians())
    }

    /// 時刻 t の床上の基準点
    fn root(&self, t: f32) -> Vector3<f32> {
        let angle = (self.spin_deg_per_sec * 0.5 * t).to_radians();
        let wander = Vector3::new(angle.cos(), 0.0, angle.sin()) * self.wander_radius;
        let hip_height = Joint::LeftHip.rest_offset().y * self.body_height;
        self.center + wander - Vector3::new(0.0, hip_height, 0.0)
    }

    pub fn joint_position(&self, joint: Joint, t: f32) -> Vector3<f32> {
        let mut local = joint.rest_offset();
        if let Some((amplitude, phase)) = joint.swing() {
            let w = std::f32::consts::TAU / STRIDE_PERIOD;
            local.z += amplitude * (w * t + phase).sin();
        }
        self.root(t) + self.heading(t) * (local * self.body_height)
    }

    /// 時刻 t の全関節（ID は関節番号）
    pub fn frame_at(&self, t: f32) -> TrackingFrame {
        let points = Joint::ALL
            .iter()
            .map(|&j| TrackedPoint::new(j.object_id(), self.joint_position(j, t)))
            .collect();
        TrackingFrame::new(points)
    }

    /// 時刻 t の関節コライダーと胴体コライダー
    pub fn colliders_at(&self, t: f32) -> Vec<Collider> {
        let radius = JOINT_RADIUS * self.body_height / 1.7;
        let mut colliders: Vec<Collider> = Joint::ALL
            .iter()
            .map(|&j| Collider::sphere(j.object_id(), self.joint_position(j, t), radius))
            .collect();

        if self.torso_occludes {
            // 肩と腰の内側に収まる箱。回転は無視して軸平行で近似
            let torso = [Joint::LeftShoulder, Joint::RightShoulder, Joint::LeftHip, Joint::RightHip]
                .map(|j| self.joint_position(j, t));
            let centroid = torso.iter().sum::<Vector3<f32>>() / 4.0;
            let mut min = centroid;
            let mut max = centroid;
            for p in &torso {
                min = min.inf(p);
                max = max.sup(p);
            }
            let inset = Vector3::new(0.5, 0.8, 0.5);
            let half = ((max - min) / 2.0).component_mul(&inset);
            let depth = 0.06 * self.body_height;
            let half = Vector3::new(half.x.max(depth), half.y, half.z.max(depth));
            colliders.push(Collider::cuboid(TORSO_ID, centroid - half, centroid + half));
        }
        colliders
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::CameraPose;
    use crate::scene::{OcclusionQuery, Scene};
    use crate::visibility::CoverageCalculator;

    #[test]
    fn test_joint_count() {
        assert_eq!(Joint::COUNT, 17);
        assert_eq!(Joint::ALL.len(), Joint::COUNT);
        for (i, j) in Joint::ALL.iter().enumerate() {
            assert_eq!(*j as usize, i);
        }
    }

    #[test]
    fn test_joint_from_index() {
        assert_eq!(Joint::from_index(0), Some(Joint::Nose));
        assert_eq!(Joint::from_index(16), Some(Joint::RightAnkle));
        assert_eq!(Joint::from_index(17), None);
        assert_eq!(Joint::LeftKnee.name(), "left_knee");
    }

    #[test]
    fn test_frame_has_all_joints() {
        let performer = Performer::new(Vector3::new(0.0, 1.0, 0.0), 1.7);
        let frame = performer.frame_at(0.0);
        assert_eq!(frame.len(), Joint::COUNT);
        assert_eq!(frame.valid_count(), Joint::COUNT);
        assert_eq!(frame.points[5].id, ObjectId(5));
    }

    #[test]
    fn test_hips_at_center() {
        let center = Vector3::new(0.5, 1.0, -0.5);
        let performer = Performer::new(center, 1.7);
        let l = performer.joint_position(Joint::LeftHip, 0.0);
        let r = performer.joint_position(Joint::RightHip, 0.0);
        let mid = (l + r) / 2.0;
        assert!((mid - center).norm() < 1e-4, "mid={:?}", mid);
        let nose = performer.joint_position(Joint::Nose, 0.0);
        let ankle = performer.joint_position(Joint::LeftAnkle, 0.0);
        assert!(nose.y > ankle.y + 1.0);
    }

    #[test]
    fn test_spin_turns_body() {
        let performer = Performer::new(Vector3::zeros(), 1.7).with_spin(90.0);
        let nose0 = performer.joint_position(Joint::Nose, 0.0);
        let nose1 = performer.joint_position(Joint::Nose, 1.0);
        // 90度回転で前方 (+Z) の鼻は +X 側へ
        assert!(nose0.z > 0.0);
        assert!(nose1.x > 0.0 && nose1.z.abs() < 1e-3, "nose1={:?}", nose1);
    }

    #[test]
    fn test_wander_moves_root() {
        let performer = Performer::new(Vector3::zeros(), 1.7).with_wander(0.5).with_spin(90.0);
        let a = performer.joint_position(Joint::LeftHip, 0.0);
        let b = performer.joint_position(Joint::LeftHip, 2.0);
        assert!((a - b).norm() > 0.1);
    }

    #[test]
    fn test_colliders_include_torso() {
        let performer = Performer::new(Vector3::zeros(), 1.7);
        assert_eq!(performer.colliders_at(0.0).len(), Joint::COUNT);
        let colliders = performer.with_torso(true).colliders_at(0.0);
        assert_eq!(colliders.len(), Joint::COUNT + 1);
        assert_eq!(colliders.last().map(|c| c.object), Some(TORSO_ID));
    }

    #[test]
    fn test_torso_does_not_swallow_joints() {
        let performer = Performer::new(Vector3::zeros(), 1.7).with_torso(true);
        let scene = Scene::with_colliders(performer.colliders_at(0.0));
        let calc = CoverageCalculator::new(60.0, 10.0);
        // 正面のカメラからは肩と腰が見える
        let camera = CameraPose::looking_at(Vector3::new(0.0, 0.0, 3.0), &Vector3::zeros(), &Vector3::y());
        for j in [Joint::LeftShoulder, Joint::RightShoulder, Joint::LeftHip, Joint::RightHip, Joint::Nose] {
            let p = performer.joint_position(j, 0.0);
            assert!(
                calc.is_joint_visible(&scene, &camera.position, &p, j.object_id()),
                "{} should be visible",
                j.name()
            );
        }
    }

    #[test]
    fn test_torso_blocks_point_behind_it() {
        let performer = Performer::new(Vector3::zeros(), 1.7).with_torso(true);
        let scene = Scene::with_colliders(performer.colliders_at(0.0));
        // 胴体の真後ろの点へのレイは胴体に当たる
        let chest = Vector3::new(0.0, 0.25, 0.0);
        let origin = Vector3::new(0.0, 0.25, 3.0);
        let behind = Vector3::new(0.0, 0.25, -0.5);
        let dir = (behind - origin).normalize();
        let hit = scene.ray_cast_first(&origin, &dir, (behind - origin).norm(), u32::MAX);
        assert_eq!(hit.map(|h| h.object), Some(TORSO_ID));
        assert!(hit.map_or(false, |h| h.distance < (chest - origin).norm()));
    }
}
