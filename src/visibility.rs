use nalgebra::Vector3;
use serde::Deserialize;

use crate::geometry::{angle_between, angular_distance, azimuth_deg, CameraPose};
use crate::scene::{LayerMask, ObjectId, OcclusionQuery, ALL_LAYERS};
use crate::tracking::{TrackedPoint, TrackingFrame};

/// 垂直画角の近似係数（16:9 画面の縦横比）
pub const VERTICAL_ASPECT: f32 = 9.0 / 16.0;

const EPS: f32 = 1e-6;

/// 画角判定の方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FovModel {
    /// 前方ベクトルとの角度1つを水平・垂直の両方の閾値と比較する旧方式
    Legacy,
    /// カメラ座標系で水平・垂直のずれを個別に計算する
    #[default]
    Independent,
}

/// 遮蔽判定のレイキャスト方式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RaycastPolicy {
    /// 最初に当たったコライダーが関節自身なら可視
    NearestHit,
    /// 関節より手前の全交差のうち、他オブジェクトが1つもなければ可視
    #[default]
    AllHits,
}

/// カメラから関節が見えるかを判定し、カバレッジを計算する
#[derive(Debug, Clone)]
pub struct CoverageCalculator {
    fov_deg: f32,
    max_view_distance: f32,
    fov_model: FovModel,
    raycast_policy: RaycastPolicy,
    layer_mask: LayerMask,
}

impl CoverageCalculator {
    /// - fov_deg: 水平画角（度）
    /// - max_view_distance: これより遠い点は画角外扱い
    pub fn new(fov_deg: f32, max_view_distance: f32) -> Self {
        Self {
            fov_deg,
            max_view_distance,
            fov_model: FovModel::default(),
            raycast_policy: RaycastPolicy::default(),
            layer_mask: ALL_LAYERS,
        }
    }

    pub fn with_fov_model(mut self, model: FovModel) -> Self {
        self.fov_model = model;
        self
    }

    pub fn with_raycast_policy(mut self, policy: RaycastPolicy) -> Self {
        self.raycast_policy = policy;
        self
    }

    pub fn with_layer_mask(mut self, mask: LayerMask) -> Self {
        self.layer_mask = mask;
        self
    }

    pub fn half_horizontal_fov(&self) -> f32 {
        self.fov_deg / 2.0
    }

    pub fn half_vertical_fov(&self) -> f32 {
        self.half_horizontal_fov() * VERTICAL_ASPECT
    }

    /// point がカメラの視錐台（画角＋最大距離）内にあるか
    pub fn is_point_in_fov(&self, camera: &CameraPose, point: &Vector3<f32>) -> bool {
        let to_point = point - camera.position;
        let distance = to_point.norm();
        if distance > self.max_view_distance {
            return false;
        }
        if distance < EPS {
            return true;
        }

        let half_h = self.half_horizontal_fov();
        let half_v = self.half_vertical_fov();

        match self.fov_model {
            FovModel::Legacy => {
                let angle = angle_between(&camera.forward(), &to_point);
                angle <= half_h && angle <= half_v
            }
            FovModel::Independent => {
                // カメラ座標系: +Z 前方, +Y 上
                let local = camera.rotation.inverse_transform_vector(&to_point);
                if local.z <= 0.0 {
                    return false;
                }
                let horizontal = local.x.abs().atan2(local.z).to_degrees();
                let vertical = local
                    .y
                    .abs()
                    .atan2((local.x * local.x + local.z * local.z).sqrt())
                    .to_degrees();
                horizontal <= half_h && vertical <= half_v
            }
        }
    }

    /// カメラから関節までのレイが遮られていないか
    pub fn is_joint_visible<Q: OcclusionQuery + ?Sized>(
        &self,
        scene: &Q,
        camera_position: &Vector3<f32>,
        joint_position: &Vector3<f32>,
        joint: ObjectId,
    ) -> bool {
        let to_joint = joint_position - camera_position;
        let distance = to_joint.norm();
        if distance < EPS {
            return true;
        }
        let direction = to_joint / distance;

        match self.raycast_policy {
            RaycastPolicy::NearestHit => scene
                .ray_cast_first(camera_position, &direction, distance, self.layer_mask)
                .map_or(true, |hit| hit.object == joint),
            RaycastPolicy::AllHits => scene
                .ray_cast_all(camera_position, &direction, distance, self.layer_mask)
                .iter()
                .all(|hit| hit.object == joint),
        }
    }

    /// 画角内かつ遮蔽なし。位置の取れていない関節は常に false
    pub fn sees<Q: OcclusionQuery + ?Sized>(
        &self,
        scene: &Q,
        camera: &CameraPose,
        point: &TrackedPoint,
    ) -> bool {
        match point.position {
            Some(ref p) => {
                self.is_point_in_fov(camera, p)
                    && self.is_joint_visible(scene, &camera.position, p, point.id)
            }
            None => false,
        }
    }

    /// いずれかのカメラから見えている関節の割合 (0.0〜1.0)
    /// 関節が0個なら 0.0
    pub fn coverage_score<Q: OcclusionQuery + ?Sized>(
        &self,
        scene: &Q,
        cameras: &[CameraPose],
        frame: &TrackingFrame,
    ) -> f32 {
        if frame.is_empty() {
            return 0.0;
        }
        let visible = frame
            .points
            .iter()
            .filter(|p| cameras.iter().any(|c| self.sees(scene, c, p)))
            .count();
        visible as f32 / frame.len() as f32
    }

    /// ゾーン選択用の候補スコア
    ///
    /// 見えている関節ごとに、まだ誰にも見られていなければ 2、既に見られていれば 1 を加算し、
    /// ゾーン中心からの角度ずれによる重み（中心 1.0、境界 0.0）を掛ける。
    /// `coverage[i]` は同じ選択パスで既に選ばれたカメラのうち関節 i を見ている台数。
    #[allow(clippy::too_many_arguments)]
    pub fn candidate_score<Q: OcclusionQuery + ?Sized>(
        &self,
        scene: &Q,
        camera: &CameraPose,
        center: &Vector3<f32>,
        frame: &TrackingFrame,
        coverage: &[u32],
        zone_center_deg: f32,
        zone_half_deg: f32,
    ) -> f32 {
        let coverage_score: f32 = frame
            .points
            .iter()
            .enumerate()
            .filter(|(_, p)| self.sees(scene, camera, p))
            .map(|(i, _)| if coverage.get(i).copied().unwrap_or(0) == 0 { 2.0 } else { 1.0 })
            .sum();

        coverage_score * position_weight(&camera.position, center, zone_center_deg, zone_half_deg)
    }
}

/// ゾーン中心で 1.0、ゾーン境界で 0.0 に線形減衰する重み
pub fn position_weight(
    position: &Vector3<f32>,
    center: &Vector3<f32>,
    zone_center_deg: f32,
    zone_half_deg: f32,
) -> f32 {
    if zone_half_deg <= 0.0 {
        return 0.0;
    }
    let diff = angular_distance(azimuth_deg(position, center), zone_center_deg);
    (1.0 - diff / zone_half_deg).clamp(0.0, 1.0)
}
