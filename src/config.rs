use anyhow::Result;
use nalgebra::Vector3;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::candidates::{PlacementSpace, Surface};
use crate::error::{PlacementError, PlacementResult};
use crate::geometry::AllowedArc;
use crate::scene::{Collider, LayerMask, ObjectId, Scene, ALL_LAYERS};
use crate::selection::{SecondBestPolicy, SelectionStrategy};
use crate::session::{AccumulationMode, SessionSettings};
use crate::visibility::{CoverageCalculator, FovModel, RaycastPolicy};

/// 遮蔽物の ObjectId の開始値（関節の ID と重ならないように離す）
pub const OCCLUDER_ID_BASE: u32 = 1000;
/// 1度に1台を超えるカメラ数は受け付けない
pub const MAX_CAMERAS: usize = 360;

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub placement: PlacementConfig,
    #[serde(default)]
    pub room: RoomConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub sampling: SamplingConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub scene: SceneConfig,
    #[serde(default)]
    pub performance: PerformanceConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlacementMode {
    /// 中心を囲む円（円筒 or ドーム）
    #[default]
    Circle,
    /// 部屋の壁 or 天井
    Room,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SurfaceType {
    /// 円モード: 円筒 / 部屋モード: 4壁
    #[default]
    Cylinder,
    /// 円モード: 半球 / 部屋モード: 天井
    Dome,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PlacementConfig {
    #[serde(default)]
    pub mode: PlacementMode,
    #[serde(default)]
    pub surface: SurfaceType,
    /// 選ぶカメラ台数 K
    #[serde(default = "default_number_of_cameras")]
    pub number_of_cameras: usize,
    /// 配置円の半径（メートル）。部屋モードでも近接除外距離 radius/(2K) に使う
    #[serde(default = "default_radius")]
    pub radius: f32,
    #[serde(default = "default_min_height")]
    pub min_height: f32,
    #[serde(default = "default_max_height")]
    pub max_height: f32,
    /// 候補グリッドの間隔（メートル）
    #[serde(default = "default_grid_spacing")]
    pub grid_spacing: f32,
    /// 配置を許可する円弧の中心方位角（度）
    #[serde(default)]
    pub arc_center_deg: f32,
    /// 円弧の全幅（度）。360 で全周
    #[serde(default = "default_arc_width")]
    pub arc_width_deg: f32,
    /// 撮影ボリューム中心 [x, y, z]
    #[serde(default)]
    pub center: [f32; 3],
}

fn default_number_of_cameras() -> usize { 3 }
fn default_radius() -> f32 { 5.0 }
fn default_min_height() -> f32 { 1.0 }
fn default_max_height() -> f32 { 3.0 }
fn default_grid_spacing() -> f32 { 0.3 }
fn default_arc_width() -> f32 { 360.0 }

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            mode: PlacementMode::default(),
            surface: SurfaceType::default(),
            number_of_cameras: default_number_of_cameras(),
            radius: default_radius(),
            min_height: default_min_height(),
            max_height: default_max_height(),
            grid_spacing: default_grid_spacing(),
            arc_center_deg: 0.0,
            arc_width_deg: default_arc_width(),
            center: [0.0; 3],
        }
    }
}

/// 部屋モードの寸法（メートル）
#[derive(Debug, Deserialize, Clone)]
pub struct RoomConfig {
    #[serde(default = "default_room_width")]
    pub width: f32,
    #[serde(default = "default_room_depth")]
    pub depth: f32,
    /// 天井の高さ（中心からの相対）
    #[serde(default = "default_room_height")]
    pub height: f32,
}

fn default_room_width() -> f32 { 10.0 }
fn default_room_depth() -> f32 { 10.0 }
fn default_room_height() -> f32 { 3.0 }

impl Default for RoomConfig {
    fn default() -> Self {
        Self {
            width: default_room_width(),
            depth: default_room_depth(),
            height: default_room_height(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CameraConfig {
    /// 水平画角（度）
    #[serde(default = "default_fov")]
    pub fov_deg: f32,
    /// これより遠い関節は見えない扱い（メートル）
    #[serde(default = "default_max_view_distance")]
    pub max_view_distance: f32,
    #[serde(default)]
    pub fov_model: FovModel,
    #[serde(default)]
    pub raycast_policy: RaycastPolicy,
    /// 遮蔽判定に使うレイヤーのビットマスク
    #[serde(default = "default_layer_mask")]
    pub layer_mask: LayerMask,
}

fn default_fov() -> f32 { 60.0 }
fn default_max_view_distance() -> f32 { 10.0 }
fn default_layer_mask() -> LayerMask { ALL_LAYERS }

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_deg: default_fov(),
            max_view_distance: default_max_view_distance(),
            fov_model: FovModel::default(),
            raycast_policy: RaycastPolicy::default(),
            layer_mask: default_layer_mask(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct SamplingConfig {
    /// 一時カメラの再選択レート（Hz）
    #[serde(default = "default_raycast_fps")]
    pub raycast_fps: f32,
    /// 観測ウィンドウの長さ（秒）。0 で手動終了のみ
    #[serde(default = "default_observation_seconds")]
    pub observation_seconds: f32,
    #[serde(default)]
    pub accumulation: AccumulationMode,
}

fn default_raycast_fps() -> f32 { 30.0 }
fn default_observation_seconds() -> f32 { 10.0 }

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            raycast_fps: default_raycast_fps(),
            observation_seconds: default_observation_seconds(),
            accumulation: AccumulationMode::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct SelectionConfig {
    #[serde(default)]
    pub strategy: SelectionStrategy,
    #[serde(default)]
    pub second_best: SecondBestPolicy,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ExportConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_best_path")]
    pub best_path: String,
    #[serde(default = "default_second_path")]
    pub second_path: String,
    /// ASCII グリッドの横幅（文字）
    #[serde(default = "default_grid_width")]
    pub grid_width: usize,
    /// ASCII グリッドの行数
    #[serde(default = "default_grid_height")]
    pub grid_height: usize,
}

fn default_true() -> bool { true }
fn default_best_path() -> String { "CameraLayout_Best.txt".to_string() }
fn default_second_path() -> String { "CameraLayout_Second.txt".to_string() }
fn default_grid_width() -> usize { 60 }
fn default_grid_height() -> usize { 20 }

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            best_path: default_best_path(),
            second_path: default_second_path(),
            grid_width: default_grid_width(),
            grid_height: default_grid_height(),
        }
    }
}

/// 静的な遮蔽物
///
/// ```toml
/// [[scene.occluders]]
/// kind = "box"
/// min = [1.0, 0.0, -0.5]
/// max = [1.5, 2.0, 0.5]
/// ```
#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OccluderConfig {
    Sphere {
        center: [f32; 3],
        radius: f32,
        #[serde(default)]
        layer: u8,
    },
    Box {
        min: [f32; 3],
        max: [f32; 3],
        #[serde(default)]
        layer: u8,
    },
}

#[derive(Debug, Default, Deserialize, Clone)]
pub struct SceneConfig {
    #[serde(default)]
    pub occluders: Vec<OccluderConfig>,
}

/// デモ用の演者の動き
#[derive(Debug, Deserialize, Clone)]
pub struct PerformanceConfig {
    /// シミュレーションのフレームレート
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f32,
    /// 身長（メートル）
    #[serde(default = "default_body_height")]
    pub body_height: f32,
    /// 中心まわりの回転速度（度/秒）
    #[serde(default = "default_spin")]
    pub spin_deg_per_sec: f32,
    /// 歩行円の半径（メートル）
    #[serde(default = "default_wander_radius")]
    pub wander_radius: f32,
    /// 胴体を遮蔽物として扱う
    #[serde(default = "default_true")]
    pub torso_occludes: bool,
}

fn default_frame_rate() -> f32 { 60.0 }
fn default_body_height() -> f32 { 1.7 }
fn default_spin() -> f32 { 45.0 }
fn default_wander_radius() -> f32 { 0.5 }

impl Default for PerformanceConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            body_height: default_body_height(),
            spin_deg_per_sec: default_spin(),
            wander_radius: default_wander_radius(),
            torso_occludes: default_true(),
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config = Self::from_toml_str(&content)?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> PlacementResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// 読めなければデフォルト設定
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!("Failed to load {}: {} (using defaults)", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn validate(&self) -> PlacementResult<()> {
        let p = &self.placement;
        if p.number_of_cameras == 0 {
            return Err(PlacementError::invalid_config("placement.number_of_cameras must be at least 1"));
        }
        if p.number_of_cameras > MAX_CAMERAS {
            return Err(PlacementError::invalid_config(format!(
                "placement.number_of_cameras ({}) exceeds {}",
                p.number_of_cameras, MAX_CAMERAS
            )));
        }
        if p.grid_spacing <= 0.0 {
            return Err(PlacementError::invalid_config("placement.grid_spacing must be positive"));
        }
        if p.radius <= 0.0 {
            return Err(PlacementError::invalid_config("placement.radius must be positive"));
        }
        if p.min_height > p.max_height {
            return Err(PlacementError::invalid_config(format!(
                "placement.min_height ({}) is above max_height ({})",
                p.min_height, p.max_height
            )));
        }
        if p.arc_width_deg <= 0.0 || p.arc_width_deg > 360.0 {
            return Err(PlacementError::invalid_config("placement.arc_width_deg must be in (0, 360]"));
        }
        if p.mode == PlacementMode::Room {
            let r = &self.room;
            if r.width <= 0.0 || r.depth <= 0.0 || r.height <= 0.0 {
                return Err(PlacementError::invalid_config("room dimensions must be positive"));
            }
        }

        let c = &self.camera;
        if c.fov_deg <= 0.0 || c.fov_deg >= 180.0 {
            return Err(PlacementError::invalid_config("camera.fov_deg must be in (0, 180)"));
        }
        if c.max_view_distance <= 0.0 {
            return Err(PlacementError::invalid_config("camera.max_view_distance must be positive"));
        }

        let s = &self.sampling;
        if s.raycast_fps <= 0.0 {
            return Err(PlacementError::invalid_config("sampling.raycast_fps must be positive"));
        }
        if s.observation_seconds < 0.0 {
            return Err(PlacementError::invalid_config("sampling.observation_seconds must not be negative"));
        }

        if self.export.grid_width < 2 || self.export.grid_height < 2 {
            return Err(PlacementError::invalid_config("export grid must be at least 2x2"));
        }
        if self.performance.frame_rate <= 0.0 {
            return Err(PlacementError::invalid_config("performance.frame_rate must be positive"));
        }
        Ok(())
    }

    pub fn center(&self) -> Vector3<f32> {
        Vector3::from(self.placement.center)
    }

    /// モード × 面の組み合わせを配置面に変換
    pub fn placement_space(&self) -> PlacementSpace {
        let p = &self.placement;
        let r = &self.room;
        let surface = match (p.mode, p.surface) {
            (PlacementMode::Circle, SurfaceType::Cylinder) => Surface::CircleCylinder {
                radius: p.radius,
                min_height: p.min_height,
                max_height: p.max_height,
            },
            (PlacementMode::Circle, SurfaceType::Dome) => Surface::CircleDome {
                radius: p.radius,
                min_height: p.min_height,
                max_height: p.max_height,
            },
            (PlacementMode::Room, SurfaceType::Cylinder) => Surface::RoomWalls {
                width: r.width,
                depth: r.depth,
                min_height: p.min_height,
                max_height: p.max_height,
            },
            (PlacementMode::Room, SurfaceType::Dome) => Surface::RoomCeiling {
                width: r.width,
                depth: r.depth,
                height: r.height,
            },
        };
        PlacementSpace::new(
            self.center(),
            AllowedArc::new(p.arc_center_deg, p.arc_width_deg),
            p.grid_spacing,
            surface,
        )
    }

    pub fn calculator(&self) -> CoverageCalculator {
        let c = &self.camera;
        CoverageCalculator::new(c.fov_deg, c.max_view_distance)
            .with_fov_model(c.fov_model)
            .with_raycast_policy(c.raycast_policy)
            .with_layer_mask(c.layer_mask)
    }

    pub fn session_settings(&self) -> SessionSettings {
        SessionSettings {
            camera_count: self.placement.number_of_cameras,
            placement_radius: self.placement.radius,
            raycast_fps: self.sampling.raycast_fps,
            observation_seconds: self.sampling.observation_seconds,
            accumulation: self.sampling.accumulation,
            strategy: self.selection.strategy,
            second_best: self.selection.second_best,
        }
    }

    /// 設定の遮蔽物から静的シーンを作る。ID は OCCLUDER_ID_BASE から順に振る
    pub fn scene(&self) -> Scene {
        let colliders = self.scene.occluders.iter().enumerate().map(|(i, occluder)| {
            let id = ObjectId(OCCLUDER_ID_BASE + i as u32);
            match *occluder {
                OccluderConfig::Sphere { center, radius, layer } => {
                    Collider::sphere(id, Vector3::from(center), radius).on_layer(layer)
                }
                OccluderConfig::Box { min, max, layer } => {
                    Collider::cuboid(id, Vector3::from(min), Vector3::from(max)).on_layer(layer)
                }
            }
        });
        Scene::with_colliders(colliders.collect())
    }
}
