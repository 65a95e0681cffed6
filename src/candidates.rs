use nalgebra::Vector3;
use tracing::{info, warn};

use crate::geometry::{azimuth_deg, step_count, AllowedArc, CameraPose};

/// 候補を並べる面
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Surface {
    /// 半径 radius の円周上、高さ方向に積み重ねる
    CircleCylinder { radius: f32, min_height: f32, max_height: f32 },
    /// 半径 radius の半球。仰角 0度（赤道）〜90度（真上）
    CircleDome { radius: f32, min_height: f32, max_height: f32 },
    /// 部屋の4つの壁
    RoomWalls { width: f32, depth: f32, min_height: f32, max_height: f32 },
    /// 部屋の天井面
    RoomCeiling { width: f32, depth: f32, height: f32 },
}

/// 候補生成の設定（セッション開始時に固定）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementSpace {
    /// 撮影ボリュームの中心。全カメラはここを向く
    pub center: Vector3<f32>,
    pub arc: AllowedArc,
    pub grid_spacing: f32,
    pub surface: Surface,
}

impl PlacementSpace {
    pub fn new(center: Vector3<f32>, arc: AllowedArc, grid_spacing: f32, surface: Surface) -> Self {
        Self { center, arc, grid_spacing, surface }
    }
}

/// 生成済みの固定カメラ候補
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraCandidate {
    /// 生成順インデックス
    pub index: usize,
    pub pose: CameraPose,
}

impl CameraCandidate {
    pub fn position(&self) -> &Vector3<f32> {
        &self.pose.position
    }
}

/// 候補の集合。生成後は変更しない
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CandidateSet {
    candidates: Vec<CameraCandidate>,
}

impl CandidateSet {
    /// 配置面を離散化して全候補を生成する
    ///
    /// 順序: 円筒/ドームは高さ(仰角)が外側・方位角が内側、部屋モードは壁ごと。
    pub fn generate(space: &PlacementSpace) -> Self {
        let mut builder = Builder::new(space);
        match space.surface {
            Surface::CircleCylinder { radius, min_height, max_height } => {
                builder.cylinder(radius, min_height, max_height)
            }
            Surface::CircleDome { radius, min_height, max_height } => {
                builder.dome(radius, min_height, max_height)
            }
            Surface::RoomWalls { width, depth, min_height, max_height } => {
                builder.room_walls(width, depth, min_height, max_height)
            }
            Surface::RoomCeiling { width, depth, height } => builder.room_ceiling(width, depth, height),
        }

        let set = Self::from_poses(builder.poses);
        if set.is_empty() {
            warn!("No camera candidates generated for {:?}", space.surface);
        } else {
            info!("Generated {} camera candidates", set.len());
        }
        set
    }

    /// 任意の姿勢リストから候補集合を作る（インデックスは並び順）
    pub fn from_poses(poses: Vec<CameraPose>) -> Self {
        let candidates = poses
            .into_iter()
            .enumerate()
            .map(|(index, pose)| CameraCandidate { index, pose })
            .collect();
        Self { candidates }
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CameraCandidate> {
        self.candidates.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, CameraCandidate> {
        self.candidates.iter()
    }

    pub fn as_slice(&self) -> &[CameraCandidate] {
        &self.candidates
    }

    pub fn poses(&self) -> Vec<CameraPose> {
        self.candidates.iter().map(|c| c.pose).collect()
    }
}

struct Builder<'a> {
    space: &'a PlacementSpace,
    poses: Vec<CameraPose>,
}

impl<'a> Builder<'a> {
    fn new(space: &'a PlacementSpace) -> Self {
        Self { space, poses: Vec::new() }
    }

    fn push_looking_at_center(&mut self, offset: Vector3<f32>, up: &Vector3<f32>) {
        let position = self.space.center + offset;
        self.poses.push(CameraPose::looking_at(position, &self.space.center, up));
    }

    /// 部屋モード用: 許可円弧外の位置は捨てる
    fn push_if_in_arc(&mut self, offset: Vector3<f32>, up: &Vector3<f32>) {
        let position = self.space.center + offset;
        if self.space.arc.contains_azimuth(azimuth_deg(&position, &self.space.center)) {
            self.poses.push(CameraPose::looking_at(position, &self.space.center, up));
        }
    }

    /// 円弧を弧長 grid_spacing 相当の角度で分割。(開始角, 刻み, 分割数)
    fn azimuth_steps(&self, radius: f32) -> Option<(f32, f32, usize)> {
        if radius <= 0.0 {
            return None;
        }
        let span = self.space.arc.span_deg();
        let step_deg = (self.space.grid_spacing / radius).to_degrees();
        let steps = step_count(span, step_deg);
        if steps == 0 {
            return None;
        }
        let start = self.space.arc.center_deg - span / 2.0;
        Some((start, span / steps as f32, steps))
    }

    fn cylinder(&mut self, radius: f32, min_height: f32, max_height: f32) {
        let Some((start, increment, angle_steps)) = self.azimuth_steps(radius) else {
            return;
        };
        let spacing = self.space.grid_spacing;
        let height_steps = step_count(max_height - min_height, spacing).max(1);

        for h in 0..height_steps {
            let y = min_height + h as f32 * spacing;
            for a in 0..angle_steps {
                let rad = (start + a as f32 * increment).to_radians();
                let offset = Vector3::new(rad.cos() * radius, y, rad.sin() * radius);
                self.push_looking_at_center(offset, &Vector3::y());
            }
        }
    }

    fn dome(&mut self, radius: f32, min_height: f32, max_height: f32) {
        let Some((start, increment, azimuth_steps)) = self.azimuth_steps(radius) else {
            return;
        };
        let elevation_steps = step_count(max_height - min_height, self.space.grid_spacing).max(2);

        for e in 0..elevation_steps {
            let t = e as f32 / (elevation_steps - 1) as f32;
            let elevation = (90.0 * t).to_radians();

            if e == elevation_steps - 1 {
                // 真上は方位角によらず同じ点なので1台のみ
                self.push_looking_at_center(Vector3::new(0.0, radius, 0.0), &Vector3::y());
                continue;
            }

            let y = elevation.sin() * radius;
            let horizontal = elevation.cos() * radius;
            for a in 0..azimuth_steps {
                let rad = (start + a as f32 * increment).to_radians();
                let offset = Vector3::new(rad.cos() * horizontal, y, rad.sin() * horizontal);
                self.push_looking_at_center(offset, &Vector3::y());
            }
        }
    }

    fn room_walls(&mut self, width: f32, depth: f32, min_height: f32, max_height: f32) {
        let spacing = self.space.grid_spacing;
        let height_steps = step_count(max_height - min_height, spacing).max(1);
        let front_steps = step_count(width, spacing).max(1);
        let side_steps = step_count(depth, spacing).max(1);
        let (hw, hd) = (width / 2.0, depth / 2.0);
        let up = Vector3::y();

        // 前 (z = +d/2), 後 (z = -d/2)
        for z in [hd, -hd] {
            for h in 0..height_steps {
                let y = min_height + h as f32 * spacing;
                for i in 0..=front_steps {
                    let x = lerp(-hw, hw, i as f32 / front_steps as f32);
                    self.push_if_in_arc(Vector3::new(x, y, z), &up);
                }
            }
        }
        // 左 (x = -w/2), 右 (x = +w/2)
        for x in [-hw, hw] {
            for h in 0..height_steps {
                let y = min_height + h as f32 * spacing;
                for i in 0..=side_steps {
                    let z = lerp(-hd, hd, i as f32 / side_steps as f32);
                    self.push_if_in_arc(Vector3::new(x, y, z), &up);
                }
            }
        }
    }

    fn room_ceiling(&mut self, width: f32, depth: f32, height: f32) {
        let spacing = self.space.grid_spacing;
        let steps_x = step_count(width, spacing).max(1);
        let steps_z = step_count(depth, spacing).max(1);
        let (hw, hd) = (width / 2.0, depth / 2.0);
        // 天井カメラは下向きが基準
        let up = -Vector3::y();

        for i in 0..=steps_x {
            let x = lerp(-hw, hw, i as f32 / steps_x as f32);
            for j in 0..=steps_z {
                let z = lerp(-hd, hd, j as f32 / steps_z as f32);
                self.push_if_in_arc(Vector3::new(x, height, z), &up);
            }
        }
    }
}

fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// 中心を向いた等間隔リング（テスト用）
#[cfg(test)]
pub(crate) fn ring(count: usize, radius: f32, height: f32) -> CandidateSet {
    let poses = (0..count)
        .map(|i| {
            // ゾーン境界を避けるため半ステップずらす
            let angle = ((i as f32 + 0.5) * 360.0 / count as f32).to_radians();
            let position = Vector3::new(angle.cos() * radius, height, angle.sin() * radius);
            CameraPose::looking_at(position, &Vector3::zeros(), &Vector3::y())
        })
        .collect();
    CandidateSet::from_poses(poses)
}
