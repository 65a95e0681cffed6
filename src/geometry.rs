use nalgebra::{UnitQuaternion, Vector3};

const EPS: f32 = 1e-6;

/// 配置を許可する円弧（ワールド方位角、度）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllowedArc {
    /// 円弧の中心方位角
    pub center_deg: f32,
    /// 円弧の全幅（360 = 全周）
    pub width_deg: f32,
}

impl AllowedArc {
    pub fn new(center_deg: f32, width_deg: f32) -> Self {
        Self { center_deg, width_deg }
    }

    pub fn full_circle() -> Self {
        Self::new(0.0, 360.0)
    }

    pub fn is_full_circle(&self) -> bool {
        self.width_deg >= 360.0 - 1e-3
    }

    /// 円弧の開始方位角 [0, 360)
    /// 全周の場合は 0 から始める（ゾーン境界を方位角 0 に揃える）
    pub fn start_deg(&self) -> f32 {
        if self.is_full_circle() {
            0.0
        } else {
            normalize_deg(self.center_deg - self.width_deg / 2.0)
        }
    }

    /// 有効な幅（最大 360）
    pub fn span_deg(&self) -> f32 {
        self.width_deg.min(360.0)
    }

    /// 方位角が円弧内か（境界を含む）
    pub fn contains_azimuth(&self, azimuth_deg: f32) -> bool {
        if self.is_full_circle() {
            return true;
        }
        delta_angle(azimuth_deg, self.center_deg).abs() <= self.width_deg / 2.0
    }
}

impl Default for AllowedArc {
    fn default() -> Self {
        Self::full_circle()
    }
}

/// カメラの位置と向き（ローカル +Z が前方）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vector3<f32>,
    pub rotation: UnitQuaternion<f32>,
}

impl CameraPose {
    pub fn new(position: Vector3<f32>, rotation: UnitQuaternion<f32>) -> Self {
        Self { position, rotation }
    }

    /// target を注視する姿勢
    pub fn looking_at(position: Vector3<f32>, target: &Vector3<f32>, up: &Vector3<f32>) -> Self {
        let rotation = look_rotation(&(target - position), up);
        Self { position, rotation }
    }

    pub fn forward(&self) -> Vector3<f32> {
        forward(&self.rotation)
    }
}

/// 角度を [0, 360) に正規化
pub fn normalize_deg(angle: f32) -> f32 {
    let a = angle.rem_euclid(360.0);
    // rem_euclid は -0.0 付近で 360.0 を返すことがある
    if a >= 360.0 { 0.0 } else { a }
}

/// current から target への最短の符号付き角度差 (-180, 180]
pub fn delta_angle(current: f32, target: f32) -> f32 {
    let mut d = (target - current).rem_euclid(360.0);
    if d > 180.0 {
        d -= 360.0;
    }
    d
}

/// 2つの方位角の円周上の距離 [0, 180]
pub fn angular_distance(a: f32, b: f32) -> f32 {
    delta_angle(a, b).abs()
}

/// center から見た position の水平方位角（XZ平面、X軸=0度、Z軸=90度）[0, 360)
pub fn azimuth_deg(position: &Vector3<f32>, center: &Vector3<f32>) -> f32 {
    let rel = position - center;
    normalize_deg(rel.z.atan2(rel.x).to_degrees())
}

/// 2ベクトル間の角度（度）。どちらかがゼロベクトルなら 0
pub fn angle_between(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let denom = a.norm() * b.norm();
    if denom < EPS {
        return 0.0;
    }
    let cos = (a.dot(b) / denom).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// ローカル +Z を forward に向ける回転（up は参照上方向）
///
/// forward と up が平行な場合（真上・真下を向くカメラ）は別の参照軸を使う。
pub fn look_rotation(forward: &Vector3<f32>, up: &Vector3<f32>) -> UnitQuaternion<f32> {
    if forward.norm_squared() < EPS {
        return UnitQuaternion::identity();
    }
    let dir = forward.normalize();
    let up = if dir.cross(up).norm_squared() < EPS {
        if dir.z.abs() < 0.9 { Vector3::z() } else { Vector3::x() }
    } else {
        *up
    };
    UnitQuaternion::face_towards(&dir, &up)
}

/// 回転のローカル +Z（カメラの前方）
pub fn forward(rotation: &UnitQuaternion<f32>) -> Vector3<f32> {
    rotation * Vector3::z()
}

/// XZ平面上の水平距離
pub fn horizontal_distance(a: &Vector3<f32>, b: &Vector3<f32>) -> f32 {
    let dx = a.x - b.x;
    let dz = a.z - b.z;
    (dx * dx + dz * dz).sqrt()
}

/// 区間数の計算（floatの丸めで正確な倍数を失わないよう微小値を足す）
pub fn step_count(length: f32, spacing: f32) -> usize {
    if spacing <= 0.0 || !length.is_finite() || length <= 0.0 {
        return 0;
    }
    (length / spacing + 1e-4).floor() as usize
}
