use nalgebra::Vector3;

use crate::scene::ObjectId;

/// 撮影対象の関節（トラッキングポイント）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPoint {
    /// シーン内オブジェクトと共通のID（自分自身のコライダー判定に使う）
    pub id: ObjectId,
    /// ワールド座標。トラッキングが途切れた関節は None
    pub position: Option<Vector3<f32>>,
}

impl TrackedPoint {
    pub fn new(id: ObjectId, position: Vector3<f32>) -> Self {
        Self { id, position: Some(position) }
    }

    pub fn missing(id: ObjectId) -> Self {
        Self { id, position: None }
    }
}

/// 1ティック分の全関節位置（外部トラッキングから毎フレーム更新される）
#[derive(Debug, Clone, Default)]
pub struct TrackingFrame {
    pub points: Vec<TrackedPoint>,
}

impl TrackingFrame {
    pub fn new(points: Vec<TrackedPoint>) -> Self {
        Self { points }
    }

    /// ID を 0 から順に振って位置リストからフレームを作る
    pub fn from_positions(positions: &[Vector3<f32>]) -> Self {
        let points = positions
            .iter()
            .enumerate()
            .map(|(i, p)| TrackedPoint::new(ObjectId(i as u32), *p))
            .collect();
        Self { points }
    }

    /// 欠損も含めた関節数（カバレッジ率の分母）
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// 位置が取れている関節数
    pub fn valid_count(&self) -> usize {
        self.points.iter().filter(|p| p.position.is_some()).count()
    }
}
