use crate::candidates::CandidateSet;
use crate::geometry::CameraPose;
use crate::scene::OcclusionQuery;
use crate::tracking::TrackingFrame;
use crate::visibility::CoverageCalculator;

/// 候補ごとの観測ウィンドウ累積値
///
/// 長さは常に候補数と一致する。候補を再生成したら `reset` すること。
#[derive(Debug, Clone, Default)]
pub struct CoverageStatistics {
    scores: Vec<f32>,
    hits: Vec<u32>,
    misses: Vec<u32>,
    ticks: u32,
    /// トラッキングポイントごとの「一時カメラから見えていた台数」の最小値
    min_cameras_seen: Vec<Option<u32>>,
}

impl CoverageStatistics {
    pub fn new(candidate_count: usize, tracking_point_count: usize) -> Self {
        let mut stats = Self::default();
        stats.reset(candidate_count, tracking_point_count);
        stats
    }

    pub fn reset(&mut self, candidate_count: usize, tracking_point_count: usize) {
        self.scores = vec![0.0; candidate_count];
        self.hits = vec![0; candidate_count];
        self.misses = vec![0; candidate_count];
        self.ticks = 0;
        self.min_cameras_seen = vec![None; tracking_point_count];
    }

    /// 1ティック分: 全候補について各関節の可視性を数える
    ///
    /// 関節ごとにヒットかミスのどちらかを必ず1つ数えるので、
    /// `hits + misses == ticks × 関節数` が常に成り立つ（欠損関節はミス）。
    pub fn accumulate<Q: OcclusionQuery + ?Sized>(
        &mut self,
        calculator: &CoverageCalculator,
        scene: &Q,
        candidates: &CandidateSet,
        frame: &TrackingFrame,
    ) {
        debug_assert_eq!(candidates.len(), self.scores.len());
        let joint_count = frame.len();

        for (i, candidate) in candidates.iter().enumerate().take(self.scores.len()) {
            let seen = frame
                .points
                .iter()
                .filter(|p| calculator.sees(scene, &candidate.pose, p))
                .count();

            if joint_count > 0 {
                self.scores[i] += seen as f32 / joint_count as f32;
            }
            self.hits[i] += seen as u32;
            self.misses[i] += (joint_count - seen) as u32;
        }
        self.ticks += 1;
    }

    /// 一時カメラ群が各トラッキングポイントを何台で見ているかの最小値を更新
    pub fn record_temporary_coverage<Q: OcclusionQuery + ?Sized>(
        &mut self,
        calculator: &CoverageCalculator,
        scene: &Q,
        cameras: &[CameraPose],
        frame: &TrackingFrame,
    ) {
        if cameras.is_empty() {
            return;
        }
        if self.min_cameras_seen.len() != frame.len() {
            self.min_cameras_seen.resize(frame.len(), None);
        }

        for (slot, point) in self.min_cameras_seen.iter_mut().zip(&frame.points) {
            if point.position.is_none() {
                continue;
            }
            let seen = cameras.iter().filter(|c| calculator.sees(scene, c, point)).count() as u32;
            *slot = Some(slot.map_or(seen, |prev| prev.min(seen)));
        }
    }

    pub fn len(&self) -> usize {
        self.scores.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scores.is_empty()
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn scores(&self) -> &[f32] {
        &self.scores
    }

    pub fn hits(&self) -> &[u32] {
        &self.hits
    }

    pub fn misses(&self) -> &[u32] {
        &self.misses
    }

    pub fn min_cameras_seen(&self) -> &[Option<u32>] {
        &self.min_cameras_seen
    }

    /// 累積スコア最大の候補（同点は小さいインデックス）
    pub fn best_index(&self) -> Option<usize> {
        self.ranked_indices().into_iter().next()
    }

    /// 累積スコア降順のインデックス（安定ソート）
    pub fn ranked_indices(&self) -> Vec<usize> {
        let mut indices: Vec<usize> = (0..self.scores.len()).collect();
        indices.sort_by(|&a, &b| self.scores[b].total_cmp(&self.scores[a]));
        indices
    }
}
