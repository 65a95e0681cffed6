pub mod greedy;
pub mod zone;

pub use greedy::GreedyOptimizer;
pub use zone::{zones, Zone, ZoneSelector};

use std::fmt;

use nalgebra::Vector3;
use serde::Deserialize;

use crate::accumulator::CoverageStatistics;
use crate::candidates::CandidateSet;
use crate::geometry::{AllowedArc, CameraPose};
use crate::scene::OcclusionQuery;
use crate::tracking::{TrackedPoint, TrackingFrame};
use crate::visibility::CoverageCalculator;

/// 最終構成の選択アルゴリズム
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectionStrategy {
    /// 角度ゾーンごとに1台ずつ選ぶ
    #[default]
    Zone,
    /// ゾーンなしで1台ずつ貪欲に選ぶ
    Greedy,
}

/// 第2候補構成の作り方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SecondBestPolicy {
    /// 同じ手順を、各ゾーンで最良構成が選んだ候補だけ除外して再実行
    #[default]
    ZoneExclusion,
    /// 最良構成に含まれない候補を累積スコア順に K 台
    ScoreRanked,
}

/// 選択アルゴリズムへの入力一式（全て読み取り専用）
pub struct SelectionContext<'a, Q: OcclusionQuery + ?Sized> {
    pub calculator: &'a CoverageCalculator,
    pub scene: &'a Q,
    pub candidates: &'a CandidateSet,
    pub statistics: &'a CoverageStatistics,
    /// 選択時点の関節位置
    pub frame: &'a TrackingFrame,
    pub center: Vector3<f32>,
    pub arc: AllowedArc,
    pub camera_count: usize,
    pub placement_radius: f32,
}

impl<Q: OcclusionQuery + ?Sized> SelectionContext<'_, Q> {
    /// 同一構成内のカメラ間の最小距離: radius / (2K)
    pub fn min_separation(&self) -> f32 {
        if self.camera_count == 0 {
            return 0.0;
        }
        self.placement_radius / (2.0 * self.camera_count as f32)
    }

    fn pose(&self, index: usize) -> &CameraPose {
        &self.candidates.as_slice()[index].pose
    }

    fn sees(&self, index: usize, point: &TrackedPoint) -> bool {
        self.calculator.sees(self.scene, self.pose(index), point)
    }

    fn too_close(&self, index: usize, selected: &[usize]) -> bool {
        let min = self.min_separation();
        let position = self.pose(index).position;
        selected
            .iter()
            .any(|&s| (self.pose(s).position - position).norm() < min)
    }
}

/// 選択結果。生成後は変更しない
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CameraConfiguration {
    /// 選ばれた候補インデックス（選択順）
    pub indices: Vec<usize>,
    pub poses: Vec<CameraPose>,
    pub per_camera_hits: Vec<u32>,
    pub per_camera_misses: Vec<u32>,
    pub total_hits: u64,
    pub total_misses: u64,
    pub total_score: f32,
}

/// 表示用の1カメラ分の情報
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraSummary {
    /// 1始まりの番号
    pub number: usize,
    pub candidate_index: usize,
    pub pose: CameraPose,
    pub hits: u32,
    pub misses: u32,
}

impl CameraSummary {
    pub fn hit_percent(&self) -> f32 {
        percent(self.hits as u64, self.hits as u64 + self.misses as u64)
    }

    pub fn miss_percent(&self) -> f32 {
        percent(self.misses as u64, self.hits as u64 + self.misses as u64)
    }
}

impl CameraConfiguration {
    /// 選択時点の累積値スナップショットから構成を作る
    pub fn from_indices(
        indices: Vec<usize>,
        candidates: &CandidateSet,
        statistics: &CoverageStatistics,
    ) -> Self {
        let mut config = Self::default();
        for &index in &indices {
            let Some(candidate) = candidates.get(index) else {
                continue;
            };
            let hits = statistics.hits().get(index).copied().unwrap_or(0);
            let misses = statistics.misses().get(index).copied().unwrap_or(0);
            config.poses.push(candidate.pose);
            config.per_camera_hits.push(hits);
            config.per_camera_misses.push(misses);
            config.total_hits += hits as u64;
            config.total_misses += misses as u64;
            config.total_score += statistics.scores().get(index).copied().unwrap_or(0.0);
        }
        config.indices = indices
            .into_iter()
            .filter(|&i| candidates.get(i).is_some())
            .collect();
        config
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    pub fn positions(&self) -> Vec<Vector3<f32>> {
        self.poses.iter().map(|p| p.position).collect()
    }

    pub fn hit_percent(&self) -> f32 {
        percent(self.total_hits, self.total_hits + self.total_misses)
    }

    pub fn miss_percent(&self) -> f32 {
        percent(self.total_misses, self.total_hits + self.total_misses)
    }

    pub fn cameras(&self) -> impl Iterator<Item = CameraSummary> + '_ {
        self.indices.iter().enumerate().map(move |(i, &candidate_index)| CameraSummary {
            number: i + 1,
            candidate_index,
            pose: self.poses[i],
            hits: self.per_camera_hits[i],
            misses: self.per_camera_misses[i],
        })
    }
}

impl fmt::Display for CameraConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Hits:   {} ({:.1} %)", self.total_hits, self.hit_percent())?;
        writeln!(f, "Misses: {} ({:.1} %)", self.total_misses, self.miss_percent())?;
        for cam in self.cameras() {
            let p = cam.pose.position;
            writeln!(
                f,
                "  Camera {} [#{}] ({:.2}, {:.2}, {:.2})  H: {} ({:.1} %)  M: {} ({:.1} %)",
                cam.number,
                cam.candidate_index,
                p.x,
                p.y,
                p.z,
                cam.hits,
                cam.hit_percent(),
                cam.misses,
                cam.miss_percent(),
            )?;
        }
        Ok(())
    }
}

fn percent(part: u64, total: u64) -> f32 {
    if total == 0 {
        0.0
    } else {
        part as f32 / total as f32 * 100.0
    }
}

/// 最良構成と第2候補構成を選ぶ
pub fn select_configurations<Q: OcclusionQuery + ?Sized>(
    ctx: &SelectionContext<'_, Q>,
    strategy: SelectionStrategy,
    second_best: SecondBestPolicy,
) -> (CameraConfiguration, CameraConfiguration) {
    let best = match strategy {
        SelectionStrategy::Zone => ZoneSelector::select(ctx, None),
        SelectionStrategy::Greedy => GreedyOptimizer::select(ctx, &[]),
    };

    let second = match (second_best, strategy) {
        (SecondBestPolicy::ZoneExclusion, SelectionStrategy::Zone) => ZoneSelector::select(ctx, Some(best.as_slice())),
        // 貪欲法にはゾーンがないので、最良構成の候補を全体から除外して再実行する
        (SecondBestPolicy::ZoneExclusion, SelectionStrategy::Greedy) => GreedyOptimizer::select(ctx, &best),
        (SecondBestPolicy::ScoreRanked, _) => score_ranked(ctx.statistics, &best, ctx.camera_count),
    };

    (
        CameraConfiguration::from_indices(best, ctx.candidates, ctx.statistics),
        CameraConfiguration::from_indices(second, ctx.candidates, ctx.statistics),
    )
}

/// `exclude` に含まれない候補を累積スコア降順に `count` 個
pub fn score_ranked(statistics: &CoverageStatistics, exclude: &[usize], count: usize) -> Vec<usize> {
    statistics
        .ranked_indices()
        .into_iter()
        .filter(|i| !exclude.contains(i))
        .take(count)
        .collect()
}


#[cfg(test)]
mod tests {
    use super::test_support::Fixture;
    use super::*;
    use crate::candidates::ring;

    fn fixture() -> Fixture {
        Fixture::new(ring(8, 5.0, 0.0), TrackingFrame::from_positions(&[Vector3::zeros(); 4]), 5.0)
    }

    #[test]
    fn test_configuration_totals() {
        let f = fixture();
        let config = CameraConfiguration::from_indices(vec![1, 3], &f.candidates, &f.statistics);
        assert_eq!(config.len(), 2);
        assert_eq!(config.per_camera_hits, vec![4, 4]);
        assert_eq!(config.total_hits, 8);
        assert_eq!(config.total_misses, 0);
        assert!((config.total_score - 2.0).abs() < 1e-5);
        assert!((config.hit_percent() - 100.0).abs() < 1e-4);
        assert_eq!(config.miss_percent(), 0.0);
        assert_eq!(config.poses[1], f.candidates.get(3).unwrap().pose);
    }

    #[test]
    fn test_configuration_ignores_out_of_range() {
        let f = fixture();
        let config = CameraConfiguration::from_indices(vec![0, 99], &f.candidates, &f.statistics);
        assert_eq!(config.indices, vec![0]);
        assert_eq!(config.poses.len(), 1);
    }

    #[test]
    fn test_empty_configuration_percentages() {
        let config = CameraConfiguration::default();
        assert_eq!(config.hit_percent(), 0.0);
        assert_eq!(config.miss_percent(), 0.0);
        assert_eq!(config.cameras().count(), 0);
    }

    #[test]
    fn test_camera_summaries() {
        let f = fixture();
        let config = CameraConfiguration::from_indices(vec![5, 2], &f.candidates, &f.statistics);
        let cams: Vec<_> = config.cameras().collect();
        assert_eq!(cams[0].number, 1);
        assert_eq!(cams[0].candidate_index, 5);
        assert_eq!(cams[1].candidate_index, 2);
        assert!((cams[1].hit_percent() - 100.0).abs() < 1e-4);
        let text = config.to_string();
        assert!(text.contains("Camera 2 [#2]"), "{}", text);
    }

    #[test]
    fn test_min_separation() {
        let f = fixture();
        assert!((f.context(4).min_separation() - 0.625).abs() < 1e-6);
        assert_eq!(f.context(0).min_separation(), 0.0);
    }

    #[test]
    fn test_score_ranked_excludes_best() {
        let f = fixture();
        let ranked = score_ranked(&f.statistics, &[0, 1], 3);
        assert_eq!(ranked, vec![2, 3, 4]);
    }

    #[test]
    fn test_select_configurations_zone_and_second() {
        let f = fixture();
        let ctx = f.context(4);
        let (best, second) = select_configurations(&ctx, SelectionStrategy::Zone, SecondBestPolicy::ZoneExclusion);
        assert_eq!(best.len(), 4);
        assert_eq!(second.len(), 4);
        for (b, s) in best.indices.iter().zip(&second.indices) {
            assert_ne!(b, s);
        }

        let (_, ranked) = select_configurations(&ctx, SelectionStrategy::Zone, SecondBestPolicy::ScoreRanked);
        assert_eq!(ranked.len(), 4);
        assert!(ranked.indices.iter().all(|i| !best.indices.contains(i)));
    }

    #[test]
    fn test_select_configurations_greedy() {
        let f = fixture();
        let ctx = f.context(3);
        let (best, second) = select_configurations(&ctx, SelectionStrategy::Greedy, SecondBestPolicy::ZoneExclusion);
        assert_eq!(best.len(), 3);
        assert_eq!(second.len(), 3);
        assert!(second.indices.iter().all(|i| !best.indices.contains(i)));
    }
}
