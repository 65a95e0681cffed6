use tracing::{debug, warn};

use crate::geometry::{azimuth_deg, normalize_deg, AllowedArc};
use crate::scene::OcclusionQuery;

use super::SelectionContext;

/// 配置円弧を K 等分した角度ゾーン
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Zone {
    pub index: usize,
    /// ゾーン開始方位角 [0, 360)
    pub start_deg: f32,
    pub width_deg: f32,
    /// 円弧の開始方位角（所属判定の基準）
    arc_start_deg: f32,
}

impl Zone {
    pub fn center_deg(&self) -> f32 {
        normalize_deg(self.start_deg + self.width_deg / 2.0)
    }

    pub fn half_width_deg(&self) -> f32 {
        self.width_deg / 2.0
    }

    /// [start, start + width) に入るか
    pub fn contains(&self, azimuth: f32) -> bool {
        let offset = normalize_deg(azimuth - self.arc_start_deg);
        let lo = self.index as f32 * self.width_deg;
        offset >= lo && offset < lo + self.width_deg
    }
}

/// 円弧を count 個のゾーンに分割する。全周なら方位角 0 から始まる
pub fn zones(arc: &AllowedArc, count: usize) -> Vec<Zone> {
    zone_iter(arc, count).collect()
}

/// `zones` の遅延版。幅は count から決まるが、ゾーンは必要な分だけ作る
fn zone_iter(arc: &AllowedArc, count: usize) -> impl Iterator<Item = Zone> {
    let arc_start = arc.start_deg();
    let width = if count == 0 { 0.0 } else { arc.span_deg() / count as f32 };
    (0..count).map(move |index| Zone {
        index,
        start_deg: normalize_deg(arc_start + index as f32 * width),
        width_deg: width,
        arc_start_deg: arc_start,
    })
}

/// ゾーンごとに1台ずつ選ぶ選択器
pub struct ZoneSelector;

impl ZoneSelector {
    /// ゾーン順に、ゾーン内かつ既選択カメラから十分離れた候補のうち
    /// `candidate_score` 最大のものを選ぶ。
    ///
    /// 該当候補がないゾーンは累積スコア最大の候補で埋める（近接制約も無視）。
    /// `exclude_per_zone[z]` はゾーン z でのみ除外する候補（第2候補構成用）。
    pub fn select<Q: OcclusionQuery + ?Sized>(
        ctx: &SelectionContext<'_, Q>,
        exclude_per_zone: Option<&[usize]>,
    ) -> Vec<usize> {
        let count = ctx.camera_count.min(ctx.candidates.len());
        let mut selected: Vec<usize> = Vec::with_capacity(count);
        let mut coverage = vec![0u32; ctx.frame.len()];

        for zone in zone_iter(&ctx.arc, ctx.camera_count).take(count) {
            let excluded = exclude_per_zone.and_then(|e| e.get(zone.index)).copied();
            let mut best: Option<usize> = None;
            let mut best_score = f32::NEG_INFINITY;

            for candidate in ctx.candidates.iter() {
                let i = candidate.index;
                if excluded == Some(i) {
                    continue;
                }
                if !zone.contains(azimuth_deg(candidate.position(), &ctx.center)) {
                    continue;
                }
                if ctx.too_close(i, &selected) {
                    continue;
                }

                let score = ctx.calculator.candidate_score(
                    ctx.scene,
                    &candidate.pose,
                    &ctx.center,
                    ctx.frame,
                    &coverage,
                    zone.center_deg(),
                    zone.half_width_deg(),
                );
                if score > best_score {
                    best_score = score;
                    best = Some(i);
                }
            }

            let chosen = match best {
                Some(i) => {
                    debug!(zone = zone.index, candidate = i, score = best_score, "zone pick");
                    i
                }
                None => {
                    let fallback = ctx.statistics.best_index().unwrap_or(0);
                    warn!(
                        zone = zone.index,
                        candidate = fallback,
                        "No eligible candidate in zone, falling back to best cumulative score"
                    );
                    fallback
                }
            };

            selected.push(chosen);
            for (t, point) in ctx.frame.points.iter().enumerate() {
                if ctx.sees(chosen, point) {
                    coverage[t] += 1;
                }
            }
        }

        selected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidates::{ring, CandidateSet};
    use crate::geometry::CameraPose;
    use crate::selection::test_support::Fixture;
    use crate::tracking::TrackingFrame;
    use nalgebra::Vector3;

    /// 方位角 0, 45, 90, ... に並ぶリング
    fn even_ring(count: usize, radius: f32) -> CandidateSet {
        let poses = (0..count)
            .map(|i| {
                let a = (i as f32 * 360.0 / count as f32).to_radians();
                let p = Vector3::new(a.cos() * radius, 0.0, a.sin() * radius);
                CameraPose::looking_at(p, &Vector3::zeros(), &Vector3::y())
            })
            .collect();
        CandidateSet::from_poses(poses)
    }

    fn four_points() -> TrackingFrame {
        TrackingFrame::from_positions(&[Vector3::zeros(); 4])
    }

    #[test]
    fn test_zones_full_circle() {
        let z = zones(&AllowedArc::full_circle(), 4);
        assert_eq!(z.len(), 4);
        assert_eq!(z[1].start_deg, 90.0);
        assert!((z[1].center_deg() - 135.0).abs() < 1e-4);
        assert!(z[0].contains(0.0));
        assert!(!z[0].contains(90.0));
        assert!(z[1].contains(90.0));
        assert!(z[3].contains(359.9));
        assert!(zones(&AllowedArc::full_circle(), 0).is_empty());
    }

    #[test]
    fn test_zones_restricted_arc() {
        // 中心 90度・幅 180度 → 0〜180度を2分割
        let z = zones(&AllowedArc::new(90.0, 180.0), 2);
        assert!((z[0].start_deg - 0.0).abs() < 1e-4);
        assert!((z[1].start_deg - 90.0).abs() < 1e-4);
        assert!(z[0].contains(10.0));
        assert!(z[1].contains(170.0));
        assert!(!z[1].contains(200.0));
        assert!(!z[0].contains(350.0));
    }

    #[test]
    fn test_one_camera_per_zone() {
        let f = Fixture::new(even_ring(8, 5.0), four_points(), 5.0);
        let picked = ZoneSelector::select(&f.context(4), None);
        assert_eq!(picked.len(), 4);
        // ゾーン中心 (45, 135, 225, 315) にいる候補が重み 1.0 で選ばれる
        assert_eq!(picked, vec![1, 3, 5, 7]);
        for (zone, &i) in zones(&AllowedArc::full_circle(), 4).iter().zip(&picked) {
            let az = azimuth_deg(f.candidates.get(i).unwrap().position(), &Vector3::zeros());
            assert!(zone.contains(az), "candidate {} at {} not in zone {}", i, az, zone.index);
        }
    }

    #[test]
    fn test_unique_coverage_weighting() {
        // 最初のゾーンは未カバー関節ごとに 2、以降は 1
        let f = Fixture::new(even_ring(8, 5.0), four_points(), 5.0);
        let ctx = f.context(4);
        let z = zones(&ctx.arc, 4);
        let pose = &f.candidates.get(1).unwrap().pose;
        let fresh = ctx.calculator.candidate_score(
            ctx.scene, pose, &ctx.center, ctx.frame, &[0; 4], z[0].center_deg(), z[0].half_width_deg(),
        );
        assert!((fresh - 8.0).abs() < 1e-4);
        let pose = &f.candidates.get(3).unwrap().pose;
        let after = ctx.calculator.candidate_score(
            ctx.scene, pose, &ctx.center, ctx.frame, &[1; 4], z[1].center_deg(), z[1].half_width_deg(),
        );
        assert!((after - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_selection_count_capped_by_candidates() {
        let f = Fixture::new(even_ring(3, 5.0), four_points(), 5.0);
        let picked = ZoneSelector::select(&f.context(6), None);
        assert_eq!(picked.len(), 3);
    }

    #[test]
    fn test_huge_camera_count_builds_only_needed_zones() {
        let f = Fixture::new(ring(4, 5.0, 0.0), four_points(), 5.0);
        let picked = ZoneSelector::select(&f.context(usize::MAX), None);
        assert_eq!(picked.len(), 4);
        assert!(picked.iter().all(|&i| i < 4));
    }

    #[test]
    fn test_empty_candidates() {
        let f = Fixture::new(CandidateSet::default(), four_points(), 5.0);
        assert!(ZoneSelector::select(&f.context(4), None).is_empty());
    }

    #[test]
    fn test_proximity_exclusion() {
        // ゾーン境界 180度 をはさんで 175度 と 185度 に1台ずつ。270度 のカメラは外向きで何も見えない
        let at = |deg: f32| {
            let a = deg.to_radians();
            Vector3::new(a.cos() * 5.0, 0.0, a.sin() * 5.0)
        };
        let inward = |deg: f32| CameraPose::looking_at(at(deg), &Vector3::zeros(), &Vector3::y());
        let outward = CameraPose::looking_at(at(270.0), &(at(270.0) * 2.0), &Vector3::y());
        let candidates = CandidateSet::from_poses(vec![inward(175.0), inward(185.0), outward]);

        // 最小距離 1 / 4 = 0.25 → 185度 のカメラ（距離 約0.87）が選べる
        let loose = Fixture::new(candidates.clone(), four_points(), 1.0);
        assert_eq!(ZoneSelector::select(&loose.context(2), None), vec![0, 1]);

        // 最小距離 8 / 4 = 2 → 185度 は近すぎるので、スコア 0 の外向きカメラになる
        let strict = Fixture::new(candidates, four_points(), 8.0);
        assert_eq!(ZoneSelector::select(&strict.context(2), None), vec![0, 2]);
    }

    #[test]
    fn test_separation_holds_without_fallback() {
        let candidates = ring(36, 5.0, 0.0);
        let f = Fixture::new(candidates, four_points(), 5.0);
        let ctx = f.context(6);
        let picked = ZoneSelector::select(&ctx, None);
        let min = ctx.min_separation();
        for (a, &i) in picked.iter().enumerate() {
            for &j in &picked[a + 1..] {
                let d = (f.candidates.get(i).unwrap().position() - f.candidates.get(j).unwrap().position()).norm();
                assert!(d >= min, "{} and {} are {} apart", i, j, d);
            }
        }
    }

    #[test]
    fn test_empty_zone_falls_back_to_best_score() {
        // 全候補が 0〜90度に集中 → ゾーン1〜3はフォールバック
        let make = |deg: f32| {
            let a = deg.to_radians();
            let p = Vector3::new(a.cos() * 5.0, 0.0, a.sin() * 5.0);
            CameraPose::looking_at(p, &Vector3::zeros(), &Vector3::y())
        };
        let candidates = CandidateSet::from_poses(vec![make(10.0), make(45.0), make(80.0)]);
        let f = Fixture::new(candidates, four_points(), 5.0);
        let picked = ZoneSelector::select(&f.context(4), None);
        assert_eq!(picked, vec![1, 0, 0]);
    }

    #[test]
    fn test_second_best_excludes_per_zone_only() {
        let f = Fixture::new(even_ring(8, 5.0), four_points(), 5.0);
        let ctx = f.context(4);
        let best = ZoneSelector::select(&ctx, None);
        let second = ZoneSelector::select(&ctx, Some(best.as_slice()));
        assert_eq!(second.len(), 4);
        for (zone, (b, s)) in best.iter().zip(&second).enumerate() {
            assert_ne!(b, s, "zone {} reused candidate {}", zone, b);
        }
    }

    #[test]
    fn test_restricted_arc_zones_stay_inside_arc() {
        let f = Fixture::new(even_ring(16, 5.0), four_points(), 5.0);
        let mut ctx = f.context(2);
        ctx.arc = AllowedArc::new(90.0, 180.0);
        let picked = ZoneSelector::select(&ctx, None);
        assert_eq!(picked.len(), 2);
        for &i in &picked {
            let z = f.candidates.get(i).unwrap().position().z;
            assert!(z > 0.0, "candidate {} outside arc (z={})", i, z);
        }
    }
}
