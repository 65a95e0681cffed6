use tracing::debug;

use crate::scene::OcclusionQuery;

use super::SelectionContext;

/// 未カバー関節1つあたりの加点
const UNIQUE_WEIGHT: f32 = 2.0;
/// 近すぎる既選択カメラ1台あたりの減点
const OVERLAP_PENALTY: f32 = 10.0;

/// ゾーンを使わない貪欲選択
///
/// スコア = 単体カバレッジ + 2 × 新規にカバーする関節数 − 10 × 近すぎる既選択カメラ数
pub struct GreedyOptimizer;

impl GreedyOptimizer {
    /// K 台選ぶか候補が尽きるまで1台ずつ追加する。`excluded` の候補は使わない
    pub fn select<Q: OcclusionQuery + ?Sized>(
        ctx: &SelectionContext<'_, Q>,
        excluded: &[usize],
    ) -> Vec<usize> {
        let mut pool: Vec<usize> = (0..ctx.candidates.len())
            .filter(|i| !excluded.contains(i))
            .collect();
        let mut selected = Vec::with_capacity(ctx.camera_count.min(pool.len()));
        let mut covered = vec![false; ctx.frame.len()];
        let min_separation = ctx.min_separation();

        while selected.len() < ctx.camera_count && !pool.is_empty() {
            let mut best: Option<(usize, f32)> = None;

            for (slot, &i) in pool.iter().enumerate() {
                let pose = ctx.pose(i);
                let base = ctx
                    .calculator
                    .coverage_score(ctx.scene, std::slice::from_ref(pose), ctx.frame);
                let unique = ctx
                    .frame
                    .points
                    .iter()
                    .zip(&covered)
                    .filter(|&(p, &c)| !c && ctx.sees(i, p))
                    .count();
                let overlap = selected
                    .iter()
                    .filter(|&&s| (ctx.pose(s).position - pose.position).norm() < min_separation)
                    .count();

                let score = base + UNIQUE_WEIGHT * unique as f32 - OVERLAP_PENALTY * overlap as f32;
                if best.map_or(true, |(_, s)| score > s) {
                    best = Some((slot, score));
                }
            }

            let Some((slot, score)) = best else {
                break;
            };
            let chosen = pool.remove(slot);
            debug!(candidate = chosen, score, "greedy pick");

            for (flag, point) in covered.iter_mut().zip(&ctx.frame.points) {
                if ctx.sees(chosen, point) {
                    *flag = true;
                }
            }
            selected.push(chosen);
        }

        selected
    }
}
