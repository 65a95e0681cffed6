use serde::Deserialize;
use tracing::{debug, info};

use crate::accumulator::CoverageStatistics;
use crate::candidates::{CandidateSet, PlacementSpace};
use crate::config::Config;
use crate::error::{PlacementError, PlacementResult};
use crate::geometry::CameraPose;
use crate::scene::OcclusionQuery;
use crate::selection::{
    select_configurations, CameraConfiguration, SecondBestPolicy, SelectionContext,
    SelectionStrategy, ZoneSelector,
};
use crate::tracking::TrackingFrame;
use crate::visibility::CoverageCalculator;

/// セッションの状態
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Generating,
    Accumulating,
    Selecting,
    Configured,
}

/// 表示対象の構成
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigurationSlot {
    #[default]
    Best,
    SecondBest,
}

/// 統計を積算するタイミング
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccumulationMode {
    /// `advance` 1回ごとに1ティック
    #[default]
    EveryFrame,
    /// レイキャストのサンプリング周期ごとに1ティック
    Sampled,
}

/// 観測ウィンドウと選択の設定
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionSettings {
    pub camera_count: usize,
    /// 近接除外距離 radius / (2K) の基準半径
    pub placement_radius: f32,
    pub raycast_fps: f32,
    /// 0 なら `finalize` を呼ぶまで積算を続ける
    pub observation_seconds: f32,
    pub accumulation: AccumulationMode,
    pub strategy: SelectionStrategy,
    pub second_best: SecondBestPolicy,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            camera_count: 3,
            placement_radius: 5.0,
            raycast_fps: 30.0,
            observation_seconds: 10.0,
            accumulation: AccumulationMode::default(),
            strategy: SelectionStrategy::default(),
            second_best: SecondBestPolicy::default(),
        }
    }
}

/// 選択完了時に公開される結果
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionOutcome {
    pub best: CameraConfiguration,
    pub second_best: CameraConfiguration,
    /// トラッキングポイントごとの、一時カメラから見えていた台数の最小値
    /// 一度も計測されなかったポイントは None
    pub min_cameras_seen: Vec<Option<u32>>,
}

/// 候補生成から最終構成の選択までを駆動する状態機械
///
/// 外部から `advance(dt)` で時間を進める。観測ウィンドウが終わるか
/// `finalize` が呼ばれると最良・第2候補の構成を選んで `Configured` になる。
pub struct PlacementSession {
    space: PlacementSpace,
    calculator: CoverageCalculator,
    settings: SessionSettings,
    phase: Phase,
    candidates: CandidateSet,
    statistics: CoverageStatistics,
    temporary: Vec<CameraPose>,
    elapsed: f32,
    sample_timer: f32,
    outcome: Option<SelectionOutcome>,
    active: ConfigurationSlot,
}

impl PlacementSession {
    pub fn new(space: PlacementSpace, calculator: CoverageCalculator, settings: SessionSettings) -> Self {
        Self {
            space,
            calculator,
            settings,
            phase: Phase::Idle,
            candidates: CandidateSet::default(),
            statistics: CoverageStatistics::default(),
            temporary: Vec::new(),
            elapsed: 0.0,
            sample_timer: 0.0,
            outcome: None,
            active: ConfigurationSlot::Best,
        }
    }

    pub fn from_config(config: &Config) -> PlacementResult<Self> {
        config.validate()?;
        Ok(Self::new(config.placement_space(), config.calculator(), config.session_settings()))
    }

    /// 候補を生成して観測ウィンドウを開始する
    ///
    /// `Idle` か `Configured` からのみ呼べる。候補が1つも生成されなければ `Idle` に戻る。
    pub fn start(&mut self) -> PlacementResult<()> {
        if !matches!(self.phase, Phase::Idle | Phase::Configured) {
            return Err(self.invalid_phase("start"));
        }

        self.phase = Phase::Generating;
        info!("Generating camera candidates...");
        self.candidates = CandidateSet::generate(&self.space);
        if self.candidates.is_empty() {
            self.phase = Phase::Idle;
            return Err(PlacementError::NoCandidates);
        }

        self.statistics.reset(self.candidates.len(), 0);
        self.temporary.clear();
        self.outcome = None;
        self.active = ConfigurationSlot::Best;
        self.elapsed = 0.0;
        self.sample_timer = 0.0;
        self.phase = Phase::Accumulating;
        info!(
            candidates = self.candidates.len(),
            cameras = self.settings.camera_count,
            "Observation window started"
        );
        Ok(())
    }

    /// 時間を dt 秒進める
    ///
    /// サンプリング周期ごとに一時カメラを選び直し、統計を積算する。
    /// 観測ウィンドウが終わったフレームで選択を行い、その結果を返す。
    pub fn advance<Q: OcclusionQuery + ?Sized>(
        &mut self,
        dt: f32,
        frame: &TrackingFrame,
        scene: &Q,
    ) -> PlacementResult<Option<SelectionOutcome>> {
        if self.phase != Phase::Accumulating {
            return Err(self.invalid_phase("advance"));
        }

        self.elapsed += dt;
        self.sample_timer += dt;
        let sample_due = self.sample_timer >= self.sample_interval();
        if sample_due {
            self.select_temporary_cameras(frame, scene);
            self.sample_timer = 0.0;
        }

        let accumulate = match self.settings.accumulation {
            AccumulationMode::EveryFrame => true,
            AccumulationMode::Sampled => sample_due,
        };
        if accumulate {
            self.statistics.accumulate(&self.calculator, scene, &self.candidates, frame);
        }
        self.statistics
            .record_temporary_coverage(&self.calculator, scene, &self.temporary, frame);

        let window = self.settings.observation_seconds;
        if window > 0.0 && self.elapsed >= window {
            info!(elapsed = self.elapsed, ticks = self.statistics.ticks(), "Observation window finished");
            return self.finalize(frame, scene).map(Some);
        }
        Ok(None)
    }

    /// 積算中に即座に最終選択を行う
    pub fn finalize<Q: OcclusionQuery + ?Sized>(
        &mut self,
        frame: &TrackingFrame,
        scene: &Q,
    ) -> PlacementResult<SelectionOutcome> {
        if self.phase != Phase::Accumulating {
            return Err(self.invalid_phase("finalize"));
        }
        if self.candidates.is_empty() {
            return Err(PlacementError::NoCandidates);
        }

        self.phase = Phase::Selecting;
        info!(strategy = ?self.settings.strategy, "Selecting camera configurations...");

        let ctx = self.context(frame, scene);
        let (best, second_best) =
            select_configurations(&ctx, self.settings.strategy, self.settings.second_best);

        for (t, seen) in self.statistics.min_cameras_seen().iter().enumerate() {
            match seen {
                Some(n) => info!("Tracking point {} - minimum cameras seen: {}", t, n),
                None => info!("Tracking point {} - never sampled", t),
            }
        }
        info!(
            best = best.len(),
            second = second_best.len(),
            "Selected {} cameras (hit {:.1} %)",
            best.len(),
            best.hit_percent()
        );

        let outcome = SelectionOutcome {
            best,
            second_best,
            min_cameras_seen: self.statistics.min_cameras_seen().to_vec(),
        };
        self.temporary.clear();
        self.active = ConfigurationSlot::Best;
        self.outcome = Some(outcome.clone());
        self.phase = Phase::Configured;
        Ok(outcome)
    }

    /// 表示対象の構成を切り替える（`Configured` のみ）
    pub fn set_active(&mut self, slot: ConfigurationSlot) -> PlacementResult<()> {
        if self.phase != Phase::Configured {
            return Err(self.invalid_phase("set_active"));
        }
        self.active = slot;
        Ok(())
    }

    pub fn active_slot(&self) -> ConfigurationSlot {
        self.active
    }

    /// 現在表示対象の構成
    pub fn active(&self) -> Option<&CameraConfiguration> {
        self.outcome.as_ref().map(|o| match self.active {
            ConfigurationSlot::Best => &o.best,
            ConfigurationSlot::SecondBest => &o.second_best,
        })
    }

    pub fn outcome(&self) -> Option<&SelectionOutcome> {
        self.outcome.as_ref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn settings(&self) -> &SessionSettings {
        &self.settings
    }

    pub fn space(&self) -> &PlacementSpace {
        &self.space
    }

    pub fn candidates(&self) -> &CandidateSet {
        &self.candidates
    }

    pub fn statistics(&self) -> &CoverageStatistics {
        &self.statistics
    }

    /// 積算中に選び直される一時カメラ（選択完了で空になる）
    pub fn temporary_cameras(&self) -> &[CameraPose] {
        &self.temporary
    }

    fn sample_interval(&self) -> f32 {
        if self.settings.raycast_fps > 0.0 {
            1.0 / self.settings.raycast_fps
        } else {
            0.0
        }
    }

    fn context<'a, Q: OcclusionQuery + ?Sized>(
        &'a self,
        frame: &'a TrackingFrame,
        scene: &'a Q,
    ) -> SelectionContext<'a, Q> {
        SelectionContext {
            calculator: &self.calculator,
            scene,
            candidates: &self.candidates,
            statistics: &self.statistics,
            frame,
            center: self.space.center,
            arc: self.space.arc,
            camera_count: self.settings.camera_count,
            placement_radius: self.settings.placement_radius,
        }
    }

    fn select_temporary_cameras<Q: OcclusionQuery + ?Sized>(&mut self, frame: &TrackingFrame, scene: &Q) {
        let indices = ZoneSelector::select(&self.context(frame, scene), None);
        self.temporary = indices
            .iter()
            .filter_map(|&i| self.candidates.get(i).map(|c| c.pose))
            .collect();
        debug!(?indices, "Temporary cameras reselected");
    }

    fn invalid_phase(&self, operation: &'static str) -> PlacementError {
        PlacementError::InvalidPhase { operation, phase: self.phase }
    }
}
