use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::score::HighScoreStore;
use super::{FieldLayout, GameState, Tile, LANE_COUNT};
use crate::pitch::PitchSample;

pub const DEFAULT_COMPLEXITY: f32 = 0.2;
pub const MIN_COMPLEXITY: f32 = 0.1;
pub const MAX_COMPLEXITY: f32 = 0.3;

const SPAWN_COOLDOWN_MS: f64 = 300.0;
const LANE_FLASH_MS: f64 = 150.0;
const HIT_POINTS: u32 = 10;
const MIN_TILE_HEIGHT: f32 = 100.0;
const MAX_TILE_HEIGHT: f32 = 200.0;
const MIN_TILE_SPEED: f32 = 5.0;
const MAX_TILE_SPEED: f32 = 8.0;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FrameEvents {
    pub spawned: Option<u64>,
    pub merges: usize,
    pub misses: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitOutcome {
    Hit { lane: usize, tile_id: u64 },
    Miss { lane: usize },
}

/// Pitch samples collected since the current window opened.
#[derive(Debug, Default)]
struct SampleWindow {
    opened_at: Option<f64>,
    frequencies: Vec<f32>,
    vocal_votes: usize,
}

impl SampleWindow {
    fn push(&mut self, sample: &PitchSample) {
        if sample.frequency_hz <= 0.0 {
            return;
        }
        self.frequencies.push(sample.frequency_hz);
        if sample.is_vocal {
            self.vocal_votes += 1;
        }
    }

    /// Mean frequency and majority vocal vote, or `None` if nothing arrived.
    fn summary(&self) -> Option<(f32, bool)> {
        let total = self.frequencies.len();
        if total == 0 {
            return None;
        }
        let mean = self.frequencies.iter().sum::<f32>() / total as f32;
        Some((mean, self.vocal_votes >= total.div_ceil(2)))
    }

    fn restart(&mut self, now_ms: f64) {
        self.opened_at = Some(now_ms);
        self.frequencies.clear();
        self.vocal_votes = 0;
    }

    fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Turns the pitch stream into falling tiles and scores taps against them.
///
/// Drive it with [`TileEngine::tick`] once per rendered frame while playing.
/// Each tick runs aggregate, spawn, advance, merge and exit in that order.
pub struct TileEngine<R: Rng = StdRng> {
    layout: FieldLayout,
    lanes: [Vec<Tile>; LANE_COUNT],
    next_id: u64,
    window: SampleWindow,
    complexity: f32,
    last_spawn: Option<f64>,
    lane_flash: [Option<f64>; LANE_COUNT],
    state: GameState,
    scores: Box<dyn HighScoreStore>,
    rng: R,
    running: bool,
}

impl TileEngine<StdRng> {
    pub fn new(layout: FieldLayout, scores: Box<dyn HighScoreStore>) -> Self {
        Self::with_rng(layout, scores, StdRng::from_entropy())
    }
}

impl<R: Rng> TileEngine<R> {
    pub fn with_rng(layout: FieldLayout, scores: Box<dyn HighScoreStore>, rng: R) -> Self {
        let high_score = scores.load();
        Self {
            layout,
            lanes: Default::default(),
            next_id: 1,
            window: SampleWindow::default(),
            complexity: DEFAULT_COMPLEXITY,
            last_spawn: None,
            lane_flash: [None; LANE_COUNT],
            state: GameState {
                high_score,
                ..GameState::default()
            },
            scores,
            rng,
            running: false,
        }
    }

    pub fn layout(&self) -> &FieldLayout {
        &self.layout
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn complexity(&self) -> f32 {
        self.complexity
    }

    /// Aggregation window length in seconds, clamped to 0.1..=0.3.
    pub fn set_complexity(&mut self, complexity: f32) {
        self.complexity = complexity.clamp(MIN_COMPLEXITY, MAX_COMPLEXITY);
    }

    fn window_ms(&self) -> f64 {
        self.complexity as f64 * 1000.0
    }

    pub fn lane(&self, lane: usize) -> &[Tile] {
        self.lanes.get(lane).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn tiles(&self) -> impl Iterator<Item = &Tile> {
        self.lanes.iter().flatten()
    }

    pub fn tile_count(&self) -> usize {
        self.lanes.iter().map(Vec::len).sum()
    }

    /// Flash strength for a lane, fading from 1.0 to 0.0 over 150ms after a hit.
    pub fn lane_flash(&self, lane: usize, now_ms: f64) -> f32 {
        match self.lane_flash.get(lane).copied().flatten() {
            Some(at) if now_ms - at < LANE_FLASH_MS => (1.0 - (now_ms - at) / LANE_FLASH_MS) as f32,
            _ => 0.0,
        }
    }

    pub fn start(&mut self) {
        if !self.running {
            info!("Tile session started");
        }
        self.running = true;
    }

    /// Ends the session and clears everything except the high score.
    pub fn stop(&mut self) {
        if self.running {
            info!(
                "Tile session ended: score {} (best {})",
                self.state.score, self.state.high_score
            );
        }
        self.running = false;
        self.reset();
    }

    /// Halts the session and clears the field and combo; the score stays.
    pub fn pause(&mut self) {
        if self.running {
            info!("Tile session paused at score {}", self.state.score);
        }
        self.running = false;
        self.clear_field();
        self.state.combo = 0;
    }

    pub fn reset(&mut self) {
        self.clear_field();
        self.state.score = 0;
        self.state.combo = 0;
    }

    fn clear_field(&mut self) {
        for lane in &mut self.lanes {
            lane.clear();
        }
        self.window.clear();
        self.last_spawn = None;
        self.lane_flash = [None; LANE_COUNT];
    }

    pub fn tick(&mut self, sample: Option<&PitchSample>, now_ms: f64) -> FrameEvents {
        let mut events = FrameEvents::default();
        if !self.running {
            return events;
        }

        if let Some(sample) = sample {
            self.window.push(sample);
        }
        events.spawned = self.close_window(now_ms);

        for lane in &mut self.lanes {
            for tile in lane.iter_mut() {
                tile.y += tile.speed;
            }
            events.merges += merge_lane(lane);
        }

        let height = self.layout.height;
        for lane in &mut self.lanes {
            let before = lane.len();
            lane.retain(|tile| tile.y < height);
            events.misses += before - lane.len();
        }
        if events.misses > 0 {
            debug!("{} tile(s) missed", events.misses);
            self.state.combo = 0;
        }

        events
    }

    fn close_window(&mut self, now_ms: f64) -> Option<u64> {
        // The first tick of a session opens the window.
        let opened_at = *self.window.opened_at.get_or_insert(now_ms);
        if now_ms - opened_at < self.window_ms() {
            return None;
        }

        let summary = self.window.summary();
        self.window.restart(now_ms);
        let (frequency, is_vocal) = summary?;

        let lane = self.rng.gen_range(0..LANE_COUNT);
        let cooled = self
            .last_spawn
            .map_or(true, |last| now_ms - last > SPAWN_COOLDOWN_MS);
        if !cooled {
            return None;
        }

        let tile = Tile {
            id: self.next_id,
            lane,
            x: self.layout.tile_x(lane),
            y: 0.0,
            width: self.layout.tile_width(),
            height: self.rng.gen_range(MIN_TILE_HEIGHT..=MAX_TILE_HEIGHT),
            speed: self.rng.gen_range(MIN_TILE_SPEED..=MAX_TILE_SPEED),
            is_vocal,
        };
        self.next_id += 1;
        self.last_spawn = Some(now_ms);
        debug!(
            "Spawned tile {} in lane {} ({:.1} Hz, vocal: {})",
            tile.id, lane, frequency, is_vocal
        );
        let id = tile.id;
        self.lanes[lane].push(tile);
        Some(id)
    }

    /// Tap at horizontal field position `x`. Ignored while no session runs.
    pub fn tap(&mut self, x: f32, now_ms: f64) -> Option<HitOutcome> {
        let lane = self.layout.lane_at(x);
        self.tap_lane(lane, now_ms)
    }

    pub fn tap_lane(&mut self, lane: usize, now_ms: f64) -> Option<HitOutcome> {
        if !self.running {
            return None;
        }
        let lane = lane.min(LANE_COUNT - 1);
        let (top, bottom) = self.layout.hit_zone();

        let hit = self.lanes[lane]
            .iter()
            .position(|tile| tile.intersects(top, bottom));

        match hit {
            Some(index) => {
                let tile = self.lanes[lane].remove(index);
                self.state.score += HIT_POINTS;
                self.state.combo += 1;
                self.lane_flash[lane] = Some(now_ms);
                self.record_high_score();
                Some(HitOutcome::Hit {
                    lane,
                    tile_id: tile.id,
                })
            }
            None => {
                self.state.combo = 0;
                Some(HitOutcome::Miss { lane })
            }
        }
    }

    fn record_high_score(&mut self) {
        if self.state.score <= self.state.high_score {
            return;
        }
        self.state.high_score = self.state.score;
        if let Err(e) = self.scores.save(self.state.score) {
            warn!("Could not persist high score: {:#}", e);
        }
    }

    #[cfg(test)]
    fn place(&mut self, lane: usize, y: f32, height: f32, speed: f32) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        self.lanes[lane].push(Tile {
            id,
            lane,
            x: self.layout.tile_x(lane),
            y,
            width: self.layout.tile_width(),
            height,
            speed,
            is_vocal: false,
        });
        self.lanes[lane].sort_by(|a, b| a.y.total_cmp(&b.y));
        id
    }
}

/// Sorts a lane by `y` and folds every tile that touches or overlaps the
/// previous survivor into it. Returns how many tiles were absorbed.
fn merge_lane(tiles: &mut Vec<Tile>) -> usize {
    if tiles.len() < 2 {
        return 0;
    }
    tiles.sort_by(|a, b| a.y.total_cmp(&b.y));

    let mut absorbed = 0;
    let mut merged: Vec<Tile> = Vec::with_capacity(tiles.len());
    for tile in tiles.drain(..) {
        match merged.last_mut() {
            Some(survivor) if tile.y <= survivor.bottom() => {
                let end = survivor.bottom().max(tile.bottom());
                survivor.height = end - survivor.y;
                survivor.is_vocal |= tile.is_vocal;
                absorbed += 1;
            }
            _ => merged.push(tile),
        }
    }
    *tiles = merged;
    absorbed
}
