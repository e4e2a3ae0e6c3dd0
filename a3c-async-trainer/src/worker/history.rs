/// Summary of one completed episode.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct EpisodeStats {
    /// Sum of the rewards of the episode.
    pub total_reward: f32,

    /// Number of environment steps of the episode.
    pub step_count: usize,

    /// Mean of the value estimates of the visited states.
    pub mean_value: f32,
}

/// Episodes completed by a worker, with rolling means over the most recent ones.
#[derive(Clone, Debug)]
pub struct EpisodeHistory {
    window: usize,
    episodes: Vec<EpisodeStats>,
}

impl EpisodeHistory {
    /// Creates an empty history averaging over the last `window` episodes.
    pub fn new(window: usize) -> Self {
        Self {
            window: window.max(1),
            episodes: Vec::new(),
        }
    }

    /// Appends a completed episode.
    pub fn push(&mut self, stats: EpisodeStats) {
        self.episodes.push(stats);
    }

    /// Number of recorded episodes.
    pub fn len(&self) -> usize {
        self.episodes.len()
    }

    /// Returns `true` if no episode was recorded.
    pub fn is_empty(&self) -> bool {
        self.episodes.is_empty()
    }

    fn recent(&self) -> &[EpisodeStats] {
        let start = self.episodes.len().saturating_sub(self.window);
        &self.episodes[start..]
    }

    fn mean(&self, f: impl Fn(&EpisodeStats) -> f32) -> f32 {
        let recent = self.recent();
        if recent.is_empty() {
            return 0.0;
        }
        recent.iter().map(f).sum::<f32>() / recent.len() as f32
    }

    /// Mean total reward of the recent episodes.
    pub fn mean_reward(&self) -> f32 {
        self.mean(|e| e.total_reward)
    }

    /// Mean length of the recent episodes.
    pub fn mean_length(&self) -> f32 {
        self.mean(|e| e.step_count as f32)
    }

    /// Mean of the per-episode mean values of the recent episodes.
    pub fn mean_value(&self) -> f32 {
        self.mean(|e| e.mean_value)
    }
}
