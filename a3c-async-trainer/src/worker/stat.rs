use std::time::Duration;

/// Stats of the episode loop of a [`Worker`](crate::Worker).
#[derive(Clone, Debug, Default)]
pub struct WorkerStat {
    /// The number of episodes completed by the worker.
    pub episodes: usize,

    /// The number of steps for interaction between model and env.
    pub env_steps: usize,

    /// The number of training steps applied to the global model.
    pub train_steps: usize,

    /// Duration of the episode loop.
    pub duration: Duration,
}

/// Returns a formatted string of the set of [`WorkerStat`] for reporting.
pub fn worker_stats_fmt(stats: &[WorkerStat]) -> String {
    let mut s = "worker id, episodes, env steps, train steps, duration [sec], steps per sec\n"
        .to_string();
    for (i, stat) in stats.iter().enumerate() {
        let d = stat.duration.as_secs_f32();
        let p = if d > 0.0 {
            stat.env_steps as f32 / d
        } else {
            0.0
        };
        s += format!(
            "{}, {}, {}, {}, {}, {}\n",
            i, stat.episodes, stat.env_steps, stat.train_steps, d, p
        )
        .as_str();
    }
    s
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_worker_stats_fmt() {
        let stats = vec![WorkerStat {
            episodes: 3,
            env_steps: 60,
            train_steps: 6,
            duration: Duration::from_secs(2),
        }];
        let s = worker_stats_fmt(&stats);
        let lines = s.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], "0, 3, 60, 6, 2, 30");
    }
}
