use super::{Record, RecordValue, Recorder};
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Buffer {
    records: Vec<(usize, Record)>,
    n_flushes: usize,
}

/// Buffered recorder.
///
/// Keeps every written record in memory. Clones share the same buffer, so a
/// clone handed to a worker thread can be inspected from the spawning thread.
#[derive(Clone, Default)]
pub struct BufferedRecorder {
    buf: Arc<Mutex<Buffer>>,
}

impl BufferedRecorder {
    /// Construct the recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the written records with their steps.
    pub fn records(&self) -> Vec<(usize, Record)> {
        self.buf.lock().unwrap().records.clone()
    }

    /// Returns `(step, value)` of every scalar written under `tag`, in write order.
    pub fn scalars(&self, tag: &str) -> Vec<(usize, f32)> {
        self.buf
            .lock()
            .unwrap()
            .records
            .iter()
            .filter_map(|(step, record)| match record.get(tag) {
                Some(RecordValue::Scalar(v)) => Some((*step, *v)),
                _ => None,
            })
            .collect()
    }

    /// Returns how many times [`Recorder::flush`] was called.
    pub fn n_flushes(&self) -> usize {
        self.buf.lock().unwrap().n_flushes
    }
}

impl Recorder for BufferedRecorder {
    /// Write a [`Record`] to the buffer.
    fn write(&mut self, step: usize, record: Record) {
        self.buf.lock().unwrap().records.push((step, record));
    }

    fn flush(&mut self) {
        self.buf.lock().unwrap().n_flushes += 1;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_clones_share_buffer() {
        let recorder = BufferedRecorder::new();
        let mut writer = recorder.clone();

        writer.add_scalar("Perf/Reward", 1.0, 3);
        writer.add_scalar("Perf/Length", 10.0, 3);
        writer.add_scalar("Perf/Reward", 2.0, 4);
        writer.flush();

        assert_eq!(recorder.scalars("Perf/Reward"), vec![(3, 1.0), (4, 2.0)]);
        assert_eq!(recorder.records().len(), 3);
        assert_eq!(recorder.n_flushes(), 1);
    }
}
