//! Types and traits for recording training metrics.
//!
//! * [`Record`] - a container of tagged values written at one step
//! * [`RecordValue`] - the types of values a record can hold
//! * [`Recorder`] - the metrics sink interface, `(tag, value, step)` plus `flush`
//! * [`BufferedRecorder`] - keeps records in memory, used in tests
//! * [`NullRecorder`] - discards all records
//!
//! ```rust
//! use a3c_core::record::{BufferedRecorder, Record, RecordValue, Recorder};
//!
//! let mut recorder = BufferedRecorder::new();
//! let mut record = Record::empty();
//! record.insert("Perf/Reward", RecordValue::Scalar(-1.0));
//! record.insert("Perf/Length", RecordValue::Scalar(120.0));
//! recorder.write(5, record);
//! recorder.flush();
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
