use super::Record;

/// Writes records to a metrics sink.
///
/// Every value in a [`Record`] is a tagged scalar (or other [`RecordValue`])
/// attached to the given step index. Delivery may be buffered until
/// [`Recorder::flush`] is called.
///
/// [`RecordValue`]: super::RecordValue
pub trait Recorder {
    /// Writes all values of a record at the given step.
    fn write(&mut self, step: usize, record: Record);

    /// Writes a single tagged scalar at the given step.
    fn add_scalar(&mut self, tag: &str, value: f32, step: usize) {
        self.write(step, Record::from_scalar(tag, value));
    }

    /// Forces delivery of buffered values.
    fn flush(&mut self);
}

impl<R: Recorder + ?Sized> Recorder for Box<R> {
    fn write(&mut self, step: usize, record: Record) {
        (**self).write(step, record)
    }

    fn add_scalar(&mut self, tag: &str, value: f32, step: usize) {
        (**self).add_scalar(tag, value, step)
    }

    fn flush(&mut self) {
        (**self).flush()
    }
}
