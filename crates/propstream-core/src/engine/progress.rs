#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: &'static str },
    PhaseFinish,

    ModelLoaded { id: String },
    ModelSkipped { id: String, reason: String },

    RecordsProcessed { count: u64 },
    RecordSkipped { reason: String },
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn callback_receives_every_event() {
        let seen = Mutex::new(Vec::new());
        let reporter = ProgressReporter::with_callback(Box::new(|event| {
            if let Progress::RecordsProcessed { count } = event {
                seen.lock().unwrap().push(count);
            }
        }));
        reporter.report(Progress::RecordsProcessed { count: 100 });
        reporter.report(Progress::PhaseFinish);
        reporter.report(Progress::RecordsProcessed { count: 200 });
        drop(reporter);
        assert_eq!(seen.into_inner().unwrap(), vec![100, 200]);
    }

    #[test]
    fn reporter_without_callback_is_silent() {
        ProgressReporter::new().report(Progress::PhaseFinish);
    }
}
