use std::panic::{self, AssertUnwindSafe};

/// Handle to a job running on the rayon pool
///
/// The job reports exactly one terminal value. If it panics, the channel
/// disconnects and the handle yields `None`.
pub struct BackgroundTask<T> {
    receiver: flume::Receiver<T>,
}

impl<T: Send + 'static> BackgroundTask<T> {
    /// Run `job` on the global rayon pool
    pub fn spawn<F>(job: F) -> Self
    where
        F: FnOnce() -> T + Send + 'static,
    {
        let (tx, rx) = flume::bounded(1);
        rayon::spawn(move || {
            // A panic on a rayon worker without a pool handler aborts the process
            if let Ok(value) = panic::catch_unwind(AssertUnwindSafe(job)) {
                // Receiver may be gone if the caller lost interest
                let _ = tx.send(value);
            }
        });
        Self { receiver: rx }
    }

    /// Run `job` on the rayon pool and hand its result to `on_done` there
    pub fn spawn_with_callback<F, C>(job: F, on_done: C)
    where
        F: FnOnce() -> T + Send + 'static,
        C: FnOnce(T) + Send + 'static,
    {
        rayon::spawn(move || {
            match panic::catch_unwind(AssertUnwindSafe(job)) {
                Ok(value) => on_done(value),
                Err(_) => log::warn!("background job panicked"),
            }
        });
    }

    /// Block until the job finishes
    pub fn wait(self) -> Option<T> {
        self.receiver.recv().ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_wait_returns_result() {
        let task = BackgroundTask::spawn(|| (1..=10u64).sum::<u64>());
        assert_eq!(task.wait(), Some(55));
    }

    #[test]
    fn test_callback_receives_result() {
        let (tx, rx) = flume::bounded(1);
        BackgroundTask::spawn_with_callback(|| "done".to_string(), move |value| {
            tx.send(value).unwrap();
        });
        assert_eq!(rx.recv_timeout(Duration::from_secs(10)).unwrap(), "done");
    }

    #[test]
    fn test_panicking_job_yields_none() {
        let task: BackgroundTask<u32> = BackgroundTask::spawn(|| panic!("boom"));
        assert_eq!(task.wait(), None);
    }
}
