pub struct TaskTimer {
    start_time: std::time::Instant,
    task_name: String,
}

impl TaskTimer {
    pub fn new(task_name: impl AsRef<str>) -> Self {
        let start_time = std::time::Instant::now();
        tracing::debug!(task = task_name.as_ref(), "task started");
        Self {
            start_time,
            task_name: task_name.as_ref().to_string(),
        }
    }

    pub fn stop(&self) {
        tracing::info!(
            task = %self.task_name,
            elapsed_ms = %format!("{:.1}", self.start_time.elapsed().as_secs_f64() * 1000.0),
            "task finished"
        );
    }
}
