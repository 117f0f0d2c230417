/// Tunables for the job service
#[derive(Debug, Clone)]
pub struct JobConfig {
    /// Handler attempts per line before the line is skipped
    pub max_line_attempts: u32,
    /// Largest `total_chunks` accepted at init
    pub max_chunks: u32,
    /// Finished jobs kept for status queries; the oldest are evicted first
    pub completed_retention: usize,
    /// Keep staged chunks and the merged file after success or cancellation
    pub retain_staging: bool,
}

impl Default for JobConfig {
    fn default() -> Self {
        Self {
            max_line_attempts: 3,
            max_chunks: 10_000,
            completed_retention: 1024,
            retain_staging: false,
        }
    }
}

impl JobConfig {
    pub fn with_max_line_attempts(mut self, attempts: u32) -> Self {
        self.max_line_attempts = attempts.max(1);
        self
    }

    pub fn with_max_chunks(mut self, max_chunks: u32) -> Self {
        self.max_chunks = max_chunks;
        self
    }

    pub fn with_completed_retention(mut self, retention: usize) -> Self {
        self.completed_retention = retention;
        self
    }

    pub fn with_retain_staging(mut self, retain: bool) -> Self {
        self.retain_staging = retain;
        self
    }
}
