use spool_jobs::JobService;

/// Router state shared by every job route
#[derive(Clone, Debug)]
pub struct SpoolAxumState {
    pub jobs: JobService,
}

impl SpoolAxumState {
    pub fn new(jobs: JobService) -> Self {
        Self { jobs }
    }
}
