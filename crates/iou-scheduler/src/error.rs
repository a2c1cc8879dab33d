use iou_core::LedgerError;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("unknown task: {0}")]
    UnknownTask(String),

    #[error("task {task} failed: {source}")]
    Task {
        task: &'static str,
        #[source]
        source: LedgerError,
    },
}
