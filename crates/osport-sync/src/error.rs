/// Errors that can occur in thread lifecycle operations.
///
/// Lock and condition-variable failures are not represented here: a
/// platform that cannot create or operate a lock leaves no safe way to
/// continue, so those paths abort the process instead (see [`crate::Mutex`]).
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// The native thread-creation call failed.
    #[error("thread creation failed (os error {0})")]
    Spawn(i32),

    /// The native join call failed.
    #[error("thread join failed (os error {0})")]
    Join(i32),
}

pub type Result<T> = std::result::Result<T, SyncError>;
