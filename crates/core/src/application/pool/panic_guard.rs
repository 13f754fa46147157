// Panic isolation for pooled jobs
use std::any::Any;
use tracing::error;

/// Turn a panic payload into a readable message.
///
/// Tokio catches the unwind at the task boundary; this only extracts the
/// `&str`/`String` the job panicked with so it can be reported as a fault.
pub fn panic_message(payload: Box<dyn Any + Send>) -> String {
    let panic_msg = if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    };

    error!(panic_msg = %panic_msg, "Pooled job panicked");
    panic_msg
}
