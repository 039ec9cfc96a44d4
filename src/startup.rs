use std::time::Duration;
use tokio::sync::oneshot;

/// Starts the loading delay on a background task.
///
/// The returned receiver resolves once the delay is over; whoever awaits it
/// resumes startup on its own task, the background task only signals.
pub fn begin_loading(delay: Duration) -> oneshot::Receiver<()> {
    let (done, resume) = oneshot::channel();
    tokio::spawn(async move {
        tokio::time::sleep(delay).await;
        let _ = done.send(());
    });
    resume
}
