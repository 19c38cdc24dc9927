use std::thread;

use iced::futures::channel::oneshot;

/// Runs `job` on a dedicated OS thread and resolves with its return value.
///
/// The blocking HTTP client must never be driven from inside the iced
/// executor, so every detection request goes through here.
pub async fn run_blocking<T, F>(job: F) -> Result<T, String>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let (tx, rx) = oneshot::channel();
    thread::spawn(move || {
        let _ = tx.send(job());
    });
    rx.await
        .map_err(|_| "worker thread stopped unexpectedly".to_string())
}
