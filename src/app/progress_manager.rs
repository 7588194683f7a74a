//! Progress bar for a running transfer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use refetch_core::Counter;

/// Spawns the progress bar when requested.
/// Returns (handle, stop) so the caller can signal stop and await the handle.
/// When `use_bar` is false, returns (None, stop) with stop already true.
pub(crate) fn spawn_progress_ui<C>(
    use_bar: bool,
    counter: Arc<C>,
    total: u64,
) -> (Option<tokio::task::JoinHandle<()>>, Arc<AtomicBool>)
where
    C: Counter + Send + Sync + 'static,
{
    if !use_bar {
        return (None, Arc::new(AtomicBool::new(true)));
    }
    let stop = Arc::new(AtomicBool::new(false));
    let handle = spawn_bar_inner(counter, total, Arc::clone(&stop));
    (Some(handle), stop)
}

fn spawn_bar_inner<C>(
    counter: Arc<C>,
    total: u64,
    stop: Arc<AtomicBool>,
) -> tokio::task::JoinHandle<()>
where
    C: Counter + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let bar = ProgressBar::new(total);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner} [{elapsed_precise}] {wide_bar} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(100));

        while !stop.load(Ordering::SeqCst) {
            bar.set_position(counter.count().min(total));
            tokio::time::sleep(Duration::from_millis(120)).await;
        }

        bar.set_position(counter.count().min(total));
        bar.finish_and_clear();
    })
}
