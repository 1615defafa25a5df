use super::terminal::Terminal;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

pub const SPINNER_FRAMES: [char; 8] = ['⣾', '⣷', '⣯', '⣟', '⡿', '⢿', '⣻', '⣽'];

/// Busy indicator painted in place while a request is pending.
///
/// `start` and `stop` may race with each other and with the tick; the
/// `running` flag is only ever flipped by compare-and-swap, so exactly one
/// caller wins each transition.
pub struct Spinner {
    terminal: Arc<dyn Terminal>,
    running: Arc<AtomicBool>,
    /// Bumped on every successful start so a ticker that outlived its
    /// `stop` can tell it has been superseded.
    generation: Arc<AtomicU64>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Spinner {
    pub fn new(terminal: Arc<dyn Terminal>) -> Self {
        Self {
            terminal,
            running: Arc::new(AtomicBool::new(false)),
            generation: Arc::new(AtomicU64::new(0)),
            task: Mutex::new(None),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Start repainting every `interval`. No effect while already running.
    /// Must be called from within a tokio runtime.
    pub fn start(&self, interval: Duration) {
        // The slot lock is held across the flag flip so a concurrent `stop`
        // can never take a handle it did not stop.
        let mut slot = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;

        let terminal = Arc::clone(&self.terminal);
        let running = Arc::clone(&self.running);
        let current = Arc::clone(&self.generation);
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut frame = 0usize;
            loop {
                ticker.tick().await;
                if !running.load(Ordering::SeqCst) || current.load(Ordering::SeqCst) != generation {
                    break;
                }
                let glyph = SPINNER_FRAMES[frame % SPINNER_FRAMES.len()];
                terminal.print(&format!("\r{glyph}"));
                frame += 1;
            }
        });

        if let Some(stale) = slot.replace(handle) {
            stale.abort();
        }
    }

    /// Stop the ticker and clear the glyph. No effect while already stopped.
    pub fn stop(&self) {
        let mut slot = self.task.lock().unwrap_or_else(|e| e.into_inner());
        if self
            .running
            .compare_exchange(true, false, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        if let Some(handle) = slot.take() {
            handle.abort();
        }
        drop(slot);
        self.terminal.print("\r");
    }
}

impl Drop for Spinner {
    fn drop(&mut self) {
        if let Some(handle) = self
            .task
            .get_mut()
            .unwrap_or_else(|e| e.into_inner())
            .take()
        {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::RecordingTerminal;

    fn spinner() -> (Spinner, Arc<RecordingTerminal>) {
        let terminal = Arc::new(RecordingTerminal::default());
        (Spinner::new(terminal.clone()), terminal)
    }

    #[tokio::test(start_paused = true)]
    async fn paints_frames_in_order_with_carriage_return() {
        let (spinner, terminal) = spinner();
        spinner.start(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(250)).await;
        spinner.stop();

        let writes = terminal.writes();
        assert_eq!(writes[..3], ["\r⣾", "\r⣷", "\r⣯"]);
        assert_eq!(writes.last().map(String::as_str), Some("\r"));
    }

    #[tokio::test(start_paused = true)]
    async fn double_start_runs_a_single_ticker() {
        let (spinner, terminal) = spinner();
        spinner.start(Duration::from_millis(100));
        spinner.start(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(350)).await;
        spinner.stop();

        let frames = terminal
            .writes()
            .iter()
            .filter(|w| w.len() > 1)
            .count();
        // Ticks at 0, 100, 200 and 300 ms.
        assert_eq!(frames, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn double_stop_clears_once() {
        let (spinner, terminal) = spinner();
        spinner.start(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(50)).await;
        spinner.stop();
        spinner.stop();
        assert!(!spinner.is_running());

        let clears = terminal.writes().iter().filter(|w| *w == "\r").count();
        assert_eq!(clears, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_without_start_prints_nothing() {
        let (spinner, terminal) = spinner();
        spinner.stop();
        assert!(terminal.writes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn no_frames_after_stop() {
        let (spinner, terminal) = spinner();
        spinner.start(Duration::from_millis(100));
        tokio::time::sleep(Duration::from_millis(150)).await;
        spinner.stop();
        let before = terminal.writes().len();
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(terminal.writes().len(), before);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn racing_start_and_stop_keep_flag_and_ticker_in_step() {
        let (spinner, _terminal) = spinner();
        let spinner = Arc::new(spinner);
        for _ in 0..200 {
            let starter = Arc::clone(&spinner);
            let stopper = Arc::clone(&spinner);
            let a = tokio::spawn(async move { starter.start(Duration::from_millis(5)) });
            let b = tokio::spawn(async move { stopper.stop() });
            a.await.unwrap();
            b.await.unwrap();

            {
                let slot = spinner.task.lock().unwrap();
                assert_eq!(spinner.is_running(), slot.is_some());
                if let Some(handle) = slot.as_ref() {
                    assert!(!handle.is_finished());
                }
            }
            spinner.stop();
        }
    }
}
