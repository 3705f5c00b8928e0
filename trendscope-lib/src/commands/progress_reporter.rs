use crate::facts::Progress;
use core::fmt::{Debug, Formatter};
use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tokio::task::JoinHandle;

type StatusCallback = Box<dyn Fn() -> (u64, u64, String) + Send + Sync>;

const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

const BAR_TEMPLATE: &str = "{prefix:>10.bold.cyan} [{bar:30}] {msg}";
const BAR_TEMPLATE_NO_COLOR: &str = "{prefix:>10} [{bar:30}] {msg}";
const SPINNER_TEMPLATE: &str = "{prefix:>10.bold.cyan} {spinner} {msg}";
const SPINNER_TEMPLATE_NO_COLOR: &str = "{prefix:>10} {spinner} {msg}";
const SPINNER_TICKS: &str = "|/-\\ ";

struct Shared {
    reveal_at: Instant,
    revealed: AtomicBool,
    spinning: AtomicBool,
    phase_started: Mutex<Instant>,
    status: Mutex<StatusCallback>,
}

impl Debug for Shared {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Shared")
            .field("reveal_at", &self.reveal_at)
            .field("revealed", &self.revealed)
            .field("spinning", &self.spinning)
            .finish_non_exhaustive()
    }
}

/// Terminal progress display that stays hidden for short runs.
///
/// The bar is drawn on stderr once `delay` has passed. A background task polls the
/// current status callback and redraws at a fixed rate until [`Progress::done`].
pub struct ProgressReporter {
    bar: ProgressBar,
    shared: Arc<Shared>,
    refresh: JoinHandle<()>,
    use_colors: bool,
}

impl ProgressReporter {
    /// Create a reporter. Must be called from within a tokio runtime.
    #[must_use]
    pub fn new(delay: Duration, use_colors: bool) -> Self {
        let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::hidden());

        let shared = Arc::new(Shared {
            reveal_at: Instant::now() + delay,
            revealed: AtomicBool::new(false),
            spinning: AtomicBool::new(false),
            phase_started: Mutex::new(Instant::now()),
            status: Mutex::new(Box::new(|| (0u64, 0u64, String::new())) as StatusCallback),
        });

        Self {
            refresh: tokio::spawn(refresh(bar.clone(), Arc::clone(&shared))),
            bar,
            shared,
            use_colors,
        }
    }

    fn style(&self, colored: &str, plain: &str) -> ProgressStyle {
        let template = if self.use_colors { colored } else { plain };
        ProgressStyle::default_bar().template(template).expect("invalid progress template")
    }
}

impl Progress for ProgressReporter {
    fn set_phase(&self, phase: &str) {
        self.bar.set_prefix(phase.to_string());
        *self.shared.phase_started.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn set_determinate(&self, callback: Box<dyn Fn() -> (u64, u64, String) + Send + Sync + 'static>) {
        *self.shared.status.lock().unwrap_or_else(PoisonError::into_inner) = callback;
        self.shared.spinning.store(false, Ordering::Relaxed);
        self.bar.disable_steady_tick();
        self.bar.set_length(0);
        self.bar.set_position(0);
        self.bar
            .set_style(self.style(BAR_TEMPLATE, BAR_TEMPLATE_NO_COLOR).progress_chars("=> "));
    }

    fn set_indeterminate(&self, callback: Box<dyn Fn() -> String + Send + Sync + 'static>) {
        *self.shared.status.lock().unwrap_or_else(PoisonError::into_inner) = Box::new(move || (0u64, 0u64, callback()));
        *self.shared.phase_started.lock().unwrap_or_else(PoisonError::into_inner) = Instant::now();
        self.shared.spinning.store(true, Ordering::Relaxed);
        self.bar
            .set_style(self.style(SPINNER_TEMPLATE, SPINNER_TEMPLATE_NO_COLOR).tick_chars(SPINNER_TICKS));
        self.bar.enable_steady_tick(REFRESH_INTERVAL);
    }

    fn println(&self, msg: &str) {
        self.bar.suspend(|| eprintln!("{msg}"));
    }

    fn done(&self) {
        self.refresh.abort();
        if self.shared.revealed.load(Ordering::Relaxed) {
            self.bar.finish_and_clear();
        }
    }

    fn use_colors(&self) -> bool {
        self.use_colors
    }
}

impl Debug for ProgressReporter {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("bar", &self.bar)
            .field("shared", &self.shared)
            .field("use_colors", &self.use_colors)
            .finish_non_exhaustive()
    }
}

async fn refresh(bar: ProgressBar, shared: Arc<Shared>) {
    let mut interval = tokio::time::interval(REFRESH_INTERVAL);
    #[expect(clippy::infinite_loop, reason = "task runs until aborted")]
    loop {
        let _ = interval.tick().await;

        if !shared.revealed.load(Ordering::Relaxed) {
            if Instant::now() < shared.reveal_at {
                continue;
            }
            shared.revealed.store(true, Ordering::Relaxed);
            bar.set_draw_target(ProgressDrawTarget::stderr_with_hz(10));
        }

        let (length, position, mut message) = {
            let status = shared.status.lock().unwrap_or_else(PoisonError::into_inner);
            status()
        };

        if shared.spinning.load(Ordering::Relaxed) {
            let elapsed = shared.phase_started.lock().unwrap_or_else(PoisonError::into_inner).elapsed().as_secs();
            message = format!("{elapsed}s: {message}");
        }

        if length > 0 {
            bar.set_length(length);
            bar.set_position(position);
        }
        bar.set_message(message);
    }
}
