use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;

/// Points added per animation tick.
pub const PROGRESS_STEP: u8 = 5;
/// Delay between animation ticks.
pub const PROGRESS_CADENCE: Duration = Duration::from_millis(50);

/// Values shown while the progress bar climbs to `target`: `0, 5, 10, ..` and
/// finally `target` itself, which ends the sequence.
#[derive(Debug, Clone)]
pub struct ProgressSteps {
    target: u8,
    next: Option<u8>,
}

impl ProgressSteps {
    pub fn new(target: u8) -> Self {
        Self {
            target,
            next: Some(0),
        }
    }
}

impl Iterator for ProgressSteps {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let current = self.next?;
        if current >= self.target {
            self.next = None;
            return Some(self.target);
        }
        self.next = Some(current.saturating_add(PROGRESS_STEP));
        Some(current)
    }
}

/// A running progress animation writing into the displayed progress value.
///
/// Once cancelled it never writes again, even if a tick was already due.
#[derive(Debug)]
pub struct ProgressAnimator {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl ProgressAnimator {
    pub fn spawn(target: u8, display: Arc<watch::Sender<u8>>) -> Self {
        Self::spawn_with_cadence(target, PROGRESS_CADENCE, display)
    }

    pub fn spawn_with_cadence(
        target: u8,
        cadence: Duration,
        display: Arc<watch::Sender<u8>>,
    ) -> Self {
        let cancel = CancellationToken::new();
        let handle = tokio::spawn(animate(
            ProgressSteps::new(target),
            cadence,
            display,
            cancel.clone(),
        ));
        Self { cancel, handle }
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Wait for the animation to run out (or stop after cancellation).
    pub async fn finished(self) {
        let _ = self.handle.await;
    }
}

async fn animate(
    steps: ProgressSteps,
    cadence: Duration,
    display: Arc<watch::Sender<u8>>,
    cancel: CancellationToken,
) {
    let mut ticker = time::interval(cadence);
    for value in steps {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {}
        }
        // Checked under the channel's lock: a reset that follows `cancel()` always wins.
        let written = display.send_if_modified(|shown| {
            if cancel.is_cancelled() {
                return false;
            }
            *shown = value;
            true
        });
        if !written {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn climbs_in_steps_and_clips_to_target() {
        let seq: Vec<u8> = ProgressSteps::new(42).collect();
        assert_eq!(seq, vec![0, 5, 10, 15, 20, 25, 30, 35, 40, 42]);
    }

    #[test]
    fn zero_target_emits_once() {
        let seq: Vec<u8> = ProgressSteps::new(0).collect();
        assert_eq!(seq, vec![0]);
    }

    #[test]
    fn target_on_step_boundary_is_not_repeated() {
        let seq: Vec<u8> = ProgressSteps::new(40).collect();
        assert_eq!(seq, vec![0, 5, 10, 15, 20, 25, 30, 35, 40]);
    }

    #[test]
    fn full_score_ends_at_hundred() {
        let seq: Vec<u8> = ProgressSteps::new(100).collect();
        assert_eq!(seq.len(), 21);
        assert_eq!(seq.last(), Some(&100));
        assert!(seq.iter().all(|v| *v <= 100));
    }

    #[test]
    fn small_target_below_first_step() {
        let seq: Vec<u8> = ProgressSteps::new(3).collect();
        assert_eq!(seq, vec![0, 3]);
    }

    #[tokio::test(start_paused = true)]
    async fn animation_settles_on_target() {
        let (tx, rx) = watch::channel(0u8);
        let animator = ProgressAnimator::spawn(42, Arc::new(tx));
        animator.finished().await;
        assert_eq!(*rx.borrow(), 42);
    }

    #[tokio::test(start_paused = true)]
    async fn steps_arrive_every_fifty_millis() {
        let (tx, rx) = watch::channel(0u8);
        let _animator = ProgressAnimator::spawn(100, Arc::new(tx));

        time::sleep(Duration::from_millis(49)).await;
        assert_eq!(*rx.borrow(), 0);
        time::sleep(Duration::from_millis(52)).await;
        assert_eq!(*rx.borrow(), 10);
        time::sleep(Duration::from_millis(50)).await;
        assert_eq!(*rx.borrow(), 15);
        time::sleep(Duration::from_millis(1_000)).await;
        assert_eq!(*rx.borrow(), 100);
    }

    #[tokio::test(start_paused = true)]
    async fn cancelled_animation_stops_writing() {
        let (tx, rx) = watch::channel(0u8);
        let animator = ProgressAnimator::spawn(100, Arc::new(tx));
        time::sleep(Duration::from_millis(120)).await;
        animator.cancel();
        let frozen = *rx.borrow();
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(*rx.borrow(), frozen);
        assert!(frozen < 100);
        assert!(animator.is_cancelled());
    }
}
