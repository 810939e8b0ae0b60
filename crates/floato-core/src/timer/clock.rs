//! Countdown engine.
//!
//! A [`Clock`] runs at most one countdown at a time. Each `start` spawns a
//! background task that emits one [`Phase`] tick per wall-clock second over a
//! bounded channel: `Running(work_secs - 1)` down to `Running(0)`, then --
//! unless the break is skipped -- `OnBreak(break_secs)` down to `OnBreak(0)`,
//! after which the channel closes. The terminal `0` tick of each phase is the
//! signal the session layer keys its completion side effects on, so it is
//! always emitted.
//!
//! Cancellation is explicit: every run holds a [`CancellationToken`] that is
//! raced against both the ticker and the channel send, so `stop` (or a
//! superseding `start`) takes effect within one tick period even when the
//! consumer is slow. Each run owns its own channel, which is what guarantees
//! that ticks from a superseded run are never observed on the new receiver.

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

/// Default work interval: 25 minutes.
pub const DEFAULT_WORK_SECONDS: u32 = 25 * 60;
/// Break interval: 5 minutes.
pub const BREAK_SECONDS: u32 = 5 * 60;
/// Shortest allowed work interval.
pub const MIN_WORK_SECONDS: u32 = 60;
/// Longest allowed work interval.
pub const MAX_WORK_SECONDS: u32 = 3600;

/// Current mode of the countdown, with seconds remaining in the live phases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", content = "seconds_remaining", rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Running(u32),
    OnBreak(u32),
}

impl Phase {
    pub fn seconds_remaining(&self) -> u32 {
        match self {
            Phase::Idle => 0,
            Phase::Running(s) | Phase::OnBreak(s) => *s,
        }
    }

    pub fn is_idle(&self) -> bool {
        matches!(self, Phase::Idle)
    }
}

/// Single-run countdown engine.
///
/// Owns the cancellation token of the in-flight run, if any. `start` atomically
/// supersedes a previous run; `stop` is idempotent.
#[derive(Debug)]
pub struct Clock {
    break_seconds: u32,
    current: Option<CancellationToken>,
}

impl Default for Clock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock {
    pub fn new() -> Self {
        Self {
            break_seconds: BREAK_SECONDS,
            current: None,
        }
    }

    /// Override the break length. Used by tests that walk full sequences.
    pub fn with_break_seconds(break_seconds: u32) -> Self {
        Self {
            break_seconds,
            current: None,
        }
    }

    /// Begin a new countdown, cancelling any run still in flight.
    ///
    /// Returns the receiving end of this run's tick channel. The channel is
    /// bounded, so a slow consumer backpressures the producer rather than
    /// losing ticks. Must be called from within a Tokio runtime.
    pub fn start(&mut self, work_seconds: u32, skip_break: bool) -> mpsc::Receiver<Phase> {
        self.stop();
        let token = CancellationToken::new();
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(run_countdown(
            work_seconds,
            self.break_seconds,
            skip_break,
            tx,
            token.clone(),
        ));
        self.current = Some(token);
        rx
    }

    /// Cancel the in-flight run. No further ticks are emitted. Idempotent.
    pub fn stop(&mut self) {
        if let Some(token) = self.current.take() {
            token.cancel();
        }
    }
}

async fn run_countdown(
    work_seconds: u32,
    break_seconds: u32,
    skip_break: bool,
    tx: mpsc::Sender<Phase>,
    token: CancellationToken,
) {
    let mut ticker = interval(Duration::from_secs(1));
    // Burst keeps ticks from being coalesced when the consumer stalls briefly.
    ticker.set_missed_tick_behavior(MissedTickBehavior::Burst);

    for s in (0..work_seconds).rev() {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if deliver(&tx, Phase::Running(s), &token).await.is_err() {
            return;
        }
    }

    if skip_break {
        return;
    }

    for s in (0..=break_seconds).rev() {
        tokio::select! {
            _ = token.cancelled() => return,
            _ = ticker.tick() => {}
        }
        if deliver(&tx, Phase::OnBreak(s), &token).await.is_err() {
            return;
        }
    }
}

/// Send one tick, racing the cancellation token so a blocked send cannot
/// outlive a stop.
async fn deliver(
    tx: &mpsc::Sender<Phase>,
    phase: Phase,
    token: &CancellationToken,
) -> Result<(), ()> {
    tokio::select! {
        _ = token.cancelled() => Err(()),
        sent = tx.send(phase) => sent.map_err(|_| ()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect_all(mut rx: mpsc::Receiver<Phase>) -> Vec<Phase> {
        let mut out = Vec::new();
        while let Some(phase) = rx.recv().await {
            out.push(phase);
        }
        out
    }

    #[tokio::test(start_paused = true)]
    async fn full_sequence_with_break() {
        let mut clock = Clock::with_break_seconds(3);
        let ticks = collect_all(clock.start(5, false)).await;
        let expected = vec![
            Phase::Running(4),
            Phase::Running(3),
            Phase::Running(2),
            Phase::Running(1),
            Phase::Running(0),
            Phase::OnBreak(3),
            Phase::OnBreak(2),
            Phase::OnBreak(1),
            Phase::OnBreak(0),
        ];
        assert_eq!(ticks, expected);
    }

    #[tokio::test(start_paused = true)]
    async fn skip_break_ends_at_running_zero() {
        let mut clock = Clock::with_break_seconds(3);
        let ticks = collect_all(clock.start(2, true)).await;
        assert_eq!(ticks, vec![Phase::Running(1), Phase::Running(0)]);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_closes_channel_promptly() {
        let mut clock = Clock::new();
        let mut rx = clock.start(600, false);
        assert_eq!(rx.recv().await, Some(Phase::Running(599)));
        clock.stop();
        // Remaining ticks are never delivered once the token fires.
        let mut after_stop = Vec::new();
        while let Some(phase) = rx.recv().await {
            after_stop.push(phase);
        }
        assert!(after_stop.len() <= 1, "stale run kept ticking: {after_stop:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn new_start_supersedes_old_run() {
        let mut clock = Clock::with_break_seconds(1);
        let mut old_rx = clock.start(600, false);
        assert_eq!(old_rx.recv().await, Some(Phase::Running(599)));

        let mut new_rx = clock.start(3, true);
        assert_eq!(new_rx.recv().await, Some(Phase::Running(2)));

        // The superseded run's channel drains and closes without reaching its
        // terminal tick.
        let mut leftovers = Vec::new();
        while let Some(phase) = old_rx.recv().await {
            leftovers.push(phase);
        }
        assert!(!leftovers.contains(&Phase::Running(0)));
        assert!(leftovers.iter().all(|p| matches!(p, Phase::Running(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn stop_is_idempotent() {
        let mut clock = Clock::new();
        let _rx = clock.start(60, false);
        clock.stop();
        clock.stop();
    }

    #[test]
    fn phase_seconds_remaining() {
        assert_eq!(Phase::Idle.seconds_remaining(), 0);
        assert_eq!(Phase::Running(90).seconds_remaining(), 90);
        assert_eq!(Phase::OnBreak(12).seconds_remaining(), 12);
    }

    #[test]
    fn phase_serde_shape() {
        let json = serde_json::to_string(&Phase::Running(1499)).unwrap();
        assert_eq!(json, r#"{"phase":"running","seconds_remaining":1499}"#);
        let back: Phase = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Phase::Running(1499));
    }
}
