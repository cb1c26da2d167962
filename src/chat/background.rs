// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2025 Blackman Artificial Intelligence Technologies Inc.

//! Background task supervision
//!
//! Three periodic loops run next to the turns of a session:
//! - the thinking timer, one per turn, counting seconds and enforcing the
//!   turn ceiling
//! - the session health monitor, pinging the thread while files exist
//! - the timestamp reaper, dropping expired uploads
//!
//! Each loop owns a `CancellationToken` and stops as soon as it fires.
//! Errors inside a loop are logged and the loop carries on.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::files::FileLifecycleManager;
use crate::llm::assistant::AssistantService;

use super::events::{EventEmitter, SessionEvent};
use super::state::{SharedState, TurnOutcome};

/// A spawned loop and the token that stops it
#[derive(Debug)]
pub struct BackgroundTask {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl BackgroundTask {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Signal the loop to stop without waiting for it
    pub fn stop(&self) {
        self.token.cancel();
    }

    /// Signal the loop to stop and wait until it has
    pub async fn shutdown(self) {
        self.token.cancel();
        if let Err(e) = self.handle.await {
            tracing::warn!(target: "leyia.chat.background", task = self.name, error = %e, "task ended abnormally");
        }
    }
}

/// Best-effort remote cancellation of a run, bounded by `timeout`
pub async fn cancel_remote_run(
    assistant: &dyn AssistantService,
    thread_id: &str,
    run_id: &str,
    timeout: Duration,
) -> bool {
    match tokio::time::timeout(timeout, assistant.cancel_run(thread_id, run_id)).await {
        Ok(Ok(())) => {
            tracing::info!(target: "leyia.chat.background", %run_id, "run cancelled remotely");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(target: "leyia.chat.background", %run_id, error = %e, "remote cancel failed");
            false
        }
        Err(_) => {
            tracing::warn!(target: "leyia.chat.background", %run_id, "remote cancel timed out");
            false
        }
    }
}

fn ticker(period: Duration) -> tokio::time::Interval {
    let mut interval = interval_at(Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval
}

/// Count thinking seconds for `turn_id` and time the turn out at `ceiling`.
///
/// `turn_token` is shared with the turn task: the timer stops when it fires,
/// and fires it itself on timeout so the turn task stops too.
pub fn spawn_thinking_timer(
    state: SharedState,
    events: EventEmitter,
    assistant: Arc<dyn AssistantService>,
    turn_id: u64,
    ceiling: Duration,
    remote_cancel_timeout: Duration,
    turn_token: CancellationToken,
) -> BackgroundTask {
    let token = turn_token.clone();
    let ceiling_secs = ceiling.as_secs().max(1);

    let handle = tokio::spawn(async move {
        let mut ticks = ticker(Duration::from_secs(1));
        loop {
            tokio::select! {
                biased;
                _ = turn_token.cancelled() => break,
                _ = ticks.tick() => {}
            }

            let (seconds, timed_out) = {
                let mut state = state.lock().await;
                let Some(seconds) = state.tick(turn_id) else {
                    break;
                };
                if seconds >= ceiling_secs {
                    let ids = state.thread_id.clone().zip(state.run_id.clone());
                    state.finish_turn(turn_id, TurnOutcome::TimedOut);
                    (seconds, Some(ids))
                } else {
                    (seconds, None)
                }
            };

            events.emit(SessionEvent::ThinkingTick { turn_id, seconds });

            if let Some(ids) = timed_out {
                tracing::error!(target: "leyia.chat.background", turn_id, seconds, "turn exceeded its time limit");
                events.emit(SessionEvent::TurnFinished {
                    turn_id,
                    outcome: TurnOutcome::TimedOut,
                });
                turn_token.cancel();
                if let Some((thread_id, run_id)) = ids {
                    cancel_remote_run(&*assistant, &thread_id, &run_id, remote_cancel_timeout)
                        .await;
                }
                break;
            }
        }
        tracing::debug!(target: "leyia.chat.background", turn_id, "thinking timer stopped");
    });

    BackgroundTask {
        name: "thinking_timer",
        token,
        handle,
    }
}

/// Ping the thread every `period` while files are registered; a missing
/// thread reaps the orphaned files.
pub fn spawn_health_monitor(
    state: SharedState,
    assistant: Arc<dyn AssistantService>,
    files: Arc<FileLifecycleManager>,
    period: Duration,
    token: CancellationToken,
) -> BackgroundTask {
    let stop = token.clone();
    let handle = tokio::spawn(async move {
        tracing::info!(target: "leyia.chat.background", "session health monitor started");
        let mut ticks = ticker(period);
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticks.tick() => {}
            }

            let thread_id = {
                let state = state.lock().await;
                if state.files.is_empty() {
                    None
                } else {
                    state.thread_id.clone()
                }
            };
            let Some(thread_id) = thread_id else {
                continue;
            };

            let check = tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                check = assistant.retrieve_thread(&thread_id) => check,
            };
            match check {
                Ok(()) => {
                    tracing::debug!(target: "leyia.chat.background", %thread_id, "thread alive");
                }
                Err(e) if e.is_not_found() => {
                    tracing::warn!(target: "leyia.chat.background", %thread_id, "thread not found, cleaning up files");
                    files.reap_orphans().await;
                }
                Err(e) => {
                    tracing::error!(target: "leyia.chat.background", %thread_id, error = %e, "thread check failed");
                }
            }
        }
        tracing::info!(target: "leyia.chat.background", "session health monitor stopped");
    });

    BackgroundTask {
        name: "health_monitor",
        token,
        handle,
    }
}

/// Drop uploads older than the configured age every `period`
pub fn spawn_timestamp_reaper(
    files: Arc<FileLifecycleManager>,
    period: Duration,
    token: CancellationToken,
) -> BackgroundTask {
    let stop = token.clone();
    let handle = tokio::spawn(async move {
        tracing::info!(target: "leyia.chat.background", "timestamp reaper started");
        let mut ticks = ticker(period);
        loop {
            tokio::select! {
                biased;
                _ = stop.cancelled() => break,
                _ = ticks.tick() => {}
            }
            let reaped = files.reap_by_age().await;
            if reaped > 0 {
                tracing::info!(target: "leyia.chat.background", reaped, "expired files removed");
            }
        }
        tracing::info!(target: "leyia.chat.background", "timestamp reaper stopped");
    });

    BackgroundTask {
        name: "timestamp_reaper",
        token,
        handle,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::state::{SessionState, TIMEOUT_NOTICE};
    use crate::config::IngestionConfig;
    use crate::ingest::DocumentExtractor;
    use crate::llm::mock_provider::{CancelBehavior, MockAssistant};

    fn files_manager(mock: &MockAssistant, state: &SharedState) -> Arc<FileLifecycleManager> {
        Arc::new(FileLifecycleManager::new(
            Arc::new(mock.clone()),
            Arc::new(DocumentExtractor::new(IngestionConfig::default())),
            state.clone(),
            EventEmitter::new(),
            Duration::from_secs(7200),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_thinking_timer_counts_seconds() {
        let state = SessionState::new(80, 3).shared();
        let turn = state.lock().await.begin_turn("hola").unwrap();
        let token = CancellationToken::new();
        let mock = MockAssistant::new();

        let timer = spawn_thinking_timer(
            state.clone(),
            EventEmitter::new(),
            Arc::new(mock),
            turn,
            Duration::from_secs(600),
            Duration::from_secs(10),
            token.clone(),
        );

        tokio::time::sleep(Duration::from_millis(3500)).await;
        assert_eq!(state.lock().await.thinking_seconds, 3);

        token.cancel();
        timer.shutdown().await;
        assert!(state.lock().await.processing);
    }

    #[tokio::test(start_paused = true)]
    async fn test_thinking_timer_enforces_ceiling() {
        let state = SessionState::new(80, 3).shared();
        let turn = {
            let mut s = state.lock().await;
            let turn = s.begin_turn("hola").unwrap();
            s.thread_id = Some("thread_1".to_string());
            s.set_run_id(turn, "run_1");
            turn
        };
        let token = CancellationToken::new();
        let mock = MockAssistant::new();
        mock.set_cancel_behavior(CancelBehavior::Fail);

        let timer = spawn_thinking_timer(
            state.clone(),
            EventEmitter::new(),
            Arc::new(mock.clone()),
            turn,
            Duration::from_secs(5),
            Duration::from_secs(10),
            token.clone(),
        );
        timer.handle.await.unwrap();

        let state = state.lock().await;
        assert!(!state.processing);
        assert_eq!(state.messages.last().unwrap().content, TIMEOUT_NOTICE);
        assert!(token.is_cancelled());
        assert_eq!(
            mock.recorded_cancels(),
            vec![("thread_1".to_string(), "run_1".to_string())]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_thinking_timer_stops_when_turn_ends() {
        let state = SessionState::new(80, 3).shared();
        let turn = state.lock().await.begin_turn("hola").unwrap();
        let timer = spawn_thinking_timer(
            state.clone(),
            EventEmitter::new(),
            Arc::new(MockAssistant::new()),
            turn,
            Duration::from_secs(600),
            Duration::from_secs(10),
            CancellationToken::new(),
        );

        state.lock().await.finish_turn(turn, TurnOutcome::Completed);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(timer.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_monitor_reaps_when_thread_missing() {
        let state = SessionState::new(80, 3).shared();
        let mock = MockAssistant::new();
        let files = files_manager(&mock, &state);
        files
            .register(b"contenido", "a.txt", &|_| {})
            .await
            .unwrap();
        state.lock().await.thread_id = Some("thread_gone".to_string());
        mock.mark_thread_missing("thread_gone");

        let monitor = spawn_health_monitor(
            state.clone(),
            Arc::new(mock.clone()),
            files,
            Duration::from_secs(300),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_secs(301)).await;
        {
            let state = state.lock().await;
            assert!(state.files.is_empty());
            assert!(state.thread_id.is_none());
        }
        assert_eq!(mock.deleted_files().len(), 1);

        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_monitor_survives_failed_check() {
        let state = SessionState::new(80, 3).shared();
        let mock = MockAssistant::new();
        let files = files_manager(&mock, &state);
        files
            .register(b"contenido", "a.txt", &|_| {})
            .await
            .unwrap();
        state.lock().await.thread_id = Some("thread_gone".to_string());
        mock.set_fail_thread_checks(1);
        mock.mark_thread_missing("thread_gone");

        let monitor = spawn_health_monitor(
            state.clone(),
            Arc::new(mock.clone()),
            files,
            Duration::from_secs(300),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert!(!monitor.is_finished());
        assert_eq!(state.lock().await.files.uploaded().len(), 1);
        assert!(mock.deleted_files().is_empty());

        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(!monitor.is_finished());
        {
            let state = state.lock().await;
            assert!(state.files.is_empty());
            assert!(state.thread_id.is_none());
        }
        assert_eq!(mock.deleted_files().len(), 1);

        monitor.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_health_monitor_idle_without_files() {
        let state = SessionState::new(80, 3).shared();
        let mock = MockAssistant::new();
        state.lock().await.thread_id = Some("thread_gone".to_string());
        mock.mark_thread_missing("thread_gone");

        let monitor = spawn_health_monitor(
            state.clone(),
            Arc::new(mock.clone()),
            files_manager(&mock, &state),
            Duration::from_secs(300),
            CancellationToken::new(),
        );
        tokio::time::sleep(Duration::from_secs(901)).await;
        assert_eq!(state.lock().await.thread_id.as_deref(), Some("thread_gone"));

        monitor.stop();
        tokio::time::sleep(Duration::from_millis(1)).await;
        assert!(monitor.is_finished());
    }

    #[tokio::test(start_paused = true)]
    async fn test_reaper_stops_on_cancel() {
        let state = SessionState::new(80, 3).shared();
        let mock = MockAssistant::new();
        let reaper = spawn_timestamp_reaper(
            files_manager(&mock, &state),
            Duration::from_secs(3600),
            CancellationToken::new(),
        );
        tokio::time::sleep(Duration::from_secs(3601)).await;
        assert!(!reaper.is_finished());
        assert_eq!(reaper.name(), "timestamp_reaper");
        reaper.shutdown().await;
    }
}
