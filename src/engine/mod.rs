//! Analysis engine: admits frames, runs the pose source, consults the
//! result cache and feeds sessions.

pub mod admission;
pub mod stats;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::cache::{compute_signature, ResultCache};
use crate::config::Config;
use crate::error::{EngineError, EngineResult};
use crate::pattern::PatternRegistry;
use crate::pose::PoseSource;
use crate::session::{AnalysisSession, FrameAnalysisResponse, FrameResult, SessionId, SessionSummary};

pub use admission::{Admission, AdmissionController, DrainGuard, PendingFrame};
pub use stats::PerformanceStats;

fn now_ms() -> u64 {
    chrono::Utc::now().timestamp_millis().max(0) as u64
}

/// A session plus a copy of its newest result, readable while the session
/// itself is locked for scoring
struct SessionSlot {
    session: Mutex<AnalysisSession>,
    latest: Mutex<Option<FrameResult>>,
}

impl SessionSlot {
    fn new(session: AnalysisSession) -> Self {
        Self {
            session: Mutex::new(session),
            latest: Mutex::new(None),
        }
    }

    fn latest(&self) -> Option<FrameResult> {
        self.latest.lock().clone()
    }
}

/// Real-time pose analysis over any number of sessions
///
/// One frame is evaluated at a time; share the engine behind an `Arc` to
/// submit from several capture threads.
pub struct AnalysisEngine<S: PoseSource> {
    config: Config,
    source: S,
    registry: Arc<PatternRegistry>,
    admission: AdmissionController<S::Frame>,
    // lock order: session, then its latest copy or the cache. The map lock
    // is never held while a session is locked
    sessions: Mutex<HashMap<SessionId, Arc<SessionSlot>>>,
    cache: Mutex<ResultCache>,
    stats: Mutex<PerformanceStats>,
}

impl<S: PoseSource> AnalysisEngine<S> {
    pub fn new(config: Config, source: S) -> EngineResult<Self> {
        let registry = PatternRegistry::builtin()?;
        Ok(Self::with_registry(config, Arc::new(registry), source))
    }

    pub fn with_registry(config: Config, registry: Arc<PatternRegistry>, source: S) -> Self {
        let admission = AdmissionController::new(config.admission.frame_budget_ms);
        let cache = ResultCache::from_config(&config.cache);
        Self {
            config,
            source,
            registry,
            admission,
            sessions: Mutex::new(HashMap::new()),
            cache: Mutex::new(cache),
            stats: Mutex::new(PerformanceStats::default()),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &Arc<PatternRegistry> {
        &self.registry
    }

    pub fn supported_exercises(&self) -> Vec<String> {
        self.registry.supported_exercises()
    }

    pub fn start_session(&self, user_id: &str, exercise_type: &str) -> EngineResult<SessionId> {
        self.start_session_at(user_id, exercise_type, now_ms())
    }

    /// Start a session on a caller-supplied clock (same unit as frame
    /// timestamps)
    pub fn start_session_at(&self, user_id: &str, exercise_type: &str, start_ms: u64) -> EngineResult<SessionId> {
        let pattern = self.registry.get(exercise_type)?;
        let id = SessionId::new();
        let session = AnalysisSession::new(
            id,
            user_id,
            pattern,
            start_ms,
            &self.config.tracker,
            &self.config.scoring,
            &self.config.session,
        );
        tracing::info!(session_id = %id, user_id, exercise = %session.exercise_type(), "Session started");
        self.sessions.lock().insert(id, Arc::new(SessionSlot::new(session)));
        Ok(id)
    }

    /// Offer one frame
    ///
    /// Returns the session's latest result, which is this frame's own result
    /// when the caller ended up evaluating it. Dropped and queued frames
    /// return immediately.
    pub fn submit_frame(&self, session_id: SessionId, frame: S::Frame, timestamp_ms: u64) -> EngineResult<Option<FrameResult>> {
        let slot = self.slot(session_id)?;

        match self.admission.admit(session_id, frame, timestamp_ms) {
            Admission::Dropped => {
                self.stats.lock().frames_skipped += 1;
                tracing::trace!(session_id = %session_id, timestamp_ms, "Frame dropped, evaluation in flight");
            }
            Admission::Queued { superseded } => {
                if superseded {
                    self.stats.lock().frames_superseded += 1;
                }
            }
            Admission::Draining { mut guard, superseded } => {
                if superseded {
                    self.stats.lock().frames_superseded += 1;
                }
                while let Some(pending) = guard.next() {
                    self.process(pending, &guard);
                }
            }
        }
        Ok(slot.latest())
    }

    fn slot(&self, session_id: SessionId) -> EngineResult<Arc<SessionSlot>> {
        self.sessions
            .lock()
            .get(&session_id)
            .cloned()
            .ok_or_else(|| EngineError::session_not_found(session_id))
    }

    fn process(&self, pending: PendingFrame<S::Frame>, guard: &DrainGuard<'_, S::Frame>) {
        let started = Instant::now();
        let PendingFrame {
            session_id,
            frame,
            timestamp_ms,
        } = pending;

        let pose = match self.source.evaluate(&frame) {
            Ok(pose) => pose,
            Err(e) => {
                self.stats.lock().pose_source_failures += 1;
                tracing::warn!(session_id = %session_id, error = %e, "Pose source failed, skipping frame");
                return;
            }
        };

        let Some(slot) = self.sessions.lock().get(&session_id).cloned() else {
            tracing::debug!(session_id = %session_id, "Session ended before its frame was evaluated");
            return;
        };

        {
            let mut session = slot.session.lock();
            // low-visibility frames skip the cache so the tracker sees them
            let cacheable = session.is_trackable(&pose) && self.config.cache.enabled;
            let result = if cacheable {
                let signature = compute_signature(&pose, session.pattern());
                let hit = self.cache.lock().lookup(&signature);
                match hit {
                    Some(entry) => {
                        tracing::debug!(session_id = %session_id, "Cache hit");
                        session.result_from_cache(entry, pose, timestamp_ms)
                    }
                    None => {
                        let result = session.evaluate(pose, timestamp_ms);
                        self.cache.lock().store(result.to_cache_entry(signature));
                        result
                    }
                }
            } else {
                session.evaluate(pose, timestamp_ms)
            };
            session.record(result);
            *slot.latest.lock() = session.latest().cloned();
        }

        let elapsed_ms = started.elapsed().as_secs_f64() * 1000.0;
        self.stats.lock().record_processing(elapsed_ms);
        guard.complete(timestamp_ms.saturating_add(elapsed_ms.round() as u64));
    }

    pub fn analysis(&self, session_id: SessionId) -> EngineResult<FrameAnalysisResponse> {
        let slot = self.slot(session_id)?;
        let analysis = slot.session.lock().analysis().clone();
        Ok(analysis)
    }

    pub fn session_history(&self, session_id: SessionId) -> EngineResult<Vec<FrameResult>> {
        let slot = self.slot(session_id)?;
        let history = slot.session.lock().history().to_vec();
        Ok(history)
    }

    pub fn end_session(&self, session_id: SessionId) -> EngineResult<SessionSummary> {
        let slot = self
            .sessions
            .lock()
            .remove(&session_id)
            .ok_or_else(|| EngineError::session_not_found(session_id))?;
        let summary = slot.session.lock().summary();
        tracing::info!(
            session_id = %session_id,
            reps = summary.total_reps,
            average_score = summary.average_score,
            duration_ms = summary.duration_ms,
            "Session ended"
        );
        Ok(summary)
    }

    /// Switch the session to another exercise; unknown names are an error
    pub fn set_active_exercise(&self, session_id: SessionId, exercise_type: &str) -> EngineResult<()> {
        let pattern = self.registry.get(exercise_type)?;
        let slot = self.slot(session_id)?;
        let mut session = slot.session.lock();
        tracing::info!(
            session_id = %session_id,
            from = %session.exercise_type(),
            to = %pattern.name,
            "Active exercise changed"
        );
        session.set_pattern(pattern);
        *slot.latest.lock() = None;
        Ok(())
    }

    /// A frame is currently being evaluated
    pub fn is_evaluating(&self) -> bool {
        self.admission.is_in_flight()
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn performance_stats(&self) -> PerformanceStats {
        let cache = self.cache.lock().stats();
        PerformanceStats {
            cache_hits: cache.hits,
            cache_misses: cache.misses,
            cache_evictions: cache.evictions,
            ..*self.stats.lock()
        }
    }
}
