//! Per-client playlist sessions
//!
//! The in-memory LRU is authoritative for the running process. Every install
//! is mirrored into [`SessionRecords`] so a client's playlist can be
//! rehydrated after a restart; a failed durable write is logged and the
//! in-memory session still stands.

use super::lru::LruMap;
use crate::error::{GalleryError, Result};
use crate::library::SessionRecords;
use crate::sandbox::Sandbox;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct PlaylistSession {
    pub paths: Arc<Vec<String>>,
    pub request_count: u32,
}

impl PlaylistSession {
    pub fn new(paths: Vec<String>) -> Self {
        Self {
            paths: Arc::new(paths),
            request_count: 0,
        }
    }

    pub fn position(&self, rel: &str) -> Option<usize> {
        self.paths.iter().position(|path| path == rel)
    }
}

/// Result of counting one file-serve hit against a client's session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HitOutcome {
    NoSession,
    Counted,
    /// Counter reached the interval and was reset; preload around these paths
    Trigger(Arc<Vec<String>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionSource {
    Memory,
    Durable,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionStatus {
    pub present: bool,
    pub source: SessionSource,
    pub size: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RestoreOutcome {
    pub valid_count: usize,
    pub original_count: usize,
    pub paths: Arc<Vec<String>>,
    #[serde(skip)]
    pub preload_center: usize,
}

#[derive(Debug)]
pub struct SessionStore {
    sessions: Mutex<LruMap<String, PlaylistSession>>,
    records: SessionRecords,
}

impl SessionStore {
    pub fn new(capacity: usize, records: SessionRecords) -> Self {
        Self {
            sessions: Mutex::new(LruMap::new(capacity)),
            records,
        }
    }

    pub fn records(&self) -> &SessionRecords {
        &self.records
    }

    pub fn get(&self, client_id: &str) -> Option<PlaylistSession> {
        self.sessions.lock().get(&client_id.to_string()).cloned()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    /// Replace the client's session in memory, then mirror it durably
    pub fn put(&self, client_id: &str, paths: Vec<String>) -> Arc<Vec<String>> {
        let session = PlaylistSession::new(paths);
        let shared = Arc::clone(&session.paths);

        let evicted = self.sessions.lock().insert(client_id.to_string(), session);
        if let Some((evicted_client, _)) = evicted {
            tracing::debug!(client = %evicted_client, "session evicted");
        }

        if let Err(e) = self.records.save(client_id, &shared) {
            tracing::warn!(client = client_id, "failed to persist session: {e}");
        }
        shared
    }

    /// Count a served file. Every `interval` hits the counter resets and the
    /// caller is told to re-run the preloader.
    pub fn record_hit(&self, client_id: &str, interval: u32) -> HitOutcome {
        let mut sessions = self.sessions.lock();
        let Some(session) = sessions.get_mut(&client_id.to_string()) else {
            return HitOutcome::NoSession;
        };

        session.request_count += 1;
        if session.request_count >= interval.max(1) {
            session.request_count = 0;
            HitOutcome::Trigger(Arc::clone(&session.paths))
        } else {
            HitOutcome::Counted
        }
    }

    /// Rehydrate the in-memory session from its durable record when none is
    /// loaded. Returns the loaded paths; `None` if a session already existed
    /// or no readable record exists.
    pub fn restore_from_durable(&self, client_id: &str) -> Result<Option<Arc<Vec<String>>>> {
        if self.sessions.lock().contains_key(&client_id.to_string()) {
            return Ok(None);
        }

        let Some(record) = self.records.load(client_id)? else {
            return Ok(None);
        };

        let session = PlaylistSession::new(record.paths);
        let shared = Arc::clone(&session.paths);
        let mut sessions = self.sessions.lock();
        // Another request may have installed a fresher session meanwhile
        if sessions.contains_key(&client_id.to_string()) {
            return Ok(None);
        }
        sessions.insert(client_id.to_string(), session);
        tracing::debug!(client = client_id, size = shared.len(), "session rehydrated");
        Ok(Some(shared))
    }

    pub fn status(&self, client_id: &str) -> Result<SessionStatus> {
        if let Some(session) = self.sessions.lock().peek(&client_id.to_string()) {
            return Ok(SessionStatus {
                present: true,
                source: SessionSource::Memory,
                size: session.paths.len(),
            });
        }

        Ok(match self.records.load(client_id)? {
            Some(record) => SessionStatus {
                present: true,
                source: SessionSource::Durable,
                size: record.paths.len(),
            },
            None => SessionStatus {
                present: false,
                source: SessionSource::None,
                size: 0,
            },
        })
    }

    /// Drop every in-memory session and every durable record
    pub fn clear(&self) -> Result<()> {
        self.sessions.lock().clear();
        let removed = self.records.clear()?;
        tracing::debug!(removed, "session records cleared");
        Ok(())
    }

    /// Best-effort removal of durable records older than `max_age_days`
    pub fn prune_durable(&self, max_age_days: u32) -> usize {
        match self
            .records
            .prune_older_than(chrono::Duration::days(i64::from(max_age_days)))
        {
            Ok(removed) => {
                if removed > 0 {
                    tracing::info!(removed, "pruned stale session records");
                }
                removed
            }
            Err(e) => {
                tracing::warn!("failed to prune session records: {e}");
                0
            }
        }
    }

    /// Validate a client-held playlist and install the survivors.
    ///
    /// A candidate survives when it is an existing file and either lies
    /// inside the root or parent access is enabled. `cursor` indexes the
    /// candidate list; the returned center is that candidate's position
    /// among the survivors, clamped when it was dropped.
    pub fn restore(
        &self,
        sandbox: &Sandbox,
        client_id: &str,
        candidates: &[String],
        cursor: usize,
    ) -> Result<RestoreOutcome> {
        let allow_parent = sandbox.allows_parent_access();
        let mut survivors = Vec::with_capacity(candidates.len());
        let mut preload_center = None;

        for (idx, candidate) in candidates.iter().enumerate() {
            // Survivors kept so far: the cursor's own slot if it survives,
            // otherwise the next survivor's
            if idx == cursor {
                preload_center = Some(survivors.len());
            }
            let rel = sandbox.canonical_rel(candidate);
            let absolute = sandbox.resolve(&rel);
            if !absolute.is_file() || !(allow_parent || sandbox.contains(&absolute)) {
                tracing::debug!(path = %candidate, "restore candidate dropped");
                continue;
            }
            survivors.push(rel);
        }

        if survivors.is_empty() {
            return Err(GalleryError::Validation(
                "no valid paths in playlist".to_string(),
            ));
        }

        let preload_center = preload_center
            .unwrap_or(survivors.len())
            .min(survivors.len() - 1);

        let valid_count = survivors.len();
        let paths = self.put(client_id, survivors);
        tracing::info!(
            client = client_id,
            valid = valid_count,
            original = candidates.len(),
            "playlist restored"
        );

        Ok(RestoreOutcome {
            valid_count,
            original_count: candidates.len(),
            paths,
            preload_center,
        })
    }
}
