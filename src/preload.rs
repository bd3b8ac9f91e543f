//! Background warm-up of the content cache around a playlist position

use crate::cache::ContentCache;
use crate::sandbox::Sandbox;
use crate::tasks::TaskPool;
use std::collections::HashSet;
use std::sync::Arc;

/// Indices `center-radius..=center+radius`, wrapped modulo `len`, each once.
/// Order follows the offsets.
pub fn window_indices(len: usize, center: usize, radius: usize) -> Vec<usize> {
    if len == 0 {
        return Vec::new();
    }

    let len_i = len as i64;
    let center = center as i64;
    let radius = radius as i64;
    let mut seen = HashSet::new();
    (-radius..=radius)
        .map(|offset| (center + offset).rem_euclid(len_i) as usize)
        .filter(|idx| seen.insert(*idx))
        .collect()
}

#[derive(Debug, Clone)]
pub struct Preloader {
    content: Arc<ContentCache>,
    sandbox: Sandbox,
    tasks: Arc<TaskPool>,
    radius: usize,
}

impl Preloader {
    pub fn new(
        content: Arc<ContentCache>,
        sandbox: Sandbox,
        tasks: Arc<TaskPool>,
        radius: usize,
    ) -> Self {
        Self {
            content,
            sandbox,
            tasks,
            radius,
        }
    }

    pub fn radius(&self) -> usize {
        self.radius
    }

    /// Queue a warm-up centered on `center`; returns immediately
    pub fn schedule(&self, paths: Arc<Vec<String>>, center: usize) {
        if paths.is_empty() {
            return;
        }
        let this = self.clone();
        self.tasks.spawn("preload", move || {
            this.run(&paths, center);
            Ok(())
        });
    }

    /// Read every path in the window through the cache. Per-file failures are
    /// skipped. Returns how many files are now cached.
    pub fn run(&self, paths: &[String], center: usize) -> usize {
        let mut warmed = 0;
        for idx in window_indices(paths.len(), center, self.radius) {
            let absolute = self.sandbox.resolve(&paths[idx]);
            match self.content.get(&absolute) {
                Ok(_) => warmed += 1,
                Err(e) => tracing::trace!(path = %paths[idx], "preload skipped: {e}"),
            }
        }
        tracing::debug!(center, warmed, total = paths.len(), "preload finished");
        warmed
    }
}
