use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use kiln_api::SourceFile;

/// Pending files of one builder.
///
/// Enqueueing is idempotent and safe from any thread while a pass runs. Each
/// enqueue stamps the file with a fresh generation; a pass completes a file
/// only for the generation it took, so a file re-enqueued while it was being
/// built stays pending.
#[derive(Debug, Default)]
pub struct BuildQueue {
    pending: DashMap<SourceFile, u64>,
    generation: AtomicU64,
}

impl BuildQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&self, file: SourceFile) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.pending.insert(file, generation);
    }

    pub fn contains(&self, file: &SourceFile) -> bool {
        self.pending.contains_key(file)
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Pending files in path order, each with the generation it was queued at.
    pub fn snapshot(&self) -> Vec<(SourceFile, u64)> {
        let mut items: Vec<(SourceFile, u64)> = self
            .pending
            .iter()
            .map(|e| (e.key().clone(), *e.value()))
            .collect();
        items.sort();
        items
    }

    pub fn files(&self) -> Vec<SourceFile> {
        self.snapshot().into_iter().map(|(f, _)| f).collect()
    }

    /// Current generation of a pending file.
    pub fn generation_of(&self, file: &SourceFile) -> Option<u64> {
        self.pending.get(file).map(|g| *g)
    }

    /// Removes `file` if it has not been re-enqueued since `generation`.
    pub fn complete(&self, file: &SourceFile, generation: u64) -> bool {
        self.pending.remove_if(file, |_, g| *g == generation).is_some()
    }

    /// Unconditionally drops `file`.
    pub fn remove(&self, file: &SourceFile) -> bool {
        self.pending.remove(file).is_some()
    }

    pub fn clear(&self) {
        self.pending.clear();
    }
}
