//! Create/release accounting for GPU resource wrappers.
//!
//! Every wrapper that owns GPU memory holds a [`LedgerEntry`]. The entry
//! records the acquisition when it is created and the release when it is
//! dropped, so a release is recorded exactly once on every exit path,
//! including `?` returns during start-up.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::trace;

const KIND_COUNT: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    ShaderProgram,
    MeshBuffers,
    ScreenImage,
    Texture,
    UniformBuffer,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; KIND_COUNT] = [
        ResourceKind::ShaderProgram,
        ResourceKind::MeshBuffers,
        ResourceKind::ScreenImage,
        ResourceKind::Texture,
        ResourceKind::UniformBuffer,
    ];

    fn index(self) -> usize {
        match self {
            ResourceKind::ShaderProgram => 0,
            ResourceKind::MeshBuffers => 1,
            ResourceKind::ScreenImage => 2,
            ResourceKind::Texture => 3,
            ResourceKind::UniformBuffer => 4,
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceKind::ShaderProgram => "shader program",
            ResourceKind::MeshBuffers => "mesh buffers",
            ResourceKind::ScreenImage => "screen image",
            ResourceKind::Texture => "texture",
            ResourceKind::UniformBuffer => "uniform buffer",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Default)]
struct Counters {
    created: [AtomicU64; KIND_COUNT],
    released: [AtomicU64; KIND_COUNT],
}

/// Shared counter of live GPU resources, cloned into every [`LedgerEntry`].
#[derive(Debug, Clone, Default)]
pub struct ResourceLedger {
    counters: Arc<Counters>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a creation; the returned entry records the release when dropped.
    pub fn acquire(&self, kind: ResourceKind, label: &str) -> LedgerEntry {
        self.counters.created[kind.index()].fetch_add(1, Ordering::Relaxed);
        trace!(%kind, label, "acquired GPU resource");
        LedgerEntry {
            ledger: self.clone(),
            kind,
        }
    }

    pub fn created(&self, kind: ResourceKind) -> u64 {
        self.counters.created[kind.index()].load(Ordering::Relaxed)
    }

    pub fn released(&self, kind: ResourceKind) -> u64 {
        self.counters.released[kind.index()].load(Ordering::Relaxed)
    }

    pub fn live(&self, kind: ResourceKind) -> u64 {
        self.created(kind).saturating_sub(self.released(kind))
    }

    pub fn total_live(&self) -> u64 {
        ResourceKind::ALL.iter().map(|kind| self.live(*kind)).sum()
    }

    /// Kinds whose create and release counts differ.
    pub fn unbalanced(&self) -> Vec<(ResourceKind, u64)> {
        ResourceKind::ALL
            .iter()
            .filter_map(|kind| {
                let live = self.live(*kind);
                (live > 0).then_some((*kind, live))
            })
            .collect()
    }
}

/// Proof that one GPU resource is alive; dropping it records the release.
#[derive(Debug)]
pub struct LedgerEntry {
    ledger: ResourceLedger,
    kind: ResourceKind,
}

impl LedgerEntry {
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }
}

impl Drop for LedgerEntry {
    fn drop(&mut self) {
        self.ledger.counters.released[self.kind.index()].fetch_add(1, Ordering::Relaxed);
        trace!(kind = %self.kind, "released GPU resource");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FakeResource {
        _entry: LedgerEntry,
    }

    fn build_until_failure(ledger: &ResourceLedger, fail_at: usize) -> Result<Vec<FakeResource>, String> {
        let kinds = [
            ResourceKind::ShaderProgram,
            ResourceKind::ShaderProgram,
            ResourceKind::MeshBuffers,
            ResourceKind::ScreenImage,
        ];
        let mut built = Vec::new();
        for (index, kind) in kinds.iter().enumerate() {
            if index == fail_at {
                return Err(format!("stage {index} failed"));
            }
            built.push(FakeResource {
                _entry: ledger.acquire(*kind, "test"),
            });
        }
        Ok(built)
    }

    #[test]
    fn drop_records_exactly_one_release() {
        let ledger = ResourceLedger::new();
        let entry = ledger.acquire(ResourceKind::MeshBuffers, "quad");
        assert_eq!(ledger.live(ResourceKind::MeshBuffers), 1);
        drop(entry);
        assert_eq!(ledger.created(ResourceKind::MeshBuffers), 1);
        assert_eq!(ledger.released(ResourceKind::MeshBuffers), 1);
        assert_eq!(ledger.total_live(), 0);
    }

    #[test]
    fn early_failure_releases_partial_resources() {
        for fail_at in 0..4 {
            let ledger = ResourceLedger::new();
            let result = build_until_failure(&ledger, fail_at);
            assert!(result.is_err());
            assert_eq!(ledger.total_live(), 0, "fail_at={fail_at}");
            for kind in ResourceKind::ALL {
                assert_eq!(ledger.created(kind), ledger.released(kind));
            }
        }
    }

    #[test]
    fn successful_build_stays_live_until_dropped() {
        let ledger = ResourceLedger::new();
        let resources = build_until_failure(&ledger, usize::MAX).expect("build");
        assert_eq!(ledger.total_live(), 4);
        assert_eq!(
            ledger.unbalanced(),
            vec![
                (ResourceKind::ShaderProgram, 2),
                (ResourceKind::MeshBuffers, 1),
                (ResourceKind::ScreenImage, 1),
            ]
        );
        drop(resources);
        assert!(ledger.unbalanced().is_empty());
    }
}
