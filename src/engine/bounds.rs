use std::sync::{Mutex, PoisonError};

use log::{debug, warn};

use kdump_api::config::MemoryBounds;
use sysdefs::arch::SystemArchitecture;

use super::probe::MemoryProbe;

/// Per-architecture reservation policy, in MB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchitectureLimits {
    /// Smallest reservation the crash kernel boots with.
    pub lower: u64,

    /// Memory that must stay with the primary kernel.
    pub headroom: u64,

    /// Granularity of the reservation.
    pub step: u64,
}

impl ArchitectureLimits {
    pub fn of(arch: SystemArchitecture) -> Self {
        let (lower, headroom) = match arch {
            SystemArchitecture::Amd64 => (160, 512),
            SystemArchitecture::Aarch64 => (512, 512),
            SystemArchitecture::Ppc64 | SystemArchitecture::Ppc64le => (384, 1024),
            SystemArchitecture::S390x | SystemArchitecture::Other => (160, 512),
        };

        Self {
            lower,
            headroom,
            step: 1,
        }
    }
}

/// Legal reservation range for a machine.
///
/// A reservation that is already live is added back to the total, so the
/// bounds are the same whether or not the running kernel reserved memory.
pub fn compute_bounds(
    arch: SystemArchitecture,
    total_mb: u64,
    live_reservation_mb: u64,
) -> MemoryBounds {
    let limits = ArchitectureLimits::of(arch);
    let usable = total_mb.saturating_add(live_reservation_mb);
    let mut upper = usable
        .saturating_sub(limits.headroom)
        .saturating_sub(usable % limits.step);

    if upper < limits.lower {
        warn!(
            "Only {usable} MB of memory on {arch}, below the {} MB minimum plus {} MB headroom; \
             limiting the reservation to {} MB",
            limits.lower, limits.headroom, limits.lower
        );
        upper = limits.lower;
    }

    MemoryBounds {
        lower: limits.lower,
        upper,
        step: limits.step,
    }
}

/// Bounds computed once and kept until `reset`.
///
/// Computing the bounds reads the host, so the result is reused for every
/// consumer within one configuration pass.
#[derive(Debug, Default)]
pub struct BoundsCache {
    slot: Mutex<Option<MemoryBounds>>,
}

impl BoundsCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cached bounds, computed from `probe` on first use. Unavailable
    /// probe sources count as 0 MB.
    pub fn get_or_compute(&self, arch: SystemArchitecture, probe: &dyn MemoryProbe) -> MemoryBounds {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(bounds) = *slot {
            return bounds;
        }

        let total = probe.total_memory_mb().unwrap_or_else(|e| {
            warn!("{e}, assuming no memory");
            0
        });
        let live = probe.live_reservation_mb().unwrap_or_else(|e| {
            debug!("{e}, assuming no crash kernel reservation");
            0
        });

        let bounds = compute_bounds(arch, total, live);
        debug!("Memory bounds for {arch} with {total} MB total and {live} MB reserved: {bounds}");
        *slot = Some(bounds);
        bounds
    }

    /// Bounds computed so far, if any.
    pub fn cached(&self) -> Option<MemoryBounds> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget the cached bounds so the next request reads the host again.
    pub fn reset(&self) {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }
}
