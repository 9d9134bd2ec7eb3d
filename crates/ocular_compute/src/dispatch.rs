//! Workgroup-structured kernel dispatch.
//!
//! The CPU reference executor: work-items run in parallel across the global
//! range with the same id structure a GPU dispatch would present. A call to
//! [`Dispatcher::dispatch`] returns only once every work-item has finished,
//! which gives the host a device-wide barrier between kernel rounds.

use rayon::prelude::*;

/// The identity of one work-item within a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkItem {
    /// Index within the whole dispatch.
    pub global_id: u32,
    /// Index of the workgroup this item belongs to.
    pub group_id: u32,
    /// Index within the workgroup.
    pub local_id: u32,
}

/// Launches kernels over a global range split into fixed-size workgroups.
#[derive(Debug, Clone, Copy)]
pub struct Dispatcher {
    workgroup_size: u32,
}

impl Dispatcher {
    /// Creates a dispatcher with the given workgroup (local) size.
    pub fn new(workgroup_size: u32) -> Self {
        assert!(workgroup_size > 0, "workgroup size must be non-zero");
        Self { workgroup_size }
    }

    /// Returns the workgroup size.
    pub fn workgroup_size(&self) -> u32 {
        self.workgroup_size
    }

    /// Rounds `work` up to a whole number of workgroups.
    pub fn global_size_for(&self, work: u32) -> u32 {
        work.div_ceil(self.workgroup_size) * self.workgroup_size
    }

    /// Runs `kernel` for every work-item in `[0, global_size)` and blocks
    /// until all of them have completed.
    ///
    /// `global_size` must be a multiple of the workgroup size; use
    /// [`global_size_for`](Dispatcher::global_size_for) to round work up and
    /// have the kernel ignore the padding items.
    pub fn dispatch<F>(&self, global_size: u32, kernel: F)
    where
        F: Fn(WorkItem) + Sync,
    {
        assert!(
            global_size % self.workgroup_size == 0,
            "global size {global_size} is not a multiple of workgroup size {}",
            self.workgroup_size
        );
        let ws = self.workgroup_size;
        (0..global_size).into_par_iter().for_each(|global_id| {
            kernel(WorkItem {
                global_id,
                group_id: global_id / ws,
                local_id: global_id % ws,
            });
        });
    }
}
