//! Accelerator runtime layer for the OCuLaR router.
//!
//! This crate provides the device-side primitives the routing kernel is
//! written against: usage-hinted buffers mirrored between host and device
//! ([`BackedBuffer`]), atomic cost/index cell arrays shared by concurrent
//! work-items, a workgroup-structured dispatcher, and host-side scan
//! helpers.
//!
//! The executor here is the CPU reference device: kernels run work-item
//! parallel (via rayon) with the same global/group/local id structure a GPU
//! dispatch would have, and a dispatch returns only once every work-item has
//! completed — which is the device-wide barrier the router's round structure
//! relies on. Context creation and program loading for a real accelerator
//! backend sit behind the same buffer and dispatch shapes.

#![warn(missing_docs)]

pub mod atomic;
pub mod buffer;
pub mod dispatch;
pub mod scan;

pub use atomic::{AtomicCostArray, AtomicIndexArray};
pub use buffer::{BackedBuffer, BufferUsage};
pub use dispatch::{Dispatcher, WorkItem};
pub use scan::{owning_group, prefix_sum_in_place};
