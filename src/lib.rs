//! # Vapor
//!
//! Vapor is the VA-API composition backend of a display pipeline. Once
//! the layer policy has decided that a layer should go through the
//! video processing hardware instead of the 3D renderer, vapor does the
//! scale + color-convert + composite into an output surface, off of the
//! thread that flips the display.
//!
//! * `layer` - per-layer state: the imported buffer, its acquire fence,
//!   and the frame-to-frame change tracking that tells the policy
//!   whether composition can be skipped.
//! * `va` - the `VaDriver` hardware seam and `VaRenderer`, which imports
//!   a layer and an output surface and runs one pipeline operation.
//! * `worker` - `RenderWorker`, a dedicated thread that owns the renderer
//!   and runs batches of (layer, surface) pairs handed over by the
//!   display thread.
//!
//! ## Drawing API
//!
//! The general flow for the display thread is:
//! * Fill in a `LayerState` per layer (`set_buffer`, `set_source_crop`,
//!   `set_display_frame`, ...) and compare it against last frame's
//!   (`validate_previous_frame`).
//! * Pair the layers that need video processing with `OutputSurface`s.
//! * Hand both lists to the worker (`RenderWorker::submit`). This swaps
//!   them into the worker, the caller gets the previous batch back.
//! * Block on `RenderWorker::wait_for_idle` before flipping.
//!
//! ## Requirements
//!
//! The `libva` feature links against libva and libva-drm and provides
//! `va::LibVa`, a driver for a DRM render node. Without it the crate only
//! exposes the driver trait.
#![allow(non_camel_case_types)]
#[macro_use]
extern crate bitflags;
extern crate utils;

pub mod buffer;
pub mod fence;
pub mod format;
pub mod layer;
pub mod surface;
pub mod transform;
pub mod va;
pub mod worker;

#[cfg(test)]
mod tests;

pub use buffer::{BufferImporter, BufferUsage, Dmabuf, DmabufPlane};
pub use fence::AcquireFence;
pub use layer::{Blending, ChangeState, LayerDescriptor, LayerState, LayerUpdate};
pub use surface::OutputSurface;
pub use transform::{Rotation, Transform};
pub use va::{VaDriver, VaRenderer, VaStatus};
pub use worker::{RenderWorker, WorkerCreateInfo, WorkerState};

// Re-export some things from utils so clients
// can use them
pub use crate::utils::region::{Rect, Region};

use thiserror::Error;

/// Errors reported by vapor
///
/// Draw failures are aggregated: `VA_STATUS` carries the OR of
/// every status returned during the draw.
#[derive(Error, Debug)]
pub enum VaError {
    #[error("VA call failed with status {0:#x}")]
    VA_STATUS(i32),
    #[error("Pixel format {0:#010x} can not be processed by VA")]
    UNSUPPORTED_FORMAT(u32),
    #[error("Layer does not have a buffer attached")]
    NO_BUFFER,
    #[error("Could not get a VA display for the device")]
    INVALID_DISPLAY,
    #[error("Render worker is still processing the previous batch")]
    WORKER_BUSY,
    #[error("Render worker is not running")]
    NOT_RUNNING,
    #[error("Timed out waiting on acquire fence")]
    FENCE_TIMEOUT,
    #[error("System call failed: {0}")]
    NIX(#[from] nix::Error),
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, VaError>;
