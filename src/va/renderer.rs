// VA video processing renderer
//
// Draws one layer into one output surface with a single pass through
// the fixed VPP pipeline: scale from the source crop to the whole
// output, color convert, and apply the layer's rotation/mirroring.
// Every VA object is created for the draw and destroyed before
// returning.
use super::{
    BufferId, ColorStandard, ConfigId, ContextId, ExternalBuffer, PipelineParams, Scoped,
    SurfaceId, VaDriver, VaRect, VaResult, VaStatus,
};
use crate::buffer::Dmabuf;
use crate::format;
use crate::layer::LayerState;
use crate::surface::OutputSurface;
use crate::{Result, VaError};
use utils::log;

use std::os::fd::AsFd;

/// Color standard used on both sides of the pipeline
const PIPELINE_COLOR_STANDARD: ColorStandard = ColorStandard::BT601;

pub struct VaRenderer<D: VaDriver> {
    vr_drv: D,
}

impl<D: VaDriver> VaRenderer<D> {
    /// Wrap an initialized driver
    ///
    /// Getting a driver is the only way to get a renderer, so a draw
    /// can't happen against an uninitialized device.
    pub fn new(drv: D) -> Self {
        Self { vr_drv: drv }
    }

    /// Fill in the import description of a buffer
    ///
    /// The width/height are passed separately since the output is
    /// imported at the surface's committed size.
    fn external_buffer(buffer: &Dmabuf, width: u32, height: u32) -> ExternalBuffer<'_> {
        ExternalBuffer {
            eb_pixel_format: format::va_format_for(buffer.db_format),
            eb_width: width,
            eb_height: height,
            eb_num_planes: buffer.plane_count(),
            eb_pitches: buffer.pitches(),
            eb_offsets: buffer.offsets(),
            eb_fd: buffer.as_fd(),
        }
    }

    /// Record the result of one VA call
    ///
    /// Failures are OR'd into `status` and the draw keeps going with
    /// `invalid` in place of the result.
    fn track<T>(status: &mut VaStatus, call: &str, ret: VaResult<T>, invalid: T) -> T {
        match ret {
            Ok(val) => val,
            Err(err) => {
                log::error!("{} failed with status {:#x}", call, err.0);
                *status = *status | err;
                invalid
            }
        }
    }

    fn clamp_dim(val: i64) -> u16 {
        val.max(0).min(u16::MAX as i64) as u16
    }

    /// Composite `layer` into `surface`
    ///
    /// This blocks until the hardware is done writing the output. Every
    /// call is issued even after one fails; the result is Ok only if
    /// all of them succeeded, otherwise the output contents are
    /// undefined. Fails without touching the hardware if the layer
    /// has no buffer. A source format VA can't process always fails
    /// with UNSUPPORTED_FORMAT.
    pub fn draw(&self, layer: &LayerState, surface: &OutputSurface) -> Result<()> {
        let buffer_in = layer.buffer().ok_or(VaError::NO_BUFFER)?;
        let buffer_out = surface.buffer();
        let dest_width = surface.width();
        let dest_height = surface.height();
        let drv = &self.vr_drv;
        let mut status = VaStatus::SUCCESS;

        let supported = format::is_supported(buffer_in.db_format);
        if !supported {
            log::error!(
                "Layer {} has format {} which VA can't process",
                layer.layer_index(),
                format::fourcc_name(buffer_in.db_format)
            );
        }

        // Import the source at its own size
        let rt_format = format::rt_format_for(buffer_in.db_format);
        let external_in = Self::external_buffer(buffer_in, buffer_in.db_width, buffer_in.db_height);
        let surface_in = Scoped::new(
            drv,
            Self::track(
                &mut status,
                "vaCreateSurfaces(input)",
                drv.create_surface(rt_format, &external_in),
                SurfaceId::INVALID,
            ),
        );

        // Import the destination at the surface's size
        let rt_format = format::rt_format_for(buffer_out.db_format);
        let external_out = Self::external_buffer(buffer_out, dest_width, dest_height);
        let surface_out = Scoped::new(
            drv,
            Self::track(
                &mut status,
                "vaCreateSurfaces(output)",
                drv.create_surface(rt_format, &external_out),
                SurfaceId::INVALID,
            ),
        );

        let config = Scoped::new(
            drv,
            Self::track(
                &mut status,
                "vaCreateConfig",
                drv.create_config(rt_format),
                ConfigId::INVALID,
            ),
        );

        let context = Scoped::new(
            drv,
            Self::track(
                &mut status,
                "vaCreateContext",
                drv.create_context(
                    config.id(),
                    dest_width as i32,
                    dest_height as i32,
                    surface_out.id(),
                ),
                ContextId::INVALID,
            ),
        );

        let rotation = layer.rotation();
        let params = PipelineParams {
            pp_surface: surface_in.id(),
            pp_surface_region: VaRect::new(
                0,
                0,
                Self::clamp_dim(layer.source_crop_width() as i64),
                Self::clamp_dim(layer.source_crop_height() as i64),
            ),
            pp_surface_color_standard: PIPELINE_COLOR_STANDARD,
            pp_output_region: VaRect::new(
                0,
                0,
                Self::clamp_dim(dest_width as i64),
                Self::clamp_dim(dest_height as i64),
            ),
            pp_output_color_standard: PIPELINE_COLOR_STANDARD,
            pp_rotation: rotation.va_rotation(),
            pp_mirror: rotation.va_mirror(),
        };

        let pipeline = Scoped::new(
            drv,
            Self::track(
                &mut status,
                "vaCreateBuffer",
                drv.create_pipeline_buffer(context.id(), &params),
                BufferId::INVALID,
            ),
        );

        Self::track(
            &mut status,
            "vaBeginPicture",
            drv.begin_picture(context.id(), surface_out.id()),
            (),
        );
        Self::track(
            &mut status,
            "vaRenderPicture",
            drv.render_picture(context.id(), pipeline.id()),
            (),
        );
        Self::track(&mut status, "vaEndPicture", drv.end_picture(context.id()), ());
        Self::track(
            &mut status,
            "vaSyncSurface",
            drv.sync_surface(surface_out.id()),
            (),
        );

        // Release order: pipeline buffer, context, config, surfaces
        drop(pipeline);
        drop(context);
        drop(config);
        drop(surface_in);
        drop(surface_out);

        // Never report an unsupported source as composited, even if the
        // driver took the zero fourcc
        if !supported {
            return Err(VaError::UNSUPPORTED_FORMAT(buffer_in.db_format));
        }

        status.check().map_err(|s| VaError::VA_STATUS(s.0))
    }

    /// `draw`, reduced to whether it worked
    pub fn draw_ok(&self, layer: &LayerState, surface: &OutputSurface) -> bool {
        self.draw(layer, surface).is_ok()
    }
}
