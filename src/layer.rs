// Per-layer state
//
// A LayerState represents one layer slot for one frame. It owns the
// imported buffer and its acquire fence, holds the compositing
// attributes, and is compared against the previous frame's state to
// figure out what actually changed.
use crate::buffer::{BufferImporter, Dmabuf};
use crate::fence::AcquireFence;
use crate::format;
use crate::transform::{Rotation, Transform};
use crate::Result;
use utils::log;
use utils::region::{Rect, Region};

use std::os::fd::RawFd;

bitflags! {
    /// What about a layer needs to be recomposited
    pub struct ChangeState: u32 {
        const CONTENT_CHANGED = 1 << 0;
        const DIMENSIONS_CHANGED = 1 << 1;
        const ATTRIBUTES_CHANGED = 1 << 2;
    }
}

bitflags! {
    /// Change signals reported by the layer policy for one frame
    #[derive(Default)]
    pub struct LayerChanges: u32 {
        const DISPLAY_RECT = 1 << 0;
        const CONTENT_ATTRIBUTES = 1 << 1;
        const LAYER_ATTRIBUTES = 1 << 2;
        const VISIBLE_REGION = 1 << 3;
        const SURFACE_DAMAGE = 1 << 4;
        const LAYER_CONTENT = 1 << 5;
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Blending {
    None,
    Premult,
    Coverage,
}

impl Default for Blending {
    fn default() -> Self {
        Blending::None
    }
}

/// The upstream description of a layer for this frame
///
/// This is what the layer policy knows about how a layer changed
/// since the last frame.
pub trait LayerDescriptor {
    fn has_display_rect_changed(&self) -> bool;
    fn has_content_attributes_changed(&self) -> bool;
    fn has_layer_attributes_changed(&self) -> bool;
    fn has_visible_region_changed(&self) -> bool;
    fn has_surface_damage_region_changed(&self) -> bool;
    fn has_layer_content_changed(&self) -> bool;
    fn surface_damage(&self) -> &Region;
}

/// A plain LayerDescriptor built from a set of change flags
#[derive(Debug, Clone, Default)]
pub struct LayerUpdate {
    pub lu_changes: LayerChanges,
    pub lu_damage: Region,
}

impl LayerUpdate {
    pub fn new(changes: LayerChanges, damage: Region) -> Self {
        Self {
            lu_changes: changes,
            lu_damage: damage,
        }
    }

    /// Nothing changed this frame
    pub fn unchanged() -> Self {
        Self::default()
    }
}

impl LayerDescriptor for LayerUpdate {
    fn has_display_rect_changed(&self) -> bool {
        self.lu_changes.contains(LayerChanges::DISPLAY_RECT)
    }

    fn has_content_attributes_changed(&self) -> bool {
        self.lu_changes.contains(LayerChanges::CONTENT_ATTRIBUTES)
    }

    fn has_layer_attributes_changed(&self) -> bool {
        self.lu_changes.contains(LayerChanges::LAYER_ATTRIBUTES)
    }

    fn has_visible_region_changed(&self) -> bool {
        self.lu_changes.contains(LayerChanges::VISIBLE_REGION)
    }

    fn has_surface_damage_region_changed(&self) -> bool {
        self.lu_changes.contains(LayerChanges::SURFACE_DAMAGE)
    }

    fn has_layer_content_changed(&self) -> bool {
        self.lu_changes.contains(LayerChanges::LAYER_CONTENT)
    }

    fn surface_damage(&self) -> &Region {
        &self.lu_damage
    }
}

/// A buffer and the fence guarding it
///
/// These are replaced together.
#[derive(Debug)]
struct ImportedBuffer {
    ib_buffer: Dmabuf,
    ib_fence: AcquireFence,
}

#[derive(Debug)]
pub struct LayerState {
    l_imported: Option<ImportedBuffer>,
    l_transform: Transform,
    /// Resolved from l_transform
    l_rotation: Rotation,
    l_alpha: u8,
    l_blending: Blending,
    l_z_order: u32,
    l_layer_index: u32,
    /// Source crop in buffer space, and its integer width/height
    l_source_crop: Rect<f32>,
    l_source_crop_size: (i32, i32),
    /// Destination rectangle, and its width/height
    l_display_frame: Rect<i32>,
    l_display_frame_size: (i32, i32),
    l_surface_damage: Region,
    /// Once set this stays set for the slot
    l_prefer_separate_plane: bool,
    /// Once set this stays set for the slot
    l_gpu_rendered: bool,
    l_state: ChangeState,
}

impl Default for LayerState {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerState {
    pub fn new() -> Self {
        Self {
            l_imported: None,
            l_transform: Transform::IDENTITY,
            l_rotation: Rotation::ROTATE_0,
            l_alpha: 0xff,
            l_blending: Blending::None,
            l_z_order: 0,
            l_layer_index: 0,
            l_source_crop: Rect::default(),
            l_source_crop_size: (0, 0),
            l_display_frame: Rect::default(),
            l_display_frame_size: (0, 0),
            l_surface_damage: Region::new(),
            l_prefer_separate_plane: false,
            l_gpu_rendered: false,
            l_state: ChangeState::all(),
        }
    }

    /// Attach a new buffer and its fence
    ///
    /// This drops the previous buffer and closes its fence.
    pub fn set_buffer(&mut self, buffer: Dmabuf, acquire_fence: AcquireFence) {
        self.l_imported = Some(ImportedBuffer {
            ib_buffer: buffer,
            ib_fence: acquire_fence,
        });
    }

    /// Import a platform handle and attach it
    ///
    /// If the import fails the fence is released and the old
    /// buffer is kept.
    pub fn import_buffer<I: BufferImporter>(
        &mut self,
        importer: &I,
        handle: &I::Handle,
        acquire_fence: AcquireFence,
    ) -> Result<()> {
        let buffer = importer.import_buffer(handle).map_err(|e| {
            log::error!("Failed to import buffer for layer {}: {}", self.l_layer_index, e);
            e
        })?;

        self.set_buffer(buffer, acquire_fence);
        Ok(())
    }

    pub fn reset_buffer(&mut self) {
        self.l_imported = None;
    }

    pub fn buffer(&self) -> Option<&Dmabuf> {
        self.l_imported.as_ref().map(|ib| &ib.ib_buffer)
    }

    /// Replace the acquire fence, closing the one we held
    pub fn set_acquire_fence(&mut self, acquire_fence: AcquireFence) {
        match self.l_imported.as_mut() {
            Some(ib) => ib.ib_fence.replace(acquire_fence),
            None => log::error!(
                "Layer {} has no buffer, dropping acquire fence {}",
                self.l_layer_index,
                acquire_fence.as_raw_fd()
            ),
        }
    }

    /// The raw fence value, -1 if there is none
    pub fn acquire_fence(&self) -> RawFd {
        self.l_imported
            .as_ref()
            .map(|ib| ib.ib_fence.as_raw_fd())
            .unwrap_or(-1)
    }

    /// Move the acquire fence out of this layer
    ///
    /// The layer is left without a fence, the caller now owns it.
    pub fn take_acquire_fence(&mut self) -> AcquireFence {
        match self.l_imported.as_mut() {
            Some(ib) => ib.ib_fence.take(),
            None => AcquireFence::none(),
        }
    }

    pub fn set_z_order(&mut self, z_order: u32) {
        self.l_z_order = z_order;
    }

    pub fn z_order(&self) -> u32 {
        self.l_z_order
    }

    pub fn set_layer_index(&mut self, layer_index: u32) {
        self.l_layer_index = layer_index;
    }

    pub fn layer_index(&self) -> u32 {
        self.l_layer_index
    }

    pub fn set_transform(&mut self, transform: Transform) {
        self.l_transform = transform;
        self.l_rotation = Rotation::from_transform(transform);
    }

    pub fn transform(&self) -> Transform {
        self.l_transform
    }

    pub fn rotation(&self) -> Rotation {
        self.l_rotation
    }

    pub fn set_alpha(&mut self, alpha: u8) {
        self.l_alpha = alpha;
    }

    pub fn alpha(&self) -> u8 {
        self.l_alpha
    }

    pub fn set_blending(&mut self, blending: Blending) {
        self.l_blending = blending;
    }

    pub fn blending(&self) -> Blending {
        self.l_blending
    }

    pub fn set_source_crop(&mut self, source_crop: Rect<f32>) {
        self.l_source_crop_size = (
            source_crop.right as i32 - source_crop.left as i32,
            source_crop.bottom as i32 - source_crop.top as i32,
        );
        self.l_source_crop = source_crop;
    }

    pub fn source_crop(&self) -> &Rect<f32> {
        &self.l_source_crop
    }

    pub fn source_crop_width(&self) -> i32 {
        self.l_source_crop_size.0
    }

    pub fn source_crop_height(&self) -> i32 {
        self.l_source_crop_size.1
    }

    pub fn set_display_frame(&mut self, display_frame: Rect<i32>) {
        self.l_display_frame_size = (display_frame.width(), display_frame.height());
        self.l_display_frame = display_frame;
    }

    pub fn display_frame(&self) -> &Rect<i32> {
        &self.l_display_frame
    }

    pub fn display_frame_width(&self) -> i32 {
        self.l_display_frame_size.0
    }

    pub fn display_frame_height(&self) -> i32 {
        self.l_display_frame_size.1
    }

    pub fn surface_damage(&self) -> &Region {
        &self.l_surface_damage
    }

    pub fn prefer_separate_plane(&self) -> bool {
        self.l_prefer_separate_plane
    }

    pub fn gpu_rendered(&self) -> bool {
        self.l_gpu_rendered
    }

    pub fn change_state(&self) -> ChangeState {
        self.l_state
    }

    pub fn has_content_changed(&self) -> bool {
        self.l_state.contains(ChangeState::CONTENT_CHANGED)
    }

    pub fn has_dimensions_changed(&self) -> bool {
        self.l_state.contains(ChangeState::DIMENSIONS_CHANGED)
    }

    pub fn has_attributes_changed(&self) -> bool {
        self.l_state.contains(ChangeState::ATTRIBUTES_CHANGED)
    }

    /// Compare against last frame's state for this slot
    ///
    /// Clears the change bits that the comparison proves are stale.
    /// Bits are only ever cleared here, never set. If either frame has
    /// no buffer or the formats differ, everything stays marked as
    /// changed.
    pub fn validate_previous_frame<L: LayerDescriptor + ?Sized>(
        &mut self,
        previous: &LayerState,
        layer: &L,
    ) {
        self.l_surface_damage = layer.surface_damage().clone();
        self.l_prefer_separate_plane |= previous.l_prefer_separate_plane;

        let (is_cursor, format) = match self.buffer() {
            Some(buffer) => (buffer.is_cursor(), buffer.db_format),
            None => return,
        };
        match previous.buffer() {
            Some(prev) if prev.db_format == format => {}
            _ => return,
        }

        let attributes_changed = self.l_alpha != previous.l_alpha
            || layer.has_display_rect_changed()
            || layer.has_content_attributes_changed()
            || layer.has_layer_attributes_changed();

        let mut content_changed = false;
        // We expect cursor plane to support alpha always.
        if previous.l_gpu_rendered || is_cursor {
            content_changed = attributes_changed;
            self.l_gpu_rendered = true;
        } else if attributes_changed {
            return;
        }

        self.l_state.remove(ChangeState::ATTRIBUTES_CHANGED);

        if !layer.has_display_rect_changed() {
            self.l_state.remove(ChangeState::DIMENSIONS_CHANGED);
        }

        if !layer.has_visible_region_changed()
            && !layer.has_surface_damage_region_changed()
            && !layer.has_layer_content_changed()
            && !content_changed
        {
            self.l_state.remove(ChangeState::CONTENT_CHANGED);
        }
    }

    /// Video buffers should get a plane of their own
    pub fn validate_for_overlay_usage(&mut self) {
        if self.buffer().map(|b| b.is_video()).unwrap_or(false) {
            self.l_prefer_separate_plane = true;
        }
    }

    pub fn dump(&self) {
        log::info!("LayerState Information Starts. -------------");
        match self.l_blending {
            Blending::None => log::info!("Blending: None."),
            Blending::Premult => log::info!("Blending: Premult."),
            Blending::Coverage => log::info!("Blending: Coverage."),
        }

        if self.l_transform.contains(Transform::REFLECT_X) {
            log::info!("Transform: ReflectX.");
        }
        if self.l_transform.contains(Transform::REFLECT_Y) {
            log::info!("Transform: ReflectY.");
        } else if self.l_transform.contains(Transform::ROTATE_180) {
            log::info!("Transform: Rotate180.");
        } else if self.l_transform.contains(Transform::ROTATE_270) {
            log::info!("Transform: Rotate270.");
        } else {
            log::info!("Transform: Rotate0.");
        }

        log::info!("Alpha: {}", self.l_alpha);
        log::info!("SourceWidth: {}", self.source_crop_width());
        log::info!("SourceHeight: {}", self.source_crop_height());
        log::info!("DstWidth: {}", self.display_frame_width());
        log::info!("DstHeight: {}", self.display_frame_height());
        log::info!("AcquireFence: {}", self.acquire_fence());

        match self.buffer() {
            Some(buffer) => buffer.dump(),
            None => log::info!("Buffer: none"),
        }
        log::info!(
            "Format supported by VA: {}",
            self.buffer()
                .map(|b| format::is_supported(b.db_format))
                .unwrap_or(false)
        );
    }
}
