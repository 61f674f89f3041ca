// Scoped VA objects
//
// Everything the renderer creates during a draw is wrapped in a
// Scoped handle, which destroys it on drop. Invalid ids (from a
// failed create) are never destroyed.
use super::{BufferId, ConfigId, ContextId, SurfaceId, VaDriver};

/// A VA object id that can be destroyed through a driver
pub trait VaHandle: Copy {
    fn is_valid(&self) -> bool;
    fn destroy<D: VaDriver + ?Sized>(self, drv: &D);
}

impl VaHandle for SurfaceId {
    fn is_valid(&self) -> bool {
        SurfaceId::is_valid(self)
    }

    fn destroy<D: VaDriver + ?Sized>(self, drv: &D) {
        drv.destroy_surface(self)
    }
}

impl VaHandle for ConfigId {
    fn is_valid(&self) -> bool {
        ConfigId::is_valid(self)
    }

    fn destroy<D: VaDriver + ?Sized>(self, drv: &D) {
        drv.destroy_config(self)
    }
}

impl VaHandle for ContextId {
    fn is_valid(&self) -> bool {
        ContextId::is_valid(self)
    }

    fn destroy<D: VaDriver + ?Sized>(self, drv: &D) {
        drv.destroy_context(self)
    }
}

impl VaHandle for BufferId {
    fn is_valid(&self) -> bool {
        BufferId::is_valid(self)
    }

    fn destroy<D: VaDriver + ?Sized>(self, drv: &D) {
        drv.destroy_buffer(self)
    }
}

/// Owns one VA object for the length of a scope
pub struct Scoped<'a, D: VaDriver + ?Sized, H: VaHandle> {
    s_drv: &'a D,
    s_id: H,
}

impl<'a, D: VaDriver + ?Sized, H: VaHandle> Scoped<'a, D, H> {
    pub fn new(drv: &'a D, id: H) -> Self {
        Self { s_drv: drv, s_id: id }
    }

    pub fn id(&self) -> H {
        self.s_id
    }
}

impl<'a, D: VaDriver + ?Sized, H: VaHandle> Drop for Scoped<'a, D, H> {
    fn drop(&mut self) {
        if self.s_id.is_valid() {
            self.s_id.destroy(self.s_drv);
        }
    }
}
