// Layer transforms
//
// The layer policy hands us logical flip/rotate flags. These get
// resolved once into the hardware rotation bitmask, which is what
// the plane and the video pipeline consume.

bitflags! {
    /// Logical transform requested for a layer
    #[derive(Default)]
    pub struct Transform: u32 {
        const IDENTITY = 0;
        const REFLECT_X = 1 << 0;
        const REFLECT_Y = 1 << 1;
        const ROTATE_90 = 1 << 2;
        const ROTATE_180 = 1 << 3;
        const ROTATE_270 = 1 << 4;
    }
}

bitflags! {
    /// Hardware rotation bitmask
    ///
    /// Bit positions follow the DRM plane rotation property.
    #[derive(Default)]
    pub struct Rotation: u32 {
        const ROTATE_0 = 1 << 0;
        const ROTATE_90 = 1 << 1;
        const ROTATE_180 = 1 << 2;
        const ROTATE_270 = 1 << 3;
        const REFLECT_X = 1 << 4;
        const REFLECT_Y = 1 << 5;
    }
}

// VAProcPipelineParameterBuffer rotation_state values
pub const VA_ROTATION_NONE: u32 = 0;
pub const VA_ROTATION_90: u32 = 1;
pub const VA_ROTATION_180: u32 = 2;
pub const VA_ROTATION_270: u32 = 3;

// VAProcPipelineParameterBuffer mirror_state values
pub const VA_MIRROR_NONE: u8 = 0;
pub const VA_MIRROR_HORIZONTAL: u8 = 1;
pub const VA_MIRROR_VERTICAL: u8 = 2;

impl Rotation {
    /// Resolve a logical transform into the hardware bitmask
    ///
    /// Reflections are applied independently. Exactly one angle is
    /// picked, in this order: 90, then reflect-Y forces 0 over
    /// 180/270, then 180 over 270, then 0.
    pub fn from_transform(transform: Transform) -> Rotation {
        let mut rotation = Rotation::empty();

        if transform.contains(Transform::REFLECT_X) {
            rotation |= Rotation::REFLECT_X;
        }
        if transform.contains(Transform::REFLECT_Y) {
            rotation |= Rotation::REFLECT_Y;
        }

        if transform.contains(Transform::ROTATE_90) {
            rotation |= Rotation::ROTATE_90;
        } else if transform.contains(Transform::REFLECT_Y) {
            rotation |= Rotation::ROTATE_0;
        } else if transform.contains(Transform::ROTATE_180) {
            rotation |= Rotation::ROTATE_180;
        } else if transform.contains(Transform::ROTATE_270) {
            rotation |= Rotation::ROTATE_270;
        } else {
            rotation |= Rotation::ROTATE_0;
        }

        rotation
    }

    /// The angle in the form the video pipeline wants it
    pub fn va_rotation(&self) -> u32 {
        if self.contains(Rotation::ROTATE_90) {
            VA_ROTATION_90
        } else if self.contains(Rotation::ROTATE_180) {
            VA_ROTATION_180
        } else if self.contains(Rotation::ROTATE_270) {
            VA_ROTATION_270
        } else {
            VA_ROTATION_NONE
        }
    }

    /// The reflections in the form the video pipeline wants them
    pub fn va_mirror(&self) -> u8 {
        let mut mirror = VA_MIRROR_NONE;
        if self.contains(Rotation::REFLECT_X) {
            mirror |= VA_MIRROR_HORIZONTAL;
        }
        if self.contains(Rotation::REFLECT_Y) {
            mirror |= VA_MIRROR_VERTICAL;
        }
        mirror
    }
}
