// Pixel format handling
//
// Buffers are described with DRM fourcc codes. The video
// processing hardware wants its own fourcc for the surface and
// a render target class for the config. Anything we don't know
// how to process maps to 0, which the surface import will refuse.

/// Build a little-endian fourcc code
pub const fn fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

// DRM formats we may be handed
pub const DRM_FORMAT_NV12: u32 = fourcc(b'N', b'V', b'1', b'2');
pub const DRM_FORMAT_YVU420: u32 = fourcc(b'Y', b'V', b'1', b'2');
pub const DRM_FORMAT_YUV420: u32 = fourcc(b'Y', b'U', b'1', b'2');
pub const DRM_FORMAT_YUV422: u32 = fourcc(b'Y', b'U', b'1', b'6');
pub const DRM_FORMAT_YUV444: u32 = fourcc(b'Y', b'U', b'2', b'4');
pub const DRM_FORMAT_UYVY: u32 = fourcc(b'U', b'Y', b'V', b'Y');
pub const DRM_FORMAT_YUYV: u32 = fourcc(b'Y', b'U', b'Y', b'V');
pub const DRM_FORMAT_YVYU: u32 = fourcc(b'Y', b'V', b'Y', b'U');
pub const DRM_FORMAT_VYUY: u32 = fourcc(b'V', b'Y', b'U', b'Y');
pub const DRM_FORMAT_AYUV: u32 = fourcc(b'A', b'Y', b'U', b'V');
pub const DRM_FORMAT_XRGB8888: u32 = fourcc(b'X', b'R', b'2', b'4');
pub const DRM_FORMAT_ARGB8888: u32 = fourcc(b'A', b'R', b'2', b'4');

// VA surface fourccs
pub const VA_FOURCC_NV12: u32 = fourcc(b'N', b'V', b'1', b'2');
pub const VA_FOURCC_YV12: u32 = fourcc(b'Y', b'V', b'1', b'2');
pub const VA_FOURCC_YU12: u32 = fourcc(b'Y', b'U', b'1', b'2');
pub const VA_FOURCC_YU16: u32 = fourcc(b'Y', b'U', b'1', b'6');
pub const VA_FOURCC_UYVY: u32 = fourcc(b'U', b'Y', b'V', b'Y');

// VA render target classes
pub const VA_RT_FORMAT_YUV420: u32 = 0x0000_0001;
pub const VA_RT_FORMAT_YUV422: u32 = 0x0000_0002;
pub const VA_RT_FORMAT_YUV444: u32 = 0x0000_0004;

/// Get the VA surface fourcc for a DRM format
///
/// The packed 4:2:2 variants all import as UYVY. Returns 0 for
/// formats the hardware path does not handle (4:4:4, AYUV, RGB).
pub fn va_format_for(drm_format: u32) -> u32 {
    match drm_format {
        DRM_FORMAT_NV12 => VA_FOURCC_NV12,
        DRM_FORMAT_YVU420 => VA_FOURCC_YV12,
        DRM_FORMAT_YUV420 => VA_FOURCC_YU12,
        DRM_FORMAT_YUV422 => VA_FOURCC_YU16,
        DRM_FORMAT_UYVY | DRM_FORMAT_YUYV | DRM_FORMAT_YVYU | DRM_FORMAT_VYUY => VA_FOURCC_UYVY,
        _ => 0,
    }
}

/// Get the render target class for a DRM format
///
/// Packed 4:2:2 is processed through the 4:2:0 class. Returns 0
/// for the same set of formats `va_format_for` rejects.
pub fn rt_format_for(drm_format: u32) -> u32 {
    match drm_format {
        DRM_FORMAT_NV12 | DRM_FORMAT_YVU420 | DRM_FORMAT_YUV420 => VA_RT_FORMAT_YUV420,
        DRM_FORMAT_YUV422 => VA_RT_FORMAT_YUV422,
        DRM_FORMAT_UYVY | DRM_FORMAT_YUYV | DRM_FORMAT_YVYU | DRM_FORMAT_VYUY => {
            VA_RT_FORMAT_YUV420
        }
        _ => 0,
    }
}

/// Can this format go through the video processing path at all
pub fn is_supported(drm_format: u32) -> bool {
    va_format_for(drm_format) != 0 && rt_format_for(drm_format) != 0
}

/// Printable name of a fourcc, for dumps
pub fn fourcc_name(code: u32) -> String {
    code.to_le_bytes()
        .iter()
        .map(|b| {
            if b.is_ascii_graphic() || *b == b' ' {
                *b as char
            } else {
                '?'
            }
        })
        .collect()
}
