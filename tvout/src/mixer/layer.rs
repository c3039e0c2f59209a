//! Compositor layers and the overlay descriptions that feed them.

use embedded_graphics::geometry::{Point, Size};
use embedded_graphics::primitives::Rectangle;

use crate::error::{Error, Result};

/// Number of hardware layers
pub const LAYER_COUNT: usize = 3;

/// Hardware layer, in z-order index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerId {
    Graphics0 = 0,
    Graphics1 = 1,
    /// Scaled video plane fed by the video processor
    VideoScaler = 2,
}

impl LayerId {
    pub const ALL: [LayerId; LAYER_COUNT] = [LayerId::Graphics0, LayerId::Graphics1, LayerId::VideoScaler];

    pub fn from_index(index: usize) -> Result<Self> {
        Self::ALL.get(index).copied().ok_or(Error::InvalidArgument)
    }

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn is_graphics(self) -> bool {
        !matches!(self, LayerId::VideoScaler)
    }
}

/// Source buffer layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Argb8888,
    Argb4444,
    /// Two-plane 4:2:0, linear
    Nv12,
    /// Two-plane 4:2:0, 64x32 macroblock tiles
    Nv12Tiled,
}

impl PixelFormat {
    /// Graphics format implied by a bit depth
    pub fn from_bpp(bpp: u32) -> Self {
        if bpp == 16 {
            PixelFormat::Argb4444
        } else {
            PixelFormat::Argb8888
        }
    }

    pub fn is_yuv(self) -> bool {
        matches!(self, PixelFormat::Nv12 | PixelFormat::Nv12Tiled)
    }
}

/// What the framework wants shown on a layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Overlay {
    /// Luma (or packed) and chroma buffer addresses; chroma 0 when the
    /// planes share one buffer
    pub dma_addr: [u32; 2],
    pub format: PixelFormat,
    pub bpp: u32,
    /// Source crop within the framebuffer
    pub source: Rectangle,
    /// Framebuffer line length in bytes
    pub pitch: u32,
    /// Destination window on the output
    pub destination: Rectangle,
    /// Size of the output mode
    pub mode: Size,
    pub interlaced: bool,
}

/// Latched per-layer state, in hardware units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct WindowLayer {
    pub dma_addr: u32,
    pub chroma_dma_addr: u32,
    pub format: PixelFormat,
    pub bpp: u32,
    pub crtc_x: u32,
    pub crtc_y: u32,
    pub crtc_width: u32,
    pub crtc_height: u32,
    pub fb_x: u32,
    pub fb_y: u32,
    /// Framebuffer width in pixels
    pub fb_width: u32,
    pub fb_height: u32,
    pub mode_width: u32,
    pub mode_height: u32,
    pub interlaced: bool,
    /// A layer-update trigger was issued since the last completed flip
    pub updated: bool,
}

fn coordinate(p: Point) -> Result<(u32, u32)> {
    let x = u32::try_from(p.x).map_err(|_| Error::InvalidArgument)?;
    let y = u32::try_from(p.y).map_err(|_| Error::InvalidArgument)?;
    Ok((x, y))
}

impl WindowLayer {
    /// Convert an overlay description. Keeps the `updated` flag of `self`.
    pub fn from_overlay(&self, overlay: &Overlay) -> Result<Self> {
        let bytes_per_pixel = overlay.bpp / 8;
        if bytes_per_pixel == 0 {
            return Err(Error::InvalidArgument);
        }
        let (fb_x, fb_y) = coordinate(overlay.source.top_left)?;
        let (crtc_x, crtc_y) = coordinate(overlay.destination.top_left)?;

        Ok(Self {
            dma_addr: overlay.dma_addr[0],
            chroma_dma_addr: overlay.dma_addr[1],
            format: overlay.format,
            bpp: overlay.bpp,
            crtc_x,
            crtc_y,
            crtc_width: overlay.destination.size.width,
            crtc_height: overlay.destination.size.height,
            fb_x,
            fb_y,
            fb_width: overlay.pitch / bytes_per_pixel,
            fb_height: overlay.source.size.height,
            mode_width: overlay.mode.width,
            mode_height: overlay.mode.height,
            interlaced: overlay.interlaced,
            updated: self.updated,
        })
    }

    /// Start address with the source offset folded in. Wraps in the 32-bit
    /// bus address space like the hardware address counter.
    pub fn graphics_base(&self) -> u32 {
        let bpp = self.bpp;
        let x_offset = self.fb_x.wrapping_mul(bpp) >> 3;
        let y_offset = self.fb_y.wrapping_mul(self.fb_width).wrapping_mul(bpp) >> 3;
        self.dma_addr.wrapping_add(x_offset).wrapping_add(y_offset)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn overlay(bpp: u32) -> Overlay {
        Overlay {
            dma_addr: [0x4000_0000, 0],
            format: PixelFormat::from_bpp(bpp),
            bpp,
            source: Rectangle::new(Point::new(8, 2), Size::new(640, 480)),
            pitch: 1280 * bpp / 8,
            destination: Rectangle::new(Point::new(100, 50), Size::new(640, 480)),
            mode: Size::new(1280, 720),
            interlaced: false,
        }
    }

    #[test]
    fn test_layer_index() {
        assert_eq!(LayerId::from_index(0), Ok(LayerId::Graphics0));
        assert_eq!(LayerId::from_index(2), Ok(LayerId::VideoScaler));
        assert_eq!(LayerId::from_index(3), Err(Error::InvalidArgument));
        assert!(LayerId::Graphics1.is_graphics());
        assert!(!LayerId::VideoScaler.is_graphics());
    }

    #[test]
    fn test_from_overlay() {
        let win = WindowLayer::default().from_overlay(&overlay(32)).unwrap();
        assert_eq!(win.fb_width, 1280);
        assert_eq!((win.fb_x, win.fb_y), (8, 2));
        assert_eq!((win.crtc_x, win.crtc_y), (100, 50));
        assert_eq!((win.mode_width, win.mode_height), (1280, 720));
        // 2 lines of 1280 plus 8 pixels, 4 bytes each
        assert_eq!(win.graphics_base(), 0x4000_0000 + (2 * 1280 + 8) * 4);
    }

    #[test]
    fn test_graphics_base_deep_in_tall_framebuffer() {
        let mut tall = overlay(32);
        tall.source.top_left = Point::new(0, 70000);
        tall.pitch = 1920 * 4;
        let win = WindowLayer::default().from_overlay(&tall).unwrap();

        // 70000 * 1920 * 32 bits wraps to 5_832_704
        assert_eq!(win.graphics_base(), 0x4000_0000 + 5_832_704 / 8);
    }

    #[test]
    fn test_from_overlay_16bpp() {
        let win = WindowLayer::default().from_overlay(&overlay(16)).unwrap();
        assert_eq!(win.format, PixelFormat::Argb4444);
        assert_eq!(win.fb_width, 1280);
    }

    #[test]
    fn test_from_overlay_rejects_bad_input() {
        let mut bad = overlay(32);
        bad.bpp = 4;
        assert_eq!(WindowLayer::default().from_overlay(&bad), Err(Error::InvalidArgument));

        let mut bad = overlay(32);
        bad.destination.top_left = Point::new(-1, 0);
        assert_eq!(WindowLayer::default().from_overlay(&bad), Err(Error::InvalidArgument));
    }

    #[test]
    fn test_from_overlay_keeps_update_flag() {
        let pending = WindowLayer {
            updated: true,
            ..Default::default()
        };
        assert!(pending.from_overlay(&overlay(32)).unwrap().updated);
    }
}
