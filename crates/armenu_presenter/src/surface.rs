//! Surface sizing and format selection
//!
//! Pure helpers shared by the browser presenter and the renderer, kept free
//! of DOM types so they can be checked on the host.

use armenu_core::PixelRatioMode;

/// Canvas size in CSS pixels and in backing-store pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub css: (u32, u32),
    pub physical: (u32, u32),
    pub pixel_ratio: f64,
}

impl SurfaceSize {
    /// Backing-store size for a CSS size, never zero and never above
    /// `max_dimension` on either axis
    pub fn compute(css_width: f64, css_height: f64, pixel_ratio: f64, max_dimension: u32) -> Self {
        let ratio = if pixel_ratio.is_finite() && pixel_ratio > 0.0 {
            pixel_ratio
        } else {
            1.0
        };
        let clamp = |v: f64| -> u32 {
            if !v.is_finite() || v < 1.0 {
                1
            } else {
                (v as u32).clamp(1, max_dimension.max(1))
            }
        };

        Self {
            css: (clamp(css_width), clamp(css_height)),
            physical: (clamp(css_width * ratio), clamp(css_height * ratio)),
            pixel_ratio: ratio,
        }
    }

    /// Convenience over [`PixelRatioMode::effective_ratio`]
    pub fn for_mode(
        css_width: f64,
        css_height: f64,
        mode: PixelRatioMode,
        device_ratio: f64,
        user_agent: &str,
        max_dimension: u32,
    ) -> Self {
        Self::compute(
            css_width,
            css_height,
            mode.effective_ratio(device_ratio, user_agent),
            max_dimension,
        )
    }

    pub fn aspect(&self) -> f32 {
        self.physical.0 as f32 / self.physical.1 as f32
    }
}

/// Prefer an sRGB format so the hardware encodes output; otherwise the
/// shader has to do it
pub fn choose_format(formats: &[wgpu::TextureFormat]) -> Option<wgpu::TextureFormat> {
    formats
        .iter()
        .copied()
        .find(|f| f.is_srgb())
        .or_else(|| formats.first().copied())
}

/// The camera feed must show through cleared pixels, so take any mode that
/// composites alpha before falling back to whatever the surface offers
pub fn choose_alpha_mode(modes: &[wgpu::CompositeAlphaMode]) -> wgpu::CompositeAlphaMode {
    const PREFERRED: [wgpu::CompositeAlphaMode; 2] = [
        wgpu::CompositeAlphaMode::PreMultiplied,
        wgpu::CompositeAlphaMode::PostMultiplied,
    ];
    PREFERRED
        .into_iter()
        .find(|m| modes.contains(m))
        .or_else(|| modes.first().copied())
        .unwrap_or(wgpu::CompositeAlphaMode::Auto)
}

/// Whether colors must be gamma-encoded in the fragment shader
pub fn needs_gamma_encode(format: wgpu::TextureFormat) -> bool {
    !format.is_srgb()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_physical_size() {
        let size = SurfaceSize::compute(390.0, 844.0, 3.0, 8192);
        assert_eq!(size.css, (390, 844));
        assert_eq!(size.physical, (1170, 2532));
        assert!((size.aspect() - 1170.0 / 2532.0).abs() < 1e-6);
    }

    #[test]
    fn test_degenerate_sizes() {
        let size = SurfaceSize::compute(0.0, f64::NAN, 2.0, 8192);
        assert_eq!(size.physical, (1, 1));
        assert_eq!(SurfaceSize::compute(100.0, 100.0, 0.0, 8192).pixel_ratio, 1.0);
        assert_eq!(SurfaceSize::compute(3000.0, 10.0, 2.0, 2048).physical, (2048, 20));
    }

    #[test]
    fn test_safari_renders_at_one() {
        let ua = "Mozilla/5.0 (iPhone; CPU iPhone OS 17_5 like Mac OS X) AppleWebKit/605.1.15 Version/17.5 Mobile/15E148 Safari/604.1";
        let size = SurfaceSize::for_mode(390.0, 844.0, PixelRatioMode::Auto, 3.0, ua, 8192);
        assert_eq!(size.physical, (390, 844));
    }

    #[test]
    fn test_format_choice() {
        use wgpu::TextureFormat::*;
        assert_eq!(choose_format(&[Bgra8Unorm, Rgba8UnormSrgb]), Some(Rgba8UnormSrgb));
        assert_eq!(choose_format(&[Bgra8Unorm, Rgba8Unorm]), Some(Bgra8Unorm));
        assert_eq!(choose_format(&[]), None);
        assert!(needs_gamma_encode(Bgra8Unorm));
        assert!(!needs_gamma_encode(Rgba8UnormSrgb));
    }

    #[test]
    fn test_alpha_mode_choice() {
        use wgpu::CompositeAlphaMode::*;
        assert_eq!(choose_alpha_mode(&[Opaque, PreMultiplied]), PreMultiplied);
        assert_eq!(choose_alpha_mode(&[Opaque, PostMultiplied]), PostMultiplied);
        assert_eq!(choose_alpha_mode(&[Opaque]), Opaque);
        assert_eq!(choose_alpha_mode(&[]), Auto);
    }
}
