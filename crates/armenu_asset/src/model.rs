//! Decoded, renderer-ready model data

use glam::Vec3;

/// Interleaved vertex uploaded as-is to the GPU
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounds {
    pub min: Vec3,
    pub max: Vec3,
}

impl Bounds {
    /// Inverted box that any point extends
    pub fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::MAX),
            max: Vec3::splat(f32::MIN),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x
    }

    pub fn extend(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    pub fn union(&mut self, other: &Bounds) {
        if !other.is_empty() {
            self.extend(other.min);
            self.extend(other.max);
        }
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec3 {
        if self.is_empty() {
            Vec3::ZERO
        } else {
            self.max - self.min
        }
    }
}

impl Default for Bounds {
    fn default() -> Self {
        Self::empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AlphaMode {
    Opaque,
    Mask,
    Blend,
}

/// `KHR_texture_transform` applied to base color UVs
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct UvTransform {
    pub offset: [f32; 2],
    /// Radians, counter-clockwise in UV space
    pub rotation: f32,
    pub scale: [f32; 2],
}

impl UvTransform {
    pub const IDENTITY: Self = Self {
        offset: [0.0, 0.0],
        rotation: 0.0,
        scale: [1.0, 1.0],
    };

    /// Top two rows of `translation * rotation * scale`
    pub fn rows(&self) -> [[f32; 3]; 2] {
        let (sin, cos) = self.rotation.sin_cos();
        let [sx, sy] = self.scale;
        let [ox, oy] = self.offset;
        [[cos * sx, sin * sy, ox], [-sin * sx, cos * sy, oy]]
    }

    pub fn apply(&self, uv: [f32; 2]) -> [f32; 2] {
        let [r0, r1] = self.rows();
        [
            r0[0] * uv[0] + r0[1] * uv[1] + r0[2],
            r1[0] * uv[0] + r1[1] * uv[1] + r1[2],
        ]
    }
}

impl Default for UvTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Base-color material; lighting comes from the fixed scene rig
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    /// Linear RGBA multiplier
    pub base_color_factor: [f32; 4],
    /// Index into `ModelData::textures`
    pub base_color_texture: Option<usize>,
    pub base_color_uv: UvTransform,
    pub alpha_mode: AlphaMode,
    pub alpha_cutoff: f32,
    pub double_sided: bool,
    /// `KHR_materials_unlit`: base color is output without scene lighting
    pub unlit: bool,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            name: String::new(),
            base_color_factor: [1.0; 4],
            base_color_texture: None,
            base_color_uv: UvTransform::IDENTITY,
            alpha_mode: AlphaMode::Opaque,
            alpha_cutoff: 0.5,
            double_sided: false,
            unlit: false,
        }
    }
}

/// RGBA8 (sRGB) image
#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Texture {
    /// Stand-in for images that failed to decode
    pub fn white() -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![255; 4],
        }
    }

    pub fn bytes_per_row(&self) -> u32 {
        self.width * 4
    }

    /// Copy scaled down so neither side exceeds `max_dimension`, keeping
    /// the aspect ratio. `None` when it already fits.
    pub fn fit_within(&self, max_dimension: u32) -> Option<Texture> {
        let max_dimension = max_dimension.max(1);
        if self.width <= max_dimension && self.height <= max_dimension {
            return None;
        }
        let image = image::RgbaImage::from_raw(self.width, self.height, self.pixels.clone())?;
        let scale = max_dimension as f64 / self.width.max(self.height) as f64;
        let width = ((self.width as f64 * scale).round() as u32).clamp(1, max_dimension);
        let height = ((self.height as f64 * scale).round() as u32).clamp(1, max_dimension);
        let resized =
            image::imageops::resize(&image, width, height, image::imageops::FilterType::Triangle);

        Some(Texture {
            width,
            height,
            pixels: resized.into_raw(),
        })
    }
}

/// Triangle list with node transforms already applied
#[derive(Clone, Debug)]
pub struct Primitive {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    /// Index into `ModelData::materials`
    pub material: Option<usize>,
    pub bounds: Bounds,
}

/// A decoded model, shared between the cache and the renderer
#[derive(Clone, Debug)]
pub struct ModelData {
    /// Asset path the model was decoded from
    pub source: String,
    pub primitives: Vec<Primitive>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub bounds: Bounds,
}

impl ModelData {
    pub fn vertex_count(&self) -> usize {
        self.primitives.iter().map(|p| p.vertices.len()).sum()
    }

    pub fn triangle_count(&self) -> usize {
        self.primitives.iter().map(|p| p.indices.len() / 3).sum()
    }

    /// Material for a primitive, falling back to the glTF default material
    pub fn material_of(&self, primitive: &Primitive) -> Option<&Material> {
        primitive.material.and_then(|i| self.materials.get(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vertex_layout() {
        assert_eq!(std::mem::size_of::<MeshVertex>(), 32); // 12 + 12 + 8
    }

    #[test]
    fn test_bounds() {
        let mut b = Bounds::empty();
        assert!(b.is_empty());
        assert_eq!(b.size(), Vec3::ZERO);

        b.extend(Vec3::new(-1.0, 0.0, 2.0));
        b.extend(Vec3::new(1.0, 4.0, 0.0));
        assert_eq!(b.center(), Vec3::new(0.0, 2.0, 1.0));
        assert_eq!(b.size(), Vec3::new(2.0, 4.0, 2.0));

        let mut total = Bounds::empty();
        total.union(&Bounds::empty());
        assert!(total.is_empty());
        total.union(&b);
        assert_eq!(total, b);
    }

    #[test]
    fn test_uv_transform() {
        assert_eq!(UvTransform::IDENTITY.apply([0.25, 0.75]), [0.25, 0.75]);

        let atlas = UvTransform {
            offset: [0.5, 0.0],
            rotation: 0.0,
            scale: [0.5, 0.5],
        };
        assert_eq!(atlas.apply([1.0, 1.0]), [1.0, 0.5]);

        let quarter = UvTransform {
            rotation: std::f32::consts::FRAC_PI_2,
            ..UvTransform::IDENTITY
        };
        let [u, v] = quarter.apply([1.0, 0.0]);
        assert!(u.abs() < 1e-6 && (v + 1.0).abs() < 1e-6, "({}, {})", u, v);
    }

    #[test]
    fn test_texture_fit_within() {
        let big = Texture {
            width: 8,
            height: 4,
            pixels: vec![128; 8 * 4 * 4],
        };
        assert_eq!(big.fit_within(8), None);

        let small = big.fit_within(4).unwrap();
        assert_eq!((small.width, small.height), (4, 2));
        assert_eq!(small.pixels.len(), 4 * 2 * 4);
        assert!(small.pixels.iter().all(|&p| p == 128));
    }
}
