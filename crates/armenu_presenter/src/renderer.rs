//! Scene renderer
//!
//! Draws the single on-stage model over a transparent clear so the camera
//! feed behind the canvas stays visible. GPU resources for a model are
//! created on [`Stage::attach`] and destroyed on [`Stage::detach`]; the
//! decoded [`ModelData`] itself stays in the model cache.

use std::rc::Rc;
use std::sync::Arc;

use wgpu::util::DeviceExt;
use wgpu::*;

use armenu_asset::model as asset;
use armenu_asset::{AlphaMode, Material, MeshVertex, ModelData};
use armenu_core::{CameraRig, LightRig, ModelTransform, Stage};

pub const DEPTH_FORMAT: TextureFormat = TextureFormat::Depth32Float;

/// Per-frame camera, model and light state (group 0)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct FrameUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub model: [[f32; 4]; 4],
    pub normal: [[f32; 4]; 4],
    /// rgb: ambient color * intensity, w: 1.0 when the shader gamma-encodes
    pub ambient: [f32; 4],
    pub key_dir: [f32; 4],
    pub key_color: [f32; 4],
    pub fill_dir: [f32; 4],
    pub fill_color: [f32; 4],
}

impl FrameUniforms {
    pub fn new(
        camera: &CameraRig,
        lights: &LightRig,
        transform: Option<&ModelTransform>,
        aspect: f32,
        gamma_encode: bool,
    ) -> Self {
        let model = transform.map(|t| t.matrix()).unwrap_or(glam::Mat4::IDENTITY);
        let normal = model.inverse().transpose();
        let normal = if normal.is_finite() {
            normal
        } else {
            glam::Mat4::IDENTITY
        };
        let ambient = lights.ambient_color * lights.ambient_intensity;
        let key = lights.key.color * lights.key.intensity;
        let fill = lights.fill.color * lights.fill.intensity;

        Self {
            view_proj: camera.view_projection(aspect).to_cols_array_2d(),
            model: model.to_cols_array_2d(),
            normal: normal.to_cols_array_2d(),
            ambient: ambient.extend(if gamma_encode { 1.0 } else { 0.0 }).to_array(),
            key_dir: lights.key.direction().extend(0.0).to_array(),
            key_color: key.extend(1.0).to_array(),
            fill_dir: lights.fill.direction().extend(0.0).to_array(),
            fill_color: fill.extend(1.0).to_array(),
        }
    }
}

/// Per-primitive material state (group 1, binding 0)
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniforms {
    pub base_color: [f32; 4],
    /// x: alpha cutoff (0 disables), y: 1.0 when blended, z: 1.0 when unlit
    pub params: [f32; 4],
    /// Base color UV transform rows, xyz used
    pub uv_row0: [f32; 4],
    pub uv_row1: [f32; 4],
}

impl MaterialUniforms {
    pub fn from_material(material: &Material) -> Self {
        let cutoff = match material.alpha_mode {
            AlphaMode::Mask => material.alpha_cutoff.max(f32::EPSILON),
            _ => 0.0,
        };
        let blended = if material.alpha_mode == AlphaMode::Blend {
            1.0
        } else {
            0.0
        };
        let unlit = if material.unlit { 1.0 } else { 0.0 };
        let [row0, row1] = material.base_color_uv.rows();
        Self {
            base_color: material.base_color_factor,
            params: [cutoff, blended, unlit, 0.0],
            uv_row0: [row0[0], row0[1], row0[2], 0.0],
            uv_row1: [row1[0], row1[1], row1[2], 0.0],
        }
    }
}

/// Upload/release counters, mostly for diagnostics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderStats {
    pub uploads: u64,
    pub releases: u64,
    pub frames: u64,
}

struct GpuPrimitive {
    vertex_buffer: Buffer,
    index_buffer: Buffer,
    index_count: u32,
    material_buffer: Buffer,
    material_bind_group: BindGroup,
    blended: bool,
}

/// GPU-side copy of one model
struct GpuModel {
    /// Opaque primitives first, blended last
    primitives: Vec<GpuPrimitive>,
    textures: Vec<Texture>,
}

impl GpuModel {
    fn release(self) {
        for primitive in self.primitives {
            primitive.vertex_buffer.destroy();
            primitive.index_buffer.destroy();
            primitive.material_buffer.destroy();
        }
        for texture in self.textures {
            texture.destroy();
        }
    }
}

struct DepthTarget {
    texture: Texture,
    view: TextureView,
    size: (u32, u32),
}

pub struct SceneRenderer {
    device: Arc<Device>,
    queue: Arc<Queue>,
    format: TextureFormat,
    gamma_encode: bool,
    camera: CameraRig,
    lights: LightRig,

    frame_buffer: Buffer,
    frame_bind_group: BindGroup,
    material_layout: BindGroupLayout,
    opaque_pipeline: RenderPipeline,
    blend_pipeline: RenderPipeline,
    sampler: Sampler,
    white_texture: Texture,
    white_view: TextureView,
    depth: DepthTarget,

    attached: Option<(Rc<ModelData>, GpuModel)>,
    stats: RenderStats,
}

impl SceneRenderer {
    pub fn new(
        device: Arc<Device>,
        queue: Arc<Queue>,
        format: TextureFormat,
        size: (u32, u32),
        camera: CameraRig,
    ) -> Self {
        let frame_buffer = device.create_buffer(&BufferDescriptor {
            label: Some("frame_uniforms"),
            size: std::mem::size_of::<FrameUniforms>() as u64,
            usage: BufferUsages::UNIFORM | BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let frame_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("frame_bind_group_layout"),
            entries: &[BindGroupLayoutEntry {
                binding: 0,
                visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                ty: BindingType::Buffer {
                    ty: BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let material_layout = device.create_bind_group_layout(&BindGroupLayoutDescriptor {
            label: Some("material_bind_group_layout"),
            entries: &[
                BindGroupLayoutEntry {
                    binding: 0,
                    visibility: ShaderStages::VERTEX | ShaderStages::FRAGMENT,
                    ty: BindingType::Buffer {
                        ty: BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Base color texture
                BindGroupLayoutEntry {
                    binding: 1,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Texture {
                        sample_type: TextureSampleType::Float { filterable: true },
                        view_dimension: TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                BindGroupLayoutEntry {
                    binding: 2,
                    visibility: ShaderStages::FRAGMENT,
                    ty: BindingType::Sampler(SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let frame_bind_group = device.create_bind_group(&BindGroupDescriptor {
            label: Some("frame_bind_group"),
            layout: &frame_layout,
            entries: &[BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let shader = device.create_shader_module(ShaderModuleDescriptor {
            label: Some("model_shader"),
            source: ShaderSource::Wgsl(include_str!("shaders/model.wgsl").into()),
        });

        let pipeline_layout = device.create_pipeline_layout(&PipelineLayoutDescriptor {
            label: Some("model_pipeline_layout"),
            bind_group_layouts: &[&frame_layout, &material_layout],
            push_constant_ranges: &[],
        });

        let opaque_pipeline =
            create_model_pipeline(&device, &pipeline_layout, &shader, format, false);
        let blend_pipeline = create_model_pipeline(&device, &pipeline_layout, &shader, format, true);

        let sampler = device.create_sampler(&SamplerDescriptor {
            label: Some("base_color_sampler"),
            address_mode_u: AddressMode::Repeat,
            address_mode_v: AddressMode::Repeat,
            address_mode_w: AddressMode::Repeat,
            mag_filter: FilterMode::Linear,
            min_filter: FilterMode::Linear,
            mipmap_filter: FilterMode::Nearest,
            ..Default::default()
        });

        let white_texture = upload_texture(&device, &queue, &asset::Texture::white(), "white");
        let white_view = white_texture.create_view(&TextureViewDescriptor::default());
        let depth = create_depth_target(&device, size);

        Self {
            device,
            queue,
            format,
            gamma_encode: crate::surface::needs_gamma_encode(format),
            camera,
            lights: LightRig::default(),
            frame_buffer,
            frame_bind_group,
            material_layout,
            opaque_pipeline,
            blend_pipeline,
            sampler,
            white_texture,
            white_view,
            depth,
            attached: None,
            stats: RenderStats::default(),
        }
    }

    pub fn format(&self) -> TextureFormat {
        self.format
    }

    pub fn stats(&self) -> RenderStats {
        self.stats
    }

    pub fn lights_mut(&mut self) -> &mut LightRig {
        &mut self.lights
    }

    /// Source path of the model currently on stage
    pub fn attached_source(&self) -> Option<&str> {
        self.attached.as_ref().map(|(model, _)| model.source.as_str())
    }

    /// Recreate the depth buffer when the surface size changed
    pub fn resize(&mut self, size: (u32, u32)) {
        let size = (size.0.max(1), size.1.max(1));
        if self.depth.size != size {
            self.depth.texture.destroy();
            self.depth = create_depth_target(&self.device, size);
        }
    }

    /// Clear to transparent and draw the attached model, if any, at `transform`
    pub fn render(&mut self, target: &TextureView, size: (u32, u32), transform: Option<&ModelTransform>) {
        self.resize(size);

        let aspect = self.depth.size.0 as f32 / self.depth.size.1 as f32;
        let uniforms =
            FrameUniforms::new(&self.camera, &self.lights, transform, aspect, self.gamma_encode);
        self.queue
            .write_buffer(&self.frame_buffer, 0, bytemuck::bytes_of(&uniforms));

        let mut encoder = self.device.create_command_encoder(&CommandEncoderDescriptor {
            label: Some("scene_encoder"),
        });

        {
            let mut pass = encoder.begin_render_pass(&RenderPassDescriptor {
                label: Some("scene_pass"),
                color_attachments: &[Some(RenderPassColorAttachment {
                    view: target,
                    resolve_target: None,
                    ops: Operations {
                        load: LoadOp::Clear(Color::TRANSPARENT),
                        store: StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(Operations {
                        load: LoadOp::Clear(1.0),
                        store: StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let (Some((_, gpu)), Some(_)) = (&self.attached, transform) {
                pass.set_bind_group(0, &self.frame_bind_group, &[]);
                for primitive in &gpu.primitives {
                    let pipeline = if primitive.blended {
                        &self.blend_pipeline
                    } else {
                        &self.opaque_pipeline
                    };
                    pass.set_pipeline(pipeline);
                    pass.set_bind_group(1, &primitive.material_bind_group, &[]);
                    pass.set_vertex_buffer(0, primitive.vertex_buffer.slice(..));
                    pass.set_index_buffer(primitive.index_buffer.slice(..), IndexFormat::Uint32);
                    pass.draw_indexed(0..primitive.index_count, 0, 0..1);
                }
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        self.stats.frames += 1;
    }

    fn upload(&self, model: &ModelData) -> GpuModel {
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        let textures: Vec<Texture> = model
            .textures
            .iter()
            .enumerate()
            .map(|(i, texture)| {
                let label = format!("{}#texture{}", model.source, i);
                match texture.fit_within(max_dimension) {
                    Some(scaled) => {
                        log::warn!(
                            "{}: {}x{} exceeds {}, uploading {}x{}",
                            label,
                            texture.width,
                            texture.height,
                            max_dimension,
                            scaled.width,
                            scaled.height
                        );
                        upload_texture(&self.device, &self.queue, &scaled, &label)
                    }
                    None => upload_texture(&self.device, &self.queue, texture, &label),
                }
            })
            .collect();
        let views: Vec<TextureView> = textures
            .iter()
            .map(|t| t.create_view(&TextureViewDescriptor::default()))
            .collect();

        let default_material = Material::default();
        let mut primitives = Vec::with_capacity(model.primitives.len());
        for (i, primitive) in model.primitives.iter().enumerate() {
            if primitive.indices.is_empty() {
                continue;
            }
            let material = model.material_of(primitive).unwrap_or(&default_material);
            let texture_view = material
                .base_color_texture
                .and_then(|t| views.get(t))
                .unwrap_or(&self.white_view);

            let vertex_buffer = self.device.create_buffer_init(&util::BufferInitDescriptor {
                label: Some("model_vertices"),
                contents: bytemuck::cast_slice(&primitive.vertices),
                usage: BufferUsages::VERTEX,
            });
            let index_buffer = self.device.create_buffer_init(&util::BufferInitDescriptor {
                label: Some("model_indices"),
                contents: bytemuck::cast_slice(&primitive.indices),
                usage: BufferUsages::INDEX,
            });
            let material_buffer = self.device.create_buffer_init(&util::BufferInitDescriptor {
                label: Some("material_uniforms"),
                contents: bytemuck::bytes_of(&MaterialUniforms::from_material(material)),
                usage: BufferUsages::UNIFORM,
            });
            let material_bind_group = self.device.create_bind_group(&BindGroupDescriptor {
                label: Some(&format!("{}#material{}", model.source, i)),
                layout: &self.material_layout,
                entries: &[
                    BindGroupEntry {
                        binding: 0,
                        resource: material_buffer.as_entire_binding(),
                    },
                    BindGroupEntry {
                        binding: 1,
                        resource: BindingResource::TextureView(texture_view),
                    },
                    BindGroupEntry {
                        binding: 2,
                        resource: BindingResource::Sampler(&self.sampler),
                    },
                ],
            });

            primitives.push(GpuPrimitive {
                vertex_buffer,
                index_buffer,
                index_count: primitive.indices.len() as u32,
                material_buffer,
                material_bind_group,
                blended: material.alpha_mode == AlphaMode::Blend,
            });
        }
        // Stable: keeps file order within each group
        primitives.sort_by_key(|p| p.blended);

        GpuModel { primitives, textures }
    }
}

impl Stage<ModelData> for SceneRenderer {
    fn attach(&mut self, model: &Rc<ModelData>) {
        if let Some((previous, gpu)) = self.attached.take() {
            log::warn!("Attaching {} over {}", model.source, previous.source);
            gpu.release();
            self.stats.releases += 1;
        }
        let gpu = self.upload(model);
        log::debug!(
            "Uploaded {}: {} draws, {} textures",
            model.source,
            gpu.primitives.len(),
            gpu.textures.len()
        );
        self.attached = Some((Rc::clone(model), gpu));
        self.stats.uploads += 1;
    }

    fn detach(&mut self, model: &Rc<ModelData>) {
        match self.attached.take() {
            Some((current, gpu)) if Rc::ptr_eq(&current, model) => {
                gpu.release();
                self.stats.releases += 1;
                log::debug!("Released {}", current.source);
            }
            other => {
                log::warn!("Detach of {} which is not on stage", model.source);
                self.attached = other;
            }
        }
    }
}

impl Drop for SceneRenderer {
    fn drop(&mut self) {
        if let Some((_, gpu)) = self.attached.take() {
            gpu.release();
        }
        self.white_texture.destroy();
        self.depth.texture.destroy();
    }
}

fn create_model_pipeline(
    device: &Device,
    layout: &PipelineLayout,
    shader: &ShaderModule,
    format: TextureFormat,
    blended: bool,
) -> RenderPipeline {
    let vertex_layout = VertexBufferLayout {
        array_stride: std::mem::size_of::<MeshVertex>() as BufferAddress,
        step_mode: VertexStepMode::Vertex,
        attributes: &vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
    };

    device.create_render_pipeline(&RenderPipelineDescriptor {
        label: Some(if blended { "model_blend_pipeline" } else { "model_opaque_pipeline" }),
        layout: Some(layout),
        vertex: VertexState {
            module: shader,
            entry_point: "vs_main",
            buffers: &[vertex_layout],
            compilation_options: PipelineCompilationOptions::default(),
        },
        fragment: Some(FragmentState {
            module: shader,
            entry_point: "fs_main",
            targets: &[Some(ColorTargetState {
                format,
                blend: Some(if blended {
                    BlendState::PREMULTIPLIED_ALPHA_BLENDING
                } else {
                    BlendState::REPLACE
                }),
                write_mask: ColorWrites::ALL,
            })],
            compilation_options: PipelineCompilationOptions::default(),
        }),
        primitive: PrimitiveState {
            topology: PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: FrontFace::Ccw,
            // Menu models are often authored single-sided with open backs
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: !blended,
            depth_compare: CompareFunction::Less,
            stencil: StencilState::default(),
            bias: DepthBiasState::default(),
        }),
        multisample: MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

fn upload_texture(device: &Device, queue: &Queue, image: &asset::Texture, label: &str) -> Texture {
    let size = Extent3d {
        width: image.width.max(1),
        height: image.height.max(1),
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&TextureDescriptor {
        label: Some(label),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: TextureFormat::Rgba8UnormSrgb,
        usage: TextureUsages::TEXTURE_BINDING | TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        ImageCopyTexture {
            texture: &texture,
            mip_level: 0,
            origin: Origin3d::ZERO,
            aspect: TextureAspect::All,
        },
        &image.pixels,
        ImageDataLayout {
            offset: 0,
            bytes_per_row: Some(image.bytes_per_row()),
            rows_per_image: Some(image.height),
        },
        size,
    );
    texture
}

fn create_depth_target(device: &Device, size: (u32, u32)) -> DepthTarget {
    let size = (size.0.max(1), size.1.max(1));
    let texture = device.create_texture(&TextureDescriptor {
        label: Some("depth_texture"),
        size: Extent3d {
            width: size.0,
            height: size.1,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    let view = texture.create_view(&TextureViewDescriptor::default());
    DepthTarget { texture, view, size }
}
