use std::collections::HashMap;
use std::num::NonZeroU64;
use std::path::Path;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use bytemuck::{bytes_of, Pod, Zeroable};
use log::{debug, warn};
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::gpu::{
    GpuBackend, PixelFormat, ProgramId, ShaderProgramRef, UniformLocation, UniformValue,
    VertexAttribute, UNIFORM_CAMERA_MATRIX, UNIFORM_CAMERA_POSITION, UNIFORM_LIGHT_COLOR,
    UNIFORM_LIGHT_POSITION, UNIFORM_MODEL, VERTEX_ATTRIBUTES, VERTEX_STRIDE_BYTES,
};
use crate::mesh::CpuMeshData;
use crate::render::programs::{slot_of, ProgramSpec, UNIFORM_SLOTS};

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.07,
    g: 0.13,
    b: 0.17,
    a: 1.0,
};

/// wgpu implementation of the registry's device operations.
///
/// GL-style immediate calls are recorded during a frame and replayed in a
/// single render pass by [`WgpuBackend::end_frame`].
pub struct WgpuBackend {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    uniform_layout: wgpu::BindGroupLayout,
    texture_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    fallback_texture: Arc<GpuTexture>,
    programs: HashMap<ProgramId, Program>,
    next_program: u64,
    current: Option<ProgramId>,
    uniform_state: HashMap<ProgramId, DrawUniforms>,
    bound_texture: Option<Arc<GpuTexture>>,
    draws: Vec<RecordedDraw>,
}

impl WgpuBackend {
    pub async fn new(window: Arc<Window>) -> Result<Self> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(anyhow!("window has zero area"));
        }

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("failed to acquire GPU adapter")?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("meshview-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::Off,
            })
            .await
            .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .context("surface reports no formats")?;

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: wgpu::PresentMode::Fifo,
            desired_maximum_frame_latency: 2,
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
        };
        surface.configure(&device, &config);

        let depth = DepthBuffer::create(&device, config.width, config.height);

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("draw-uniform-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: NonZeroU64::new(std::mem::size_of::<DrawUniforms>() as u64),
                },
                count: None,
            }],
        });

        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("texture-layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("texture-sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let fallback_texture = Arc::new(GpuTexture::from_rgba(
            &device,
            &queue,
            &texture_layout,
            &sampler,
            "fallback-white",
            1,
            1,
            &[255, 255, 255, 255],
        ));

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            uniform_layout,
            texture_layout,
            sampler,
            fallback_texture,
            programs: HashMap::new(),
            next_program: 0,
            current: None,
            uniform_state: HashMap::new(),
            bound_texture: None,
            draws: Vec::new(),
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Compiles a WGSL program into a pipeline. The caller owns the returned reference.
    pub fn create_program(&mut self, spec: &ProgramSpec) -> Result<ShaderProgramRef> {
        let module = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some(spec.name),
                source: wgpu::ShaderSource::Wgsl(spec.source.into()),
            });

        let samples_texture = spec.samples_texture();
        let mut layouts = vec![&self.uniform_layout];
        if samples_texture {
            layouts.push(&self.texture_layout);
        }
        let pipeline_layout = self
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some(spec.name),
                bind_group_layouts: &layouts,
                push_constant_ranges: &[],
            });

        let attributes = vertex_attributes(&VERTEX_ATTRIBUTES)?;
        let pipeline = self
            .device
            .create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(spec.name),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &module,
                    entry_point: Some("vs_main"),
                    compilation_options: Default::default(),
                    buffers: &[wgpu::VertexBufferLayout {
                        array_stride: VERTEX_STRIDE_BYTES,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &attributes,
                    }],
                },
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: None,
                    polygon_mode: wgpu::PolygonMode::Fill,
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DepthBuffer::FORMAT,
                    depth_write_enabled: true,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: Default::default(),
                    bias: Default::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                fragment: Some(wgpu::FragmentState {
                    module: &module,
                    entry_point: Some("fs_main"),
                    compilation_options: Default::default(),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: self.config.format,
                        blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                }),
                multiview: None,
                cache: None,
            });

        self.next_program += 1;
        let id = ProgramId(self.next_program);
        self.programs.insert(
            id,
            Program {
                pipeline,
                spec: *spec,
            },
        );
        debug!("created program {:?} as {id:?}", spec.name);
        Ok(ShaderProgramRef::new(id, spec.name))
    }

    pub fn delete_program(&mut self, program: ShaderProgramRef) {
        self.programs.remove(&program.id);
        self.uniform_state.remove(&program.id);
    }

    /// Starts recording a frame.
    pub fn begin_frame(&mut self) {
        self.draws.clear();
        self.current = None;
    }

    /// Replays the recorded draws in one pass and presents.
    pub fn end_frame(&mut self) -> Result<(), wgpu::SurfaceError> {
        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("meshview-encoder"),
            });

        let draws = std::mem::take(&mut self.draws);
        let bind_groups: Vec<wgpu::BindGroup> = draws
            .iter()
            .map(|draw| {
                let buffer = self
                    .device
                    .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                        label: Some("draw-uniform"),
                        contents: bytes_of(&draw.uniforms),
                        usage: wgpu::BufferUsages::UNIFORM,
                    });
                self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("draw-bind-group"),
                    layout: &self.uniform_layout,
                    entries: &[wgpu::BindGroupEntry {
                        binding: 0,
                        resource: buffer.as_entire_binding(),
                    }],
                })
            })
            .collect();

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("main-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &self.depth.view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mut bound: Option<ProgramId> = None;
            for (draw, bind_group) in draws.iter().zip(&bind_groups) {
                let Some(program) = self.programs.get(&draw.program) else {
                    continue;
                };
                if bound != Some(draw.program) {
                    pass.set_pipeline(&program.pipeline);
                    bound = Some(draw.program);
                }
                pass.set_bind_group(0, bind_group, &[]);
                if program.spec.samples_texture() {
                    let texture = draw.texture.as_ref().unwrap_or(&self.fallback_texture);
                    pass.set_bind_group(1, &texture.bind_group, &[]);
                }
                pass.set_vertex_buffer(0, draw.mesh.vertex.slice(..));
                pass.set_index_buffer(draw.mesh.index.slice(..), wgpu::IndexFormat::Uint32);
                pass.draw_indexed(0..draw.index_count, 0, 0..1);
            }
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }

    /// Re-applies the current size after a lost or outdated surface.
    pub fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}

impl GpuBackend for WgpuBackend {
    type Mesh = Arc<MeshBuffers>;
    type Texture = Arc<GpuTexture>;

    fn create_mesh(
        &mut self,
        label: &str,
        data: &CpuMeshData,
        _layout: &[VertexAttribute],
    ) -> Arc<MeshBuffers> {
        Arc::new(MeshBuffers::from_mesh(&self.device, data, label))
    }

    fn delete_mesh(&mut self, mesh: Arc<MeshBuffers>) {
        if let Ok(buffers) = Arc::try_unwrap(mesh) {
            buffers.vertex.destroy();
            buffers.index.destroy();
        }
    }

    fn create_texture(
        &mut self,
        label: &str,
        path: &Path,
        format: PixelFormat,
    ) -> Result<Arc<GpuTexture>> {
        let image = image::open(path)
            .with_context(|| format!("failed to decode texture {}", path.display()))?;
        let mut rgba = image.to_rgba8();
        if format == PixelFormat::Rgb {
            for pixel in rgba.pixels_mut() {
                pixel.0[3] = u8::MAX;
            }
        }
        let (width, height) = rgba.dimensions();
        debug!("decoded texture {label:?} ({width}x{height})");
        Ok(Arc::new(GpuTexture::from_rgba(
            &self.device,
            &self.queue,
            &self.texture_layout,
            &self.sampler,
            label,
            width,
            height,
            rgba.as_raw(),
        )))
    }

    fn delete_texture(&mut self, texture: Arc<GpuTexture>) {
        if self
            .bound_texture
            .as_ref()
            .is_some_and(|bound| Arc::ptr_eq(bound, &texture))
        {
            self.bound_texture = None;
        }
        if let Ok(texture) = Arc::try_unwrap(texture) {
            texture.texture.destroy();
        }
    }

    fn use_program(&mut self, program: ShaderProgramRef) {
        self.current = Some(program.id);
    }

    fn uniform_location(&self, program: ShaderProgramRef, name: &str) -> Option<UniformLocation> {
        let program = self.programs.get(&program.id)?;
        if program.spec.declares(name) {
            slot_of(name)
        } else {
            None
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(program) = self.current else {
            warn!("uniform set with no program in use");
            return;
        };
        self.uniform_state
            .entry(program)
            .or_default()
            .apply(location, value);
    }

    fn bind_texture(&mut self, unit: u32, texture: &Arc<GpuTexture>) {
        if unit != 0 {
            warn!("only texture unit 0 is supported, ignoring unit {unit}");
            return;
        }
        self.bound_texture = Some(Arc::clone(texture));
    }

    fn draw_indexed(&mut self, mesh: &Arc<MeshBuffers>, index_count: u32) {
        let Some(program) = self.current else {
            return;
        };
        let Some(index_count) =
            drawable_index_count(mesh.vertex_count, mesh.index_count, index_count)
        else {
            debug!("skipping draw of empty mesh");
            return;
        };
        let uniforms = self
            .uniform_state
            .get(&program)
            .copied()
            .unwrap_or_default();
        self.draws.push(RecordedDraw {
            program,
            uniforms,
            texture: self.bound_texture.clone(),
            mesh: Arc::clone(mesh),
            index_count,
        });
    }
}

/// Clamps a requested index count to the mesh, or `None` when nothing would
/// be drawn. Zero-sized buffers cannot be sliced, so empty meshes never reach
/// the render pass.
fn drawable_index_count(vertex_count: u32, index_count: u32, requested: u32) -> Option<u32> {
    let count = requested.min(index_count);
    (vertex_count > 0 && count > 0).then_some(count)
}

fn vertex_attributes(layout: &[VertexAttribute]) -> Result<Vec<wgpu::VertexAttribute>> {
    layout
        .iter()
        .map(|attribute| {
            let format = match attribute.components {
                2 => wgpu::VertexFormat::Float32x2,
                3 => wgpu::VertexFormat::Float32x3,
                4 => wgpu::VertexFormat::Float32x4,
                other => return Err(anyhow!("unsupported attribute width {other}")),
            };
            Ok(wgpu::VertexAttribute {
                format,
                offset: attribute.offset,
                shader_location: attribute.slot,
            })
        })
        .collect()
}

struct Program {
    pipeline: wgpu::RenderPipeline,
    spec: ProgramSpec,
}

struct RecordedDraw {
    program: ProgramId,
    uniforms: DrawUniforms,
    texture: Option<Arc<GpuTexture>>,
    mesh: Arc<MeshBuffers>,
    index_count: u32,
}

/// Uniform block shared by every program; field order matches the WGSL struct.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct DrawUniforms {
    cam_matrix: [[f32; 4]; 4],
    model: [[f32; 4]; 4],
    light_color: [f32; 4],
    light_pos: [f32; 4],
    cam_pos: [f32; 4],
}

impl Default for DrawUniforms {
    fn default() -> Self {
        Self {
            cam_matrix: glam::Mat4::IDENTITY.to_cols_array_2d(),
            model: glam::Mat4::IDENTITY.to_cols_array_2d(),
            light_color: [1.0; 4],
            light_pos: [0.0; 4],
            cam_pos: [0.0; 4],
        }
    }
}

impl DrawUniforms {
    fn apply(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(&name) = UNIFORM_SLOTS.get(location.0 as usize) else {
            return;
        };
        match (name, value) {
            (UNIFORM_CAMERA_MATRIX, UniformValue::Mat4(m)) => self.cam_matrix = m.to_cols_array_2d(),
            (UNIFORM_MODEL, UniformValue::Mat4(m)) => self.model = m.to_cols_array_2d(),
            (UNIFORM_LIGHT_COLOR, UniformValue::Vec4(c)) => self.light_color = c.into(),
            (UNIFORM_LIGHT_POSITION, UniformValue::Vec3(p)) => self.light_pos = p.extend(1.0).into(),
            (UNIFORM_CAMERA_POSITION, UniformValue::Vec3(p)) => self.cam_pos = p.extend(1.0).into(),
            // The sampler always reads unit 0.
            (_, UniformValue::Int(_)) => {}
            (name, value) => warn!("uniform {name} cannot hold {value:?}"),
        }
    }
}

pub struct MeshBuffers {
    vertex: wgpu::Buffer,
    index: wgpu::Buffer,
    vertex_count: u32,
    index_count: u32,
}

impl MeshBuffers {
    fn from_mesh(device: &wgpu::Device, mesh: &CpuMeshData, label: &str) -> Self {
        let vertex = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-vertices")),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(&format!("{label}-indices")),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        Self {
            vertex,
            index,
            vertex_count: mesh.vertices.len() as u32,
            index_count: mesh.indices.len() as u32,
        }
    }
}

pub struct GpuTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
}

impl GpuTexture {
    #[allow(clippy::too_many_arguments)]
    fn from_rgba(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        layout: &wgpu::BindGroupLayout,
        sampler: &wgpu::Sampler,
        label: &str,
        width: u32,
        height: u32,
        pixels: &[u8],
    ) -> Self {
        let size = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            pixels,
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        });
        Self {
            texture,
            bind_group,
        }
    }
}

struct DepthBuffer {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl DepthBuffer {
    const FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;

    fn create(device: &wgpu::Device, width: u32, height: u32) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth-texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: Self::FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}
