use std::sync::Arc;

use bytemuck::bytes_of;
use log::info;
use thiserror::Error;
use winit::dpi::PhysicalSize;
use winit::window::{Window, WindowId};

use crate::render::scene::SceneUniforms;
use crate::render::vertex::{Vertex, VertexBatch};
use crate::render::Frame;

/// The drawing environment could not be set up.
#[derive(Debug, Error)]
pub enum RenderInitError {
    #[error("window has zero area")]
    ZeroArea,
    #[error("failed to create rendering surface: {0}")]
    Surface(#[from] wgpu::CreateSurfaceError),
    #[error("no compatible GPU adapter: {0}")]
    Adapter(#[from] wgpu::RequestAdapterError),
    #[error("failed to create GPU device: {0}")]
    Device(#[from] wgpu::RequestDeviceError),
    #[error("surface reports no supported texture format")]
    NoSurfaceFormat,
}

/// wgpu renderer with one shader module and two pipelines: a depth-tested 3D
/// pipeline and an overlay pipeline for the HUD pass.
pub struct Renderer {
    window: Arc<Window>,
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    depth: DepthBuffer,
    world_pipeline: wgpu::RenderPipeline,
    hud_pipeline: wgpu::RenderPipeline,
    world_uniforms: UniformSlot,
    hud_uniforms: UniformSlot,
    static_vertices: GrowableBuffer,
    static_revision: u64,
    dynamic_vertices: GrowableBuffer,
    hud_vertices: GrowableBuffer,
}

impl Renderer {
    /// Acquires a GPU device for `window` and builds both pipelines.
    pub async fn new(window: Arc<Window>) -> Result<Self, RenderInitError> {
        let size = window.inner_size();
        if size.width == 0 || size.height == 0 {
            return Err(RenderInitError::ZeroArea);
        }

        let backends = if cfg!(target_arch = "wasm32") {
            wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL
        } else {
            wgpu::Backends::PRIMARY
        };
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends,
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: Default::default(),
            backend_options: Default::default(),
        });
        let surface = instance.create_surface(Arc::clone(&window))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await?;
        let adapter_info = adapter.get_info();
        info!(
            "using {} ({:?}, {:?})",
            adapter_info.name, adapter_info.backend, adapter_info.device_type
        );

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("arena-device"),
                required_features: wgpu::Features::empty(),
                required_limits: if cfg!(target_arch = "wasm32") {
                    wgpu::Limits::downlevel_webgl2_defaults()
                } else {
                    wgpu::Limits::default()
                },
                experimental_features: Default::default(),
                memory_hints: Default::default(),
                trace: Default::default(),
            })
            .await?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|format| format.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or(RenderInitError::NoSurfaceFormat)?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width,
            height: size.height,
            present_mode: surface_caps
                .present_modes
                .iter()
                .copied()
                .find(|mode| *mode == wgpu::PresentMode::Mailbox)
                .unwrap_or(wgpu::PresentMode::Fifo),
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

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("arena-shader"),
            source: wgpu::ShaderSource::Wgsl(SHADER.into()),
        });

        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("uniform-bind-layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: wgpu::BufferSize::new(
                        std::mem::size_of::<SceneUniforms>() as u64,
                    ),
                },
                count: None,
            }],
        });
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("arena-pipeline-layout"),
            bind_group_layouts: &[&uniform_layout],
            push_constant_ranges: &[],
        });

        let world_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            Some(wgpu::DepthStencilState {
                format: DepthBuffer::FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: Default::default(),
                bias: Default::default(),
            }),
            "world-pipeline",
        );
        let hud_pipeline = create_pipeline(
            &device,
            &pipeline_layout,
            &shader,
            surface_format,
            None,
            "hud-pipeline",
        );

        let world_uniforms = UniformSlot::new(&device, &uniform_layout, "world-uniforms");
        let hud_uniforms = UniformSlot::new(&device, &uniform_layout, "hud-uniforms");

        Ok(Self {
            window,
            surface,
            device,
            queue,
            config,
            depth,
            world_pipeline,
            hud_pipeline,
            world_uniforms,
            hud_uniforms,
            static_vertices: GrowableBuffer::new("static-vertices"),
            static_revision: 0,
            dynamic_vertices: GrowableBuffer::new("dynamic-vertices"),
            hud_vertices: GrowableBuffer::new("hud-vertices"),
        })
    }

    pub fn window_id(&self) -> WindowId {
        self.window.id()
    }

    pub fn window(&self) -> &Window {
        &self.window
    }

    /// Resizes the swap chain to match the new dimensions.
    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);
        self.depth = DepthBuffer::create(&self.device, new_size.width, new_size.height);
    }

    /// Uploads the frame's batches and uniforms, then draws the 3D pass
    /// followed by the HUD pass.
    pub fn render(&mut self, frame: &Frame) -> Result<(), wgpu::SurfaceError> {
        if frame.static_revision() != self.static_revision {
            self.static_vertices
                .upload(&self.device, &self.queue, frame.static_geometry());
            self.static_revision = frame.static_revision();
        }
        self.dynamic_vertices
            .upload(&self.device, &self.queue, &frame.dynamic);
        self.hud_vertices.upload(&self.device, &self.queue, &frame.hud);
        self.queue.write_buffer(
            &self.world_uniforms.buffer,
            0,
            bytes_of(&frame.world_uniforms),
        );
        self.queue
            .write_buffer(&self.hud_uniforms.buffer, 0, bytes_of(&frame.hud_uniforms));

        let output = self.surface.get_current_texture()?;
        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("arena-encoder"),
            });

        {
            let clear = frame.clear_color;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("world-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: clear.x as f64,
                            g: clear.y as f64,
                            b: clear.z as f64,
                            a: 1.0,
                        }),
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
            pass.set_pipeline(&self.world_pipeline);
            pass.set_bind_group(0, &self.world_uniforms.bind_group, &[]);
            self.static_vertices.draw(&mut pass);
            self.dynamic_vertices.draw(&mut pass);
        }

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("hud-pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&self.hud_pipeline);
            pass.set_bind_group(0, &self.hud_uniforms.bind_group, &[]);
            self.hud_vertices.draw(&mut pass);
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        output.present();
        Ok(())
    }
}

fn create_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    depth_stencil: Option<wgpu::DepthStencilState>,
    label: &str,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[Vertex::layout()],
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            ..Default::default()
        },
        depth_stencil,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            compilation_options: Default::default(),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::ALPHA_BLENDING),
                write_mask: wgpu::ColorWrites::ALL,
            })],
        }),
        multiview: None,
        cache: None,
    })
}

struct UniformSlot {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

impl UniformSlot {
    fn new(device: &wgpu::Device, layout: &wgpu::BindGroupLayout, label: &str) -> Self {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(label),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Self { buffer, bind_group }
    }
}

/// Vertex buffer that is rewritten in place and only reallocated when a
/// batch outgrows it.
struct GrowableBuffer {
    label: &'static str,
    buffer: Option<wgpu::Buffer>,
    capacity: u64,
    vertex_count: u32,
}

impl GrowableBuffer {
    fn new(label: &'static str) -> Self {
        Self {
            label,
            buffer: None,
            capacity: 0,
            vertex_count: 0,
        }
    }

    fn upload(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, batch: &VertexBatch) {
        self.vertex_count = batch.len() as u32;
        if batch.is_empty() {
            return;
        }
        let bytes = batch.bytes();
        let needed = bytes.len() as u64;
        if self.buffer.is_none() || needed > self.capacity {
            self.capacity = grown_capacity(self.capacity, needed);
            self.buffer = Some(device.create_buffer(&wgpu::BufferDescriptor {
                label: Some(self.label),
                size: self.capacity,
                usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }));
        }
        if let Some(buffer) = &self.buffer {
            queue.write_buffer(buffer, 0, bytes);
        }
    }

    fn draw(&self, pass: &mut wgpu::RenderPass<'_>) {
        if self.vertex_count == 0 {
            return;
        }
        if let Some(buffer) = &self.buffer {
            pass.set_vertex_buffer(0, buffer.slice(..));
            pass.draw(0..self.vertex_count, 0..1);
        }
    }
}

/// Next buffer size able to hold `needed` bytes, rounded up to a power of two.
fn grown_capacity(current: u64, needed: u64) -> u64 {
    if needed <= current {
        return current;
    }
    needed
        .next_power_of_two()
        .max(std::mem::size_of::<Vertex>() as u64 * 64)
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

const SHADER: &str = r#"
struct Uniforms {
    projection: mat4x4<f32>,
    view: mat4x4<f32>,
    camera_position: vec4<f32>,
    fog: vec4<f32>,
    damage: vec4<f32>,
    flash: vec4<f32>,
    params: vec4<f32>,
    lights_position: array<vec4<f32>, 8>,
    lights_color: array<vec4<f32>, 8>,
}

@group(0) @binding(0)
var<uniform> u: Uniforms;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
    @location(3) material: f32,
}

struct VertexOutput {
    @builtin(position) clip: vec4<f32>,
    @location(0) world_pos: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) color: vec3<f32>,
    @location(3) material: f32,
}

@vertex
fn vs_main(input: VertexInput) -> VertexOutput {
    var out: VertexOutput;
    out.clip = u.projection * u.view * vec4<f32>(input.position, 1.0);
    out.world_pos = input.position;
    out.normal = input.normal;
    out.color = input.color;
    out.material = input.material;
    return out;
}

fn hash(seed: f32) -> f32 {
    return fract(sin(seed) * 43758.5453);
}

// Brightness multiplier of the procedural surface pattern.
fn pattern(material: f32, p: vec3<f32>, n: vec3<f32>) -> f32 {
    if material < 0.5 || material > 2.5 {
        return 1.0;
    }
    let a = abs(n);
    var uv = p.xz;
    if a.x > 0.5 {
        uv = p.zy;
    } else if a.z > 0.5 {
        uv = p.xy;
    }

    if material < 1.5 {
        let row = floor(uv.y * 4.0);
        let shifted = uv.x * 2.0 + row * 0.5;
        if fract(uv.y * 4.0) < 0.08 || fract(shifted) < 0.04 {
            return 0.55;
        }
        return 0.88 + 0.12 * hash(row * 12.9898 + floor(shifted) * 78.233);
    }

    let board = floor(uv.x * 3.0);
    if fract(uv.x * 3.0) < 0.05 {
        return 0.6;
    }
    return 0.85 + 0.12 * hash(board * 91.7) - 0.04 * sin(uv.y * 9.0 + board);
}

@fragment
fn fs_main(input: VertexOutput) -> @location(0) vec4<f32> {
    if u.params.y < 0.5 {
        return vec4<f32>(input.color, 1.0);
    }

    var color = input.color * pattern(input.material, input.world_pos, input.normal);
    if input.material < 2.5 {
        let n = normalize(input.normal);
        var light = vec3<f32>(u.params.z);
        let count = u32(u.params.x);
        for (var i = 0u; i < count; i = i + 1u) {
            let to_light = u.lights_position[i].xyz - input.world_pos;
            let dist = max(length(to_light), 0.0001);
            let radius = max(u.lights_position[i].w, 0.0001);
            let falloff = dist / radius;
            let attenuation = 1.0 / (1.0 + 4.0 * falloff * falloff);
            let diffuse = max(dot(n, to_light / dist), 0.0);
            light = light + u.lights_color[i].rgb * diffuse * attenuation;
        }
        color = color * light;
    }

    let distance_to_eye = distance(input.world_pos, u.camera_position.xyz);
    let fog_factor = clamp(1.0 - exp(-u.fog.w * distance_to_eye), 0.0, 1.0);
    color = mix(color, u.fog.rgb, fog_factor);
    color = color + u.damage.rgb * u.damage.w + u.flash.rgb * u.flash.w;
    return vec4<f32>(color, 1.0);
}
"#;
