mod package;

use std::sync::mpsc;

use wgpu::util::DeviceExt as _;

use crate::{params, render, scene, shaders};

// Runs the compute kernel on a headless device.
// Geometry, BVH and environment are uploaded once;
// only the uniform (and the frame, on resize) change afterwards
pub struct State {
    // WGPU interface
    device: wgpu::Device,
    queue: wgpu::Queue,

    // Scene buffers, fixed for the lifetime of the State
    gem_buffer: wgpu::Buffer,
    vertices: wgpu::Buffer,
    prims: wgpu::Buffer,
    aabb_uniforms: wgpu::Buffer,
    aabb_indices: wgpu::Buffer,

    // Environment
    #[allow(dead_code)]
    env_texture: wgpu::Texture,
    env_view: wgpu::TextureView,
    env_sampler: wgpu::Sampler,
    env_size: [u32; 2],

    layout: wgpu::BindGroupLayout,
    pipeline: wgpu::ComputePipeline,

    // Output texture, sized to the last resolution rendered
    package: package::FramePackage,
}

impl State {
    pub async fn new(scene: &scene::Scene, view: &render::View) -> anyhow::Result<Self> {
        // The kernel reads both; uploading half a scene would render garbage
        let Some((env, gem)) = scene.active() else {
            anyhow::bail!("Unable to upload a scene that has not finished loading");
        };

        let backends = wgpu::util::backend_bits_from_env()
            .unwrap_or(wgpu::Backends::all());

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends, ..Default::default()
        });

        let adapter = instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::default(),
            compatible_surface: None,
            force_fallback_adapter: false,
        }).await.ok_or_else(|| anyhow::anyhow!("No compatible GPU adapter"))?;

        log::info!("Using adapter {:?}", adapter.get_info());

        let device_desc = wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
        };

        let (device, queue) = adapter
            .request_device(&device_desc, None)
            .await?;

        let scene::Gem { mesh, bvh } = gem;

        let storage = |contents: &[u8]| device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: None,
                contents,
                usage: wgpu::BufferUsages::STORAGE,
            }
        );

        let vertices = storage(bytemuck::cast_slice(&mesh.vertices));
        let prims = storage(bytemuck::cast_slice(&mesh.prims));
        let aabb_uniforms = storage(bytemuck::cast_slice(&bvh.data.uniforms));
        let aabb_indices = storage(bytemuck::cast_slice(&bvh.data.indices));

        let env_size = [env.width, env.height];

        let uniform = params::GemUniform::new(
            &view.params,
            &view.camera,
            &view.transform,
            &view.output,
            env_size,
        );

        // Rewritten every frame
        let gem_buffer = device.create_buffer_init(
            &wgpu::util::BufferInitDescriptor {
                label: Some("gem uniform"),
                contents: bytemuck::cast_slice(&[uniform]),
                usage: wgpu::BufferUsages::UNIFORM
                     | wgpu::BufferUsages::COPY_DST,
            }
        );

        let extent = wgpu::Extent3d {
            width: env.width,
            height: env.height,
            depth_or_array_layers: 1,
        };

        let env_texture = device.create_texture(
            &wgpu::TextureDescriptor {
                label: Some("environment"),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba16Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING
                     | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            }
        );

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &env_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&env.rgba16f()),
            wgpu::ImageDataLayout {
                offset: 0,
                // Four f16 channels
                bytes_per_row: Some(env.width * 8),
                rows_per_image: Some(env.height),
            },
            extent,
        );

        let env_view = env_texture.create_view(&wgpu::TextureViewDescriptor::default());

        // Equirectangular maps wrap around the horizon but not over the poles
        let env_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: None,
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let shader = device.create_shader_module(
            wgpu::ShaderModuleDescriptor {
                label: Some("gem.wgsl"),
                source: shaders::source(&bvh.data, bvh.eps)?,
            },
        );

        let layout = package::FramePackage::layout(&device);

        let pipeline_layout = device.create_pipeline_layout(
            &wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts: &[&layout],
                push_constant_ranges: &[],
            }
        );

        let pipeline = device.create_compute_pipeline(
            &wgpu::ComputePipelineDescriptor {
                label: None,
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: "main_cs",
            }
        );

        let package = package::FramePackage::new(
            &device,
            &layout,
            &package::Resources {
                gem: &gem_buffer,
                vertices: &vertices,
                prims: &prims,
                aabb_uniforms: &aabb_uniforms,
                aabb_indices: &aabb_indices,
                env_view: &env_view,
                env_sampler: &env_sampler,
            },
            view.params.sanitized().resolution,
        );

        Ok(Self {
            device,
            queue,

            gem_buffer,
            vertices,
            prims,
            aabb_uniforms,
            aabb_indices,

            env_texture,
            env_view,
            env_sampler,
            env_size,

            layout,
            pipeline,

            package,
        })
    }

    // Writes the per-frame uniform, rebuilding the frame texture
    // when the resolution has changed since the last call
    pub fn update(&mut self, view: &render::View) {
        let resolution = view.params.sanitized().resolution;

        if resolution != self.package.size {
            log::info!("Resizing frame to {}x{}", resolution[0], resolution[1]);

            let Self {
                device,
                gem_buffer,
                vertices,
                prims,
                aabb_uniforms,
                aabb_indices,
                env_view,
                env_sampler,
                layout, ..
            } = self;

            self.package = package::FramePackage::new(
                device,
                layout,
                &package::Resources {
                    gem: gem_buffer,
                    vertices,
                    prims,
                    aabb_uniforms,
                    aabb_indices,
                    env_view,
                    env_sampler,
                },
                resolution,
            );
        }

        let uniform = params::GemUniform::new(
            &view.params,
            &view.camera,
            &view.transform,
            &view.output,
            self.env_size,
        );

        self.queue.write_buffer(&self.gem_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    pub fn render(&mut self, view: &render::View) -> anyhow::Result<render::Frame> {
        self.update(view);

        let package::FramePackage {
            texture,
            readback,
            group,
            size: [width, height],
            padded_row,
        } = &self.package;

        let mut encoder = self.device.create_command_encoder({
            &wgpu::CommandEncoderDescriptor::default()
        });

        {
            let mut compute_pass = encoder.begin_compute_pass(
                &wgpu::ComputePassDescriptor {
                    label: None,
                    timestamp_writes: None,
                }
            );

            compute_pass.set_pipeline(&self.pipeline);
            compute_pass.set_bind_group(0, group, &[]);

            compute_pass.dispatch_workgroups(
                width.div_ceil(shaders::WORKGROUP),
                height.div_ceil(shaders::WORKGROUP),
                1
            );
        }

        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: readback,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(*padded_row),
                    rows_per_image: Some(*height),
                },
            },
            wgpu::Extent3d {
                width: *width,
                height: *height,
                depth_or_array_layers: 1,
            },
        );

        self.queue.submit(Some(encoder.finish()));

        let slice = readback.slice(..);

        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        // Blocks until the dispatch and copy are done
        self.device.poll(wgpu::Maintain::Wait);

        rx.recv()??;

        let bytes = {
            let padded = slice.get_mapped_range();

            self.package.unpad(&padded)
        };

        readback.unmap();

        Ok(render::Frame::from_rgba8(*width, *height, &bytes))
    }
}
