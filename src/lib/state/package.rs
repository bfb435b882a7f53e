// Buffers and views that outlive any one output resolution
pub struct Resources<'a> {
    pub gem: &'a wgpu::Buffer,
    pub vertices: &'a wgpu::Buffer,
    pub prims: &'a wgpu::Buffer,
    pub aabb_uniforms: &'a wgpu::Buffer,
    pub aabb_indices: &'a wgpu::Buffer,
    pub env_view: &'a wgpu::TextureView,
    pub env_sampler: &'a wgpu::Sampler,
}

// The output texture, its readback buffer and the bind group
// that references them. Rebuilt whenever the resolution changes
pub struct FramePackage {
    pub texture: wgpu::Texture,
    pub readback: wgpu::Buffer,
    pub group: wgpu::BindGroup,
    pub size: [u32; 2],
    // Rows are padded to `COPY_BYTES_PER_ROW_ALIGNMENT` in `readback`
    pub padded_row: u32,
}

impl FramePackage {
    pub const TEXTURE_FORMAT: wgpu::TextureFormat = //
        wgpu::TextureFormat::Rgba8Unorm;

    pub fn new(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        resources: &Resources<'_>,
        [width, height]: [u32; 2],
    ) -> Self {
        let texture = device.create_texture(
            &wgpu::TextureDescriptor {
                label: Some("frame"),
                size: wgpu::Extent3d {
                    width,
                    height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: Self::TEXTURE_FORMAT,
                usage: wgpu::TextureUsages::STORAGE_BINDING
                     | wgpu::TextureUsages::COPY_SRC,
                view_formats: &[],
            }
        );

        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = (width * 4).div_ceil(align) * align;

        let readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("frame readback"),
            size: padded_row as u64 * height as u64,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let Resources {
            gem,
            vertices,
            prims,
            aabb_uniforms,
            aabb_indices,
            env_view,
            env_sampler,
        } = resources;

        let group = device.create_bind_group(
            &wgpu::BindGroupDescriptor {
                label: None,
                layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: gem.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: vertices.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: prims.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 3,
                        resource: aabb_uniforms.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 4,
                        resource: aabb_indices.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 5,
                        resource: wgpu::BindingResource::TextureView(*env_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 6,
                        resource: wgpu::BindingResource::Sampler(*env_sampler),
                    },
                    wgpu::BindGroupEntry {
                        binding: 7,
                        resource: wgpu::BindingResource::TextureView(&view),
                    },
                ],
            }
        );

        Self {
            texture,
            readback,
            group,
            size: [width, height],
            padded_row,
        }
    }

    // Matches the bindings declared at the top of gem.wgsl
    pub fn layout(device: &wgpu::Device) -> wgpu::BindGroupLayout {
        let storage = |binding: u32| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            count: None,
            ty: wgpu::BindingType::Buffer {
                has_dynamic_offset: false,
                min_binding_size: None,
                ty: wgpu::BufferBindingType::Storage {
                    read_only: true
                },
            },
        };

        device.create_bind_group_layout(
            &wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries: &[
                    wgpu::BindGroupLayoutEntry {
                        binding: 0,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        count: None,
                        ty: wgpu::BindingType::Buffer {
                            has_dynamic_offset: false,
                            min_binding_size: None,
                            ty: wgpu::BufferBindingType::Uniform,
                        },
                    },
                    storage(1),
                    storage(2),
                    storage(3),
                    storage(4),
                    wgpu::BindGroupLayoutEntry {
                        binding: 5,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        count: None,
                        ty: wgpu::BindingType::Texture {
                            sample_type: wgpu::TextureSampleType::Float {
                                filterable: true
                            },
                            view_dimension: wgpu::TextureViewDimension::D2,
                            multisampled: false,
                        },
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 6,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        count: None,
                        ty: wgpu::BindingType::Sampler(
                            wgpu::SamplerBindingType::Filtering
                        ),
                    },
                    wgpu::BindGroupLayoutEntry {
                        binding: 7,
                        visibility: wgpu::ShaderStages::COMPUTE,
                        count: None,
                        ty: wgpu::BindingType::StorageTexture {
                            access: wgpu::StorageTextureAccess::WriteOnly,
                            format: Self::TEXTURE_FORMAT,
                            view_dimension: wgpu::TextureViewDimension::D2,
                        },
                    },
                ],
            }
        )
    }

    // Copies tightly packed RGBA rows out of the padded readback buffer
    pub fn unpad(&self, padded: &[u8]) -> Vec<u8> {
        let [width, height] = self.size;

        unpad_rows(padded, width, height, self.padded_row)
    }
}

pub fn unpad_rows(padded: &[u8], width: u32, height: u32, padded_row: u32) -> Vec<u8> {
    let row = (width * 4) as usize;

    padded
        .chunks(padded_row as usize)
        .take(height as usize)
        .flat_map(|chunk| &chunk[..row.min(chunk.len())])
        .copied()
        .collect()
}
