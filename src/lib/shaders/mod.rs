use std::borrow;

use crate::{bvh, params};

// Threads per workgroup along each axis of the output texture
pub const WORKGROUP: u32 = 8;

const PLACEHOLDERS: [&str; 5] = [
    "<RAY_OFFSET>",
    "<T_MIN>",
    "<EPS>",
    "<STACK>",
    "<MAX_BOUNCES>",
];

// The kernel's WGSL with constants baked in.
// The traversal stack is sized from the tree's depth
pub fn wgsl(data: &bvh::BvhData, eps: f32) -> anyhow::Result<String> {
    let source: &'static str = include_str!("gem.wgsl");

    let source = source
        .replace("<RAY_OFFSET>", &format!("{:?}", params::RAY_OFFSET))
        .replace("<T_MIN>", &format!("{:?}", bvh::T_MIN))
        .replace("<EPS>", &format!("{:?}", eps.max(0.)))
        .replace("<STACK>", &format!("{}", data.stack_size()))
        .replace("<MAX_BOUNCES>", &format!("{}", params::MAX_BOUNCES))
        .replace(
            "@workgroup_size(8, 8, 1)",
            &format!("@workgroup_size({WORKGROUP}, {WORKGROUP}, 1)"),
        );

    if let Some(missing) = PLACEHOLDERS.iter().find(|p| source.contains(*p)) {
        anyhow::bail!("Shader constant {missing} was never substituted");
    }

    Ok(source)
}

pub fn source(
    data: &bvh::BvhData,
    eps: f32,
) -> anyhow::Result<wgpu::ShaderSource<'static>> {
    let source = wgsl(data, eps)?;

    Ok(wgpu::ShaderSource::Wgsl(borrow::Cow::Owned(source)))
}
