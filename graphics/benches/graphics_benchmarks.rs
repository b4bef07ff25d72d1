use criterion::{Criterion, black_box, criterion_group, criterion_main};

use ember_graphics::{
    DummyDevice, FrameGraph, LoadOp, NoExecution, PoolConfig, ReadAccess, RenderDevice,
    ResourcePool, ResourceState, TextureDescriptor, TextureFormat, TextureUsage,
};

fn color(width: u32, height: u32) -> TextureDescriptor {
    TextureDescriptor::new_2d(
        width,
        height,
        TextureFormat::Rgba16Float,
        TextureUsage::RENDER_ATTACHMENT | TextureUsage::TEXTURE_BINDING,
    )
}

/// A chain of `len` passes, each sampling the previous target, ending in the
/// backbuffer. Every odd pass also writes an unread debug target.
fn chain_graph(graph: &mut FrameGraph<'_>, len: usize) {
    for i in 0..len {
        let input = (i > 0).then(|| format!("Target{}", i - 1));
        let output = format!("Target{i}");
        let debug = (i % 2 == 1).then(|| format!("Debug{i}"));
        graph
            .add_graphics_pass(format!("pass_{i}"), move |builder| {
                if let Some(input) = &input {
                    builder.read_texture(input.as_str(), ReadAccess::PixelShader)?;
                }
                builder.create_texture(output.as_str(), color(256, 256))?;
                builder.write_render_target(output.as_str(), LoadOp::DontCare)?;
                if let Some(debug) = &debug {
                    builder.create_texture(debug.as_str(), color(256, 256))?;
                    builder.write_render_target(debug.as_str(), LoadOp::DontCare)?;
                }
                Ok(NoExecution)
            })
            .ok();
    }

    let last = format!("Target{}", len - 1);
    graph
        .add_graphics_pass("present", move |builder| {
            builder.read_texture(last.as_str(), ReadAccess::PixelShader)?;
            builder.write_render_target("Backbuffer", LoadOp::DontCare)?;
            Ok(NoExecution)
        })
        .ok();
}

// ---------------------------------------------------------------------------
// Frame graph build
// ---------------------------------------------------------------------------

fn bench_build(c: &mut Criterion) {
    let mut device = DummyDevice::new();
    let desc = color(1920, 1080);
    let backbuffer = device
        .create_texture(&desc, ResourceState::PRESENT)
        .ok();

    for len in [4usize, 32] {
        c.bench_function(&format!("frame_graph_build_{len}_passes"), |b| {
            b.iter(|| {
                let mut graph = FrameGraph::new();
                if let Some(texture) = backbuffer {
                    let _ = graph.import_texture(
                        "Backbuffer",
                        texture,
                        desc.clone(),
                        ResourceState::PRESENT,
                    );
                }
                chain_graph(&mut graph, len);
                let _ = black_box(graph.build().map(|compiled| compiled.pass_count()));
            });
        });
    }
}

// ---------------------------------------------------------------------------
// Frame graph execution
// ---------------------------------------------------------------------------

fn bench_execute(c: &mut Criterion) {
    let mut device = DummyDevice::new();
    let mut pool = ResourcePool::new(PoolConfig::default());
    let desc = color(1920, 1080);
    let backbuffer = device
        .create_texture(&desc, ResourceState::PRESENT)
        .ok();

    c.bench_function("frame_graph_execute_32_passes", |b| {
        b.iter(|| {
            device.clear_commands();
            pool.begin_frame(&mut device);
            let mut graph = FrameGraph::new();
            if let Some(texture) = backbuffer {
                let _ = graph.import_texture(
                    "Backbuffer",
                    texture,
                    desc.clone(),
                    ResourceState::PRESENT,
                );
            }
            chain_graph(&mut graph, 32);
            let _ = graph.build();
            let _ = black_box(graph.execute(&mut device, &mut pool));
        });
    });

    pool.clear(&mut device);
}

criterion_group!(benches, bench_build, bench_execute);
criterion_main!(benches);
