//! Benchmarks the frame graph's build → compile → execute path: the part
//! of a frame the application thread pays for every frame, independent of
//! how long the backend then takes to run it.

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use ember_driver::{NullDriver, PixelFormat, TextureUsage};
use ember_graph::{FrameGraph, RenderPassDescriptor, TextureResourceDesc};

fn linear_chain(pass_count: usize) -> FrameGraph {
    let mut fg = FrameGraph::new();
    let desc = TextureResourceDesc {
        width: 1920,
        height: 1080,
        depth_or_layers: 1,
        levels: 1,
        samples: 1,
        format: PixelFormat::Rgba8Unorm,
    };

    let mut previous = None;
    for i in 0..pass_count {
        let input = previous;
        let last = i == pass_count - 1;
        let produced = std::cell::Cell::new(None);
        fg.add_pass(&format!("pass_{i}"), |builder| {
            let output = builder.create_texture(&format!("tex_{i}"), desc);
            if let Some(input) = input {
                builder.sample(input);
            }
            let output = builder.write(output, TextureUsage::COLOR_ATTACHMENT);
            builder.declare_render_pass(
                &format!("pass_{i}"),
                RenderPassDescriptor {
                    color: [Some(output), None, None, None, None, None, None, None],
                    ..Default::default()
                },
            );
            if last {
                builder.side_effect();
            }
            produced.set(Some(output));
            move |_resources, _driver| {}
        });
        previous = produced.get();
    }
    fg
}

fn bench_compile_and_execute(c: &mut Criterion) {
    c.bench_function("frame_graph_16_passes_compile_execute", |b| {
        b.iter(|| {
            let mut fg = linear_chain(black_box(16));
            fg.compile();
            let mut driver = NullDriver::new();
            fg.execute(&mut driver);
        });
    });
}

criterion_group!(benches, bench_compile_and_execute);
criterion_main!(benches);
