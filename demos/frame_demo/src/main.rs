//! End-to-end demo: builds a two-pass frame graph (an offscreen "scene"
//! pass feeding a "present" pass that samples it), compiles it, and runs
//! it through `Engine` against the null backend.

use ember_core::config::Backend;
use ember_driver::{PixelFormat, TextureUsage};
use ember_engine::Engine;
use ember_graph::{FrameGraph, RenderPassDescriptor, TextureResourceDesc};

fn main() {
    ember_engine::init_default_logging();

    let mut engine = Engine::builder()
        .with_backend(Backend::Null)
        .with_threaded(false)
        .build()
        .expect("the null backend always builds");

    let mut frame_graph = FrameGraph::new();

    let scene_color = std::cell::Cell::new(None);
    frame_graph.add_pass("scene", |builder| {
        let color = builder.create_texture(
            "scene_color",
            TextureResourceDesc {
                width: 1920,
                height: 1080,
                depth_or_layers: 1,
                levels: 1,
                samples: 1,
                format: PixelFormat::Rgba8Unorm,
            },
        );
        let color = builder.write(color, TextureUsage::COLOR_ATTACHMENT);
        builder.declare_render_pass(
            "scene",
            RenderPassDescriptor {
                color: [Some(color), None, None, None, None, None, None, None],
                ..Default::default()
            },
        );
        scene_color.set(Some(color));
        move |_resources, _driver| {
            log::info!("scene pass: drawing into scene_color");
        }
    });

    let color = scene_color.get().expect("scene pass just recorded it");
    frame_graph.add_pass("present", move |builder| {
        builder.sample(color);
        builder.side_effect();
        move |resources, _driver| {
            let handle = resources.texture(color);
            log::info!("present pass: sampling scene_color as raw handle {}", handle.raw());
        }
    });

    frame_graph.compile();
    engine.execute_frame_graph(frame_graph);
    engine.flush_and_wait(0);
    engine.shutdown();
}
