use clap::Parser;
use log::info;

use gl_wrapper::api::BufferUsage;
use gl_wrapper::frame_loop::{self, LoopContext};
use gl_wrapper::geometry::{GeometryBuilder, VertexAttribute};
use gl_wrapper::program::{GlslVersion, ProgramBuilder};
use gl_wrapper::renderer::GlRenderer;
use gl_wrapper::{QUAD, QUAD_INDICES};

use cubeland::args::Args;
use cubeland::assets::{QUAD_FRAGMENT_SHADER, QUAD_VERTEX_SHADER};
use cubeland::error::AppError;
use cubeland::window::GlPlatform;

fn main() {
    env_logger::init();

    let args = <Args as Parser>::parse();

    if let Err(e) = run(&args) {
        println!("{e}");
        std::process::exit(-1);
    }
}

fn run(args: &Args) -> Result<(), AppError> {
    let mut platform = GlPlatform::new(&args.window_settings(0))?;
    let gl = platform.load_gl()?;

    let renderer = GlRenderer::new(&gl);
    let (width, height) = platform.framebuffer_size();
    renderer.resize(width, height);

    let program = ProgramBuilder::new(QUAD_VERTEX_SHADER, QUAD_FRAGMENT_SHADER)
        .with_version(GlslVersion::CORE_330)
        .build(&gl)?;

    let quad = GeometryBuilder::new(&QUAD)
        .with_attribute(VertexAttribute::Vec3)
        .with_indices(&QUAD_INDICES)
        .with_usage(BufferUsage::Dynamic)
        .build(&gl)?;

    let mut ctx = LoopContext::new();

    let frames = frame_loop::run(&mut platform, &mut ctx, || {
        renderer.clear_color(0.2, 0.3, 0.3);
        renderer.draw(&quad, &program)?;
        Ok(())
    })?;

    info!("Closing after {frames} frames");

    Ok(())
}
