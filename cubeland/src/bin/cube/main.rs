use clap::Parser;
use log::info;

use gl_wrapper::api::DepthFunc;
use gl_wrapper::frame_loop::{self, LoopContext};
use gl_wrapper::geometry::{GeometryBuilder, VertexAttribute};
use gl_wrapper::program::{GlslVersion, ProgramBuilder};
use gl_wrapper::renderer::GlRenderer;

use cubeland::args::Args;
use cubeland::assets::{CUBE, CUBE_FRAGMENT_SHADER, CUBE_VERTEX_SHADER};
use cubeland::error::AppError;
use cubeland::window::GlPlatform;

const DEPTH_BITS: u8 = 24;

fn main() {
    env_logger::init();

    let args = <Args as Parser>::parse();

    if let Err(e) = run(&args) {
        println!("{e}");
        std::process::exit(-1);
    }
}

fn run(args: &Args) -> Result<(), AppError> {
    let mut platform = GlPlatform::new(&args.window_settings(DEPTH_BITS))?;
    let gl = platform.load_gl()?;

    let renderer = GlRenderer::new(&gl);
    let (width, height) = platform.framebuffer_size();
    renderer.resize(width, height);
    renderer.enable_depth_test(DepthFunc::Less);

    let program = ProgramBuilder::new(CUBE_VERTEX_SHADER, CUBE_FRAGMENT_SHADER)
        .with_version(GlslVersion::CORE_330)
        .build(&gl)?;

    let cube = GeometryBuilder::new(&CUBE)
        .with_attribute(VertexAttribute::Vec3)
        .with_attribute(VertexAttribute::Vec2)
        .build(&gl)?;

    let mut ctx = LoopContext::new();

    let frames = frame_loop::run(&mut platform, &mut ctx, || {
        renderer.clear_color_depth(0.2, 0.3, 0.3);
        renderer.draw(&cube, &program)?;
        Ok(())
    })?;

    info!("Closing after {frames} frames");

    Ok(())
}
