// Renders the procedural brilliant under the gradient sky.
// Needs no assets and no GPU
fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    let config = gem::Config::default();

    let scene = config.scene()?;

    let frame = gem::render::CpuRenderer::render(&scene, &config.view())?;

    frame.save("demo.png")
}
