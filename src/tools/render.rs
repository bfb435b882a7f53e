use std::path;

fn main() -> anyhow::Result<()> {
    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    let parsed = clap::Command::new(env!("CARGO_BIN_NAME"))
        .arg(
            clap::Arg::new("config")
                .long("config")
                .number_of_values(1))
        .arg(
            clap::Arg::new("out")
                .long("out")
                .number_of_values(1)
                .default_value("frame.png"))
        .arg(
            clap::Arg::new("width")
                .long("width")
                .number_of_values(1)
                .value_parser(clap::value_parser!(u32)))
        .arg(
            clap::Arg::new("height")
                .long("height")
                .number_of_values(1)
                .value_parser(clap::value_parser!(u32)))
        .arg(
            clap::Arg::new("gpu")
                .long("gpu")
                .action(clap::ArgAction::SetTrue))
        .get_matches();

    let config = match parsed.get_one::<String>("config") {
        Some(path) => gem::Config::load(path)?,
        None => gem::Config::default(),
    };

    let out = parsed
        .get_one::<String>("out")
        .map(path::PathBuf::from)
        .unwrap_or_else(|| path::PathBuf::from("frame.png"));

    let mut view = config.view();

    let [width, height] = view.params.resolution;
    view.params.resize(
        parsed.get_one::<u32>("width").copied().unwrap_or(width),
        parsed.get_one::<u32>("height").copied().unwrap_or(height),
    );

    let scene = config.scene()?;

    let gpu = parsed
        .get_one::<bool>("gpu")
        .copied()
        .unwrap_or(false);

    let frame = if gpu {
        let mut state = pollster::block_on({
            gem::state::State::new(&scene, &view)
        })?;

        state.render(&view)?
    } else {
        gem::render::CpuRenderer::render(&scene, &view)?
    };

    frame.save(out)
}
