use std::{fs, io, path};

use anyhow::Context as _;

fn main() -> anyhow::Result<()> {
    use std::io::Write as _;

    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Info)
        .init()?;

    let parsed = clap::Command::new(env!("CARGO_BIN_NAME"))
        .arg(
            clap::Arg::new("out")
                .long("out")
                .number_of_values(1)
                .required(true))
        .arg(
            clap::Arg::new("config")
                .long("config")
                .number_of_values(1))
        .arg(
            clap::Arg::new("eps")
                .long("eps")
                .number_of_values(1)
                .value_parser(clap::value_parser!(f32)))
        .get_matches();

    let out = parsed
        .get_one::<String>("out")
        .map(path::PathBuf::from)
        .ok_or(io::Error::from(io::ErrorKind::InvalidInput))?;

    let mut config = match parsed.get_one::<String>("config") {
        Some(path) => gem::Config::load(path)?,
        None => gem::Config::default(),
    };

    if let Some(eps) = parsed.get_one::<f32>("eps") {
        config.bvh.eps = *eps;
    }

    let mesh = config.assets.mesh.load()?;
    let bvh = gem::bvh::Bvh::build(&mesh, config.bvh)?;

    fs::File::create(&out)
        .with_context(|| format!("Failed to create {}", out.display()))?
        .write_all(serde_json::to_string(&bvh.data)?.as_bytes())?;

    log::info!(
        "Wrote {} nodes (depth {}) to {}",
        bvh.nodes(),
        bvh.depth(),
        out.display()
    );

    Ok(())
}
