use std::time;

use gem::bvh;

#[derive(clap::Parser)]
#[derive(Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    // JSON config naming the mesh, defaults to the procedural brilliant
    #[clap(long, value_parser)]
    config: Option<String>,

    // Builds with every split strategy instead of the configured one
    #[clap(long, action)]
    compare: bool,

    // Prints every node of the flattened tree
    #[clap(long, action)]
    nodes: bool,
}

fn main() -> anyhow::Result<()> {
    use clap::Parser as _;

    simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init()?;

    let Args { config, compare, nodes } = Args::parse();

    let config = match config {
        Some(path) => gem::Config::load(path)?,
        None => gem::Config::default(),
    };

    let mesh = config.assets.mesh.load()?;

    let strategies = if compare {
        vec![
            bvh::SplitStrategy::Center,
            bvh::SplitStrategy::Average,
            bvh::SplitStrategy::Sah,
        ]
    } else {
        vec![config.bvh.strategy]
    };

    println!("{} triangles, {} vertices", mesh.len(), mesh.vertices.len());

    for strategy in strategies {
        let start = time::Instant::now();

        let bvh = bvh::Bvh::build(&mesh, bvh::BvhConfig {
            strategy,
            ..config.bvh
        })?;

        let elapsed = start.elapsed();

        let leaves = bvh.data.uniforms
            .iter()
            .filter(|node| node.is_leaf())
            .collect::<Vec<_>>();

        let largest = leaves
            .iter()
            .map(|leaf| leaf.item_count)
            .max()
            .unwrap_or(0);

        println!(
            "{strategy:?}: {} nodes, {} leaves (largest {largest}), depth {}, stack {}, built in {elapsed:.2?}",
            bvh.nodes(),
            leaves.len(),
            bvh.depth(),
            bvh.data.stack_size(),
        );

        if nodes {
            for (idx, node) in bvh.data.uniforms.iter().enumerate() {
                println!("  {idx:>5} {node:?}");
            }
        }
    }

    Ok(())
}
