use std::{fs, path};

use gem::{bvh, mesh, render, scene};

// A unit cube as OBJ text, one vertex per corner of every triangle
fn cube_obj() -> String {
    let cube = mesh::Mesh::cube(1.);

    let mut obj = String::new();

    for prim in 0..cube.len() {
        for [x, y, z] in cube.triangle(prim) {
            obj.push_str(&format!("v {x} {y} {z}\n"));
        }
    }

    for prim in 0..cube.len() {
        let base = prim * 3 + 1;

        obj.push_str(&format!("f {} {} {}\n", base, base + 1, base + 2));
    }

    obj
}

fn write_assets(dir: &path::Path) {
    fs::write(dir.join("stone.obj"), cube_obj()).unwrap();

    image::RgbImage::from_pixel(16, 8, image::Rgb([90, 140, 220]))
        .save(dir.join("sky.png"))
        .unwrap();
}

#[test]
fn config_loads_relative_assets() {
    let dir = tempfile::tempdir().unwrap();

    write_assets(dir.path());

    fs::write(dir.path().join("config.json"), r#"{
        "params": { "resolution": [16, 12] },
        "assets": {
            "mesh": { "Obj": "stone.obj" },
            "environment": { "Image": "sky.png" }
        }
    }"#).unwrap();

    let config = gem::Config::load(dir.path().join("config.json")).unwrap();

    let scene = config.scene().unwrap();

    let Some((env, gem)) = scene.active() else {
        panic!("scene did not activate");
    };

    assert_eq!((env.width, env.height), (16, 8));
    assert_eq!(gem.mesh.len(), 12);

    let view = config.view();
    let frame = render::CpuRenderer::render(&scene, &view).unwrap();

    assert_eq!((frame.width, frame.height), (16, 12));

    // The default camera looks straight at the cube
    assert_ne!(frame.get(8, 6), view.output.background());
    assert_eq!(frame.get(0, 0), view.output.background());
}

#[test]
fn precomputed_bvh_is_used() {
    let dir = tempfile::tempdir().unwrap();

    write_assets(dir.path());

    let mesh = mesh::Mesh::load(dir.path().join("stone.obj")).unwrap();
    let built = bvh::Bvh::build(&mesh, bvh::BvhConfig::new()).unwrap();

    fs::write(
        dir.path().join("stone.json"),
        serde_json::to_string(&built.data).unwrap(),
    ).unwrap();

    let assets = scene::Assets {
        mesh: scene::MeshSource::Obj("stone.obj".into()),
        environment: scene::EnvSource::Image("sky.png".into()),
        bvh: Some("stone.json".into()),
    };

    let mut config = gem::Config {
        assets,
        ..gem::Config::new()
    };

    config.assets.resolve(dir.path());

    let scene = config.scene().unwrap();
    let (_, gem) = scene.active().unwrap();

    assert_eq!(gem.bvh.nodes(), built.nodes());
    assert_eq!(gem.bvh.depth(), built.depth());
    assert_eq!(gem.bvh.data.indices, built.data.indices);
}

#[test]
fn bvh_for_another_mesh_fails_the_load() {
    let dir = tempfile::tempdir().unwrap();

    write_assets(dir.path());

    let other = mesh::Mesh::brilliant(mesh::BrilliantCut::new());
    let built = bvh::Bvh::build(&other, bvh::BvhConfig::new()).unwrap();

    fs::write(
        dir.path().join("other.json"),
        serde_json::to_string(&built.data).unwrap(),
    ).unwrap();

    let mut assets = scene::Assets {
        mesh: scene::MeshSource::Obj("stone.obj".into()),
        environment: scene::EnvSource::Uniform([1.; 3]),
        bvh: Some("other.json".into()),
    };

    assets.resolve(dir.path());

    assert!(scene::Scene::load(&assets, bvh::BvhConfig::new()).is_err());
}

#[test]
fn missing_environment_names_the_file() {
    let dir = tempfile::tempdir().unwrap();

    let mut assets = scene::Assets {
        environment: scene::EnvSource::Image("missing.hdr".into()),
        ..scene::Assets::new()
    };

    assets.resolve(dir.path());

    let err = scene::Scene::load(&assets, bvh::BvhConfig::new()).unwrap_err();

    assert!(format!("{err:#}").contains("missing.hdr"));
}
