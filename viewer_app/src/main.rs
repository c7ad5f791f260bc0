//! Minimal viewer: a flat-colored unit cube under the default lighting.

use render_engine::foundation::logging;
use render_engine::foundation::math::{Point3, Vec3};
use render_engine::{
    CameraPose, Engine, EngineConfig, MaterialData, MeshData, SceneData, Vertex,
};

fn cube_mesh() -> MeshData {
    // Six faces, four vertices each, with per-face normals.
    let faces: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
        // (normal, tangent u, tangent v), face center = normal * 0.5
        ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
        ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
        ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
        ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
    ];

    let mut vertices = Vec::with_capacity(24);
    let mut indices = Vec::with_capacity(36);
    for (normal, u, v) in faces {
        let base = vertices.len() as u32;
        for (su, sv, tex) in [
            (-0.5f32, -0.5f32, [0.0f32, 1.0f32]),
            (0.5, -0.5, [1.0, 1.0]),
            (0.5, 0.5, [1.0, 0.0]),
            (-0.5, 0.5, [0.0, 0.0]),
        ] {
            let position = [
                normal[0] * 0.5 + u[0] * su + v[0] * sv,
                normal[1] * 0.5 + u[1] * su + v[1] * sv,
                normal[2] * 0.5 + u[2] * su + v[2] * sv,
            ];
            vertices.push(Vertex {
                position,
                normal,
                tex_coord: tex,
            });
        }
        indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 3, base]);
    }

    MeshData {
        vertices,
        indices,
        material_index: 0,
    }
}

fn cube_scene() -> SceneData {
    SceneData {
        meshes: vec![cube_mesh()],
        materials: vec![MaterialData::flat_color([0.8, 0.3, 0.2, 1.0])],
        nodes: Vec::new(),
    }
}

fn run() -> Result<(), render_engine::EngineError> {
    let config = match std::env::args().nth(1) {
        Some(path) => EngineConfig::from_file(&path)
            .map_err(|e| render_engine::EngineError::Config(e.to_string()))?,
        None => EngineConfig::default(),
    }
    .with_title("Cube Viewer");

    let mut engine = Engine::new(config, &cube_scene())?;
    engine.renderer_mut().set_camera(CameraPose {
        eye: Point3::new(2.2, 1.8, 2.2),
        target: Point3::new(0.0, 0.0, 0.0),
        up: Vec3::new(0.0, 1.0, 0.0),
        ..CameraPose::default()
    });
    engine.run()
}

fn main() {
    logging::init();
    if let Err(e) = run() {
        log::error!("{e}");
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
