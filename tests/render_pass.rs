use std::io::Write;

use glam::{Mat4, Vec3, Vec4};
use meshview::render::programs::{DEFAULT_PROGRAM, OBJECT_PROGRAM};
use meshview::{
    load_obj, CameraParams, FrameContext, HeadlessBackend, LightParams, Motion, SceneObject,
    SceneRegistry, ShapeType, UniformValue,
};
use tempfile::NamedTempFile;

fn registry_with_programs() -> (HeadlessBackend, SceneRegistry<HeadlessBackend>) {
    let mut gpu = HeadlessBackend::new();
    let mut registry = SceneRegistry::new();
    let default = gpu.register_program(&DEFAULT_PROGRAM);
    let object = gpu.register_program(&OBJECT_PROGRAM);
    registry.register_shader_program("default", default);
    registry.register_shader_program("object", object);
    (gpu, registry)
}

fn frame(time: f32) -> FrameContext {
    FrameContext {
        time,
        camera: CameraParams::default(),
        light: LightParams::default(),
    }
}

#[test]
fn single_triangle_is_drawn_once_with_identity_model() {
    let mut obj = NamedTempFile::new().unwrap();
    writeln!(obj, "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3").unwrap();
    let data = load_obj(obj.path());
    assert_eq!(data.vertex_count(), 3);
    assert_eq!(data.indices, vec![0, 1, 2]);

    let (mut gpu, mut registry) = registry_with_programs();
    assert!(registry.add_mesh(&mut gpu, "tri", &data).unwrap());
    registry.add_object_instance(SceneObject::new("Tri", "tri", "", "default"));

    let stats = registry.render(&mut gpu, &frame(0.0));
    assert_eq!(stats.drawn, 1);
    assert_eq!(gpu.draws().len(), 1);
    let draw = &gpu.draws()[0];
    assert_eq!(draw.index_count, 3);
    assert_eq!(draw.model(), Some(Mat4::IDENTITY));
}

#[test]
fn cube_at_origin_is_drawn_once_with_identity_model() {
    let (mut gpu, mut registry) = registry_with_programs();
    assert!(registry
        .add_primitive_mesh(&mut gpu, "cube", ShapeType::Cube)
        .unwrap());
    registry.add_object_instance(SceneObject::new("Cube", "cube", "", "default"));

    let stats = registry.render(&mut gpu, &frame(0.0));
    assert_eq!(stats.drawn, 1);
    assert_eq!(gpu.draws().len(), 1);
    let draw = &gpu.draws()[0];
    assert_eq!(draw.index_count, 36);
    assert_eq!(draw.model(), Some(Mat4::IDENTITY));
}

#[test]
fn re_registering_an_id_keeps_the_original_geometry() {
    let (mut gpu, mut registry) = registry_with_programs();
    registry.add_primitive_mesh(&mut gpu, "shape", ShapeType::Cube).unwrap();
    assert!(!registry
        .add_primitive_mesh(&mut gpu, "shape", ShapeType::Triangle)
        .unwrap());
    registry.add_object_instance(SceneObject::new("Shape", "shape", "", "default"));

    registry.render(&mut gpu, &frame(0.0));
    let draw = &gpu.draws()[0];
    assert_eq!(draw.vertex_count, 24);
    assert_eq!(draw.index_count, 36);
    assert_eq!(gpu.live_mesh_count(), 1);
}

#[test]
fn shared_mesh_serves_many_instances() {
    let (mut gpu, mut registry) = registry_with_programs();
    registry.add_primitive_mesh(&mut gpu, "cube", ShapeType::Cube).unwrap();
    for (i, name) in ["A", "B", "C"].into_iter().enumerate() {
        registry.add_object_instance(
            SceneObject::new(name, "cube", "", "default").at(Vec3::new(i as f32, 0.0, 0.0)),
        );
    }
    let stats = registry.render(&mut gpu, &frame(0.0));
    assert_eq!(stats.drawn, 3);
    assert_eq!(stats.program_switches, 1);
    let models: Vec<_> = gpu.draws().iter().filter_map(|draw| draw.model()).collect();
    assert_eq!(models[2], Mat4::from_translation(Vec3::new(2.0, 0.0, 0.0)));
}

#[test]
fn interleaved_shaders_switch_on_every_change() {
    let (mut gpu, mut registry) = registry_with_programs();
    registry.add_primitive_mesh(&mut gpu, "cube", ShapeType::Cube).unwrap();
    for (name, shader) in [
        ("a", "default"),
        ("b", "object"),
        ("c", "default"),
        ("d", "object"),
    ] {
        registry.add_object_instance(SceneObject::new(name, "cube", "", shader));
    }
    assert_eq!(registry.render(&mut gpu, &frame(0.0)).program_switches, 4);

    let (mut gpu, mut registry) = registry_with_programs();
    registry.add_primitive_mesh(&mut gpu, "cube", ShapeType::Cube).unwrap();
    for (name, shader) in [
        ("a", "default"),
        ("c", "default"),
        ("b", "object"),
        ("d", "object"),
    ] {
        registry.add_object_instance(SceneObject::new(name, "cube", "", shader));
    }
    assert_eq!(registry.render(&mut gpu, &frame(0.0)).program_switches, 2);
}

#[test]
fn frame_context_feeds_light_and_camera_uniforms() {
    let (mut gpu, mut registry) = registry_with_programs();
    registry.add_primitive_mesh(&mut gpu, "cube", ShapeType::Cube).unwrap();
    registry.add_object_instance(SceneObject::new("Cube", "cube", "", "default"));

    let context = FrameContext {
        time: 0.0,
        camera: CameraParams {
            view_proj: Mat4::from_translation(Vec3::Z),
            position: Vec3::new(1.0, 2.0, 3.0),
        },
        light: LightParams {
            color: Vec4::new(0.2, 0.4, 0.6, 1.0),
            position: Vec3::new(-1.0, 0.0, 0.0),
        },
    };
    registry.render(&mut gpu, &context);
    let draw = &gpu.draws()[0];
    assert_eq!(
        draw.uniform("camMatrix"),
        Some(UniformValue::Mat4(context.camera.view_proj))
    );
    assert_eq!(
        draw.uniform("camPos"),
        Some(UniformValue::Vec3(Vec3::new(1.0, 2.0, 3.0)))
    );
    assert_eq!(
        draw.uniform("lightColor"),
        Some(UniformValue::Vec4(Vec4::new(0.2, 0.4, 0.6, 1.0)))
    );
    assert_eq!(
        draw.uniform("lightPos"),
        Some(UniformValue::Vec3(Vec3::new(-1.0, 0.0, 0.0)))
    );
}

#[test]
fn animated_model_matrices_depend_only_on_time() {
    let (mut gpu, mut registry) = registry_with_programs();
    registry.add_primitive_mesh(&mut gpu, "triangle", ShapeType::Triangle).unwrap();
    registry.add_object_instance(
        SceneObject::new("Bob", "triangle", "", "default")
            .at(Vec3::new(1.5, 0.0, 0.0))
            .moving(Motion::Bob {
                amplitude: 0.5,
                frequency: 2.0,
            }),
    );

    registry.render(&mut gpu, &frame(0.5));
    registry.render(&mut gpu, &frame(2.0));
    registry.render(&mut gpu, &frame(0.5));
    let draws = gpu.draws();
    assert_eq!(draws[0].model(), draws[2].model());
    assert_ne!(draws[0].model(), draws[1].model());
    let expected = Mat4::from_translation(Vec3::new(1.5, 0.5 * 1f32.sin(), 0.0));
    assert!(draws[0].model().unwrap().abs_diff_eq(expected, 1e-6));
}

#[test]
fn shutdown_then_reuse_starts_from_scratch() {
    let (mut gpu, mut registry) = registry_with_programs();
    registry.add_primitive_mesh(&mut gpu, "cube", ShapeType::Cube).unwrap();
    registry.add_object_instance(SceneObject::new("Cube", "cube", "", "default"));
    registry.shutdown(&mut gpu);
    assert_eq!(gpu.live_mesh_count(), 0);

    let stats = registry.render(&mut gpu, &frame(0.0));
    assert_eq!(stats.drawn, 0);
    assert!(registry
        .add_primitive_mesh(&mut gpu, "cube", ShapeType::Triangle)
        .unwrap());
}
