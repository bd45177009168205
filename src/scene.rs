use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec3, Vec4};
use log::{info, warn};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::gpu::{GpuBackend, PixelFormat};
use crate::obj;
use crate::registry::SceneRegistry;
use crate::render::LightParams;
use crate::shapes::ShapeType;

pub const LAMP_OBJECT: &str = "Lamp";
pub const BUTTON_LEFT: &str = "BtnLeft";
pub const BUTTON_RIGHT: &str = "BtnRight";

/// Time-driven animation applied on top of an object's placement.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Motion {
    #[default]
    None,
    /// Vertical sine offset from the base position.
    Bob { amplitude: f32, frequency: f32 },
    RotateX { speed_deg: f32 },
    RotateY { speed_deg: f32 },
    /// X at full speed, Y at 0.7 of it.
    #[serde(rename = "rotate-xy")]
    RotateXY { speed_deg: f32 },
}

impl Motion {
    fn from_parts(
        kind: &str,
        speed_deg: f32,
        amplitude: f32,
        frequency: f32,
    ) -> Result<Self> {
        Ok(match kind.to_ascii_lowercase().as_str() {
            "none" => Self::None,
            "bob" | "bob-y" => Self::Bob {
                amplitude,
                frequency,
            },
            "rotate-x" => Self::RotateX { speed_deg },
            "rotate-y" => Self::RotateY { speed_deg },
            "rotate-xy" => Self::RotateXY { speed_deg },
            other => bail!("unknown motion {other:?}"),
        })
    }
}

/// Named placed instance referencing shared resources by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub name: String,
    pub mesh: String,
    pub texture: String,
    pub shader: String,
    #[serde(default)]
    pub position: Vec3,
    /// Animation reference point, captured when the object is instanced.
    #[serde(default)]
    pub base_position: Vec3,
    #[serde(default = "default_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub motion: Motion,
}

impl SceneObject {
    pub fn new(
        name: impl Into<String>,
        mesh: impl Into<String>,
        texture: impl Into<String>,
        shader: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            mesh: mesh.into(),
            texture: texture.into(),
            shader: shader.into(),
            position: Vec3::ZERO,
            base_position: Vec3::ZERO,
            scale: default_scale(),
            motion: Motion::None,
        }
    }

    pub fn at(mut self, position: Vec3) -> Self {
        self.position = position;
        self.base_position = position;
        self
    }

    pub fn scaled(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn moving(mut self, motion: Motion) -> Self {
        self.motion = motion;
        self
    }
}

fn default_scale() -> Vec3 {
    Vec3::ONE
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeshSource {
    Shape(ShapeType),
    File(PathBuf),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeshDesc {
    pub id: String,
    pub source: MeshSource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextureDesc {
    pub id: String,
    pub path: PathBuf,
    #[serde(default)]
    pub format: PixelFormat,
}

/// Window overrides carried by a scene file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowSettings {
    pub title: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Everything needed to populate a [`SceneRegistry`] at startup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneDescription {
    #[serde(default)]
    pub window: WindowSettings,
    pub light_color: Vec4,
    pub light_position: Vec3,
    pub meshes: Vec<MeshDesc>,
    pub textures: Vec<TextureDesc>,
    pub objects: Vec<SceneObject>,
}

impl Default for SceneDescription {
    fn default() -> Self {
        let light = LightParams::default();
        Self {
            window: WindowSettings::default(),
            light_color: light.color,
            light_position: light.position,
            meshes: Vec::new(),
            textures: Vec::new(),
            objects: Vec::new(),
        }
    }
}

/// What [`SceneDescription::populate`] managed to register.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PopulateSummary {
    pub meshes: usize,
    pub textures: usize,
    pub objects: usize,
    pub failed_textures: usize,
}

impl SceneDescription {
    /// The demo scene: four animated primitives, the lamp and two light buttons.
    ///
    /// When `import` is given, the OBJ file is added as an extra spinning object.
    pub fn builtin(import: Option<&Path>) -> Self {
        let mut scene = Self {
            window: WindowSettings::default(),
            light_color: Vec4::ONE,
            light_position: Vec3::splat(0.5),
            meshes: ["circle", "triangle", "square", "cube"]
                .into_iter()
                .filter_map(|id| {
                    id.parse::<ShapeType>().ok().map(|shape| MeshDesc {
                        id: id.to_string(),
                        source: MeshSource::Shape(shape),
                    })
                })
                .collect(),
            textures: [("anime", "poza.jpg"), ("brick", "brick.jpg"), ("metal", "metal.jpg")]
                .into_iter()
                .map(|(id, path)| TextureDesc {
                    id: id.to_string(),
                    path: PathBuf::from(path),
                    format: PixelFormat::Rgb,
                })
                .collect(),
            objects: vec![
                SceneObject::new("Circle1", "circle", "anime", "default")
                    .moving(Motion::RotateX { speed_deg: 60.0 }),
                SceneObject::new("Triangle1", "triangle", "brick", "default")
                    .at(Vec3::new(1.5, 0.0, 0.0))
                    .scaled(Vec3::splat(0.8))
                    .moving(Motion::Bob {
                        amplitude: 0.5,
                        frequency: 2.0,
                    }),
                SceneObject::new("Square1", "square", "metal", "default")
                    .at(Vec3::new(-1.5, 0.0, 0.0))
                    .scaled(Vec3::splat(0.9))
                    .moving(Motion::RotateY { speed_deg: 30.0 }),
                SceneObject::new("Cube1", "cube", "brick", "default")
                    .at(Vec3::new(3.0, 0.0, 0.0))
                    .scaled(Vec3::splat(0.7))
                    .moving(Motion::RotateXY { speed_deg: 90.0 }),
            ],
        };

        if let Some(path) = import {
            scene.meshes.push(MeshDesc {
                id: "imported".to_string(),
                source: MeshSource::File(path.to_path_buf()),
            });
            scene.objects.push(
                SceneObject::new("Imported", "imported", "brick", "default")
                    .at(Vec3::new(0.0, 0.0, 10.0))
                    .moving(Motion::RotateXY { speed_deg: 90.0 }),
            );
        }

        scene.objects.push(
            SceneObject::new(LAMP_OBJECT, "cube", "brick", "object")
                .at(scene.light_position)
                .scaled(Vec3::splat(0.2)),
        );
        for name in [BUTTON_LEFT, BUTTON_RIGHT] {
            scene
                .objects
                .push(SceneObject::new(name, "cube", "anime", "default").scaled(Vec3::splat(0.18)));
        }
        scene
    }

    /// Reads a scene file; relative mesh and texture paths resolve against its directory.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let xml = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read scene {}", path.display()))?;
        let mut scene = Self::from_xml(&xml)
            .with_context(|| format!("failed to parse scene {}", path.display()))?;

        let base = path.parent().unwrap_or_else(|| Path::new(""));
        for mesh in &mut scene.meshes {
            if let MeshSource::File(file) = &mut mesh.source {
                if file.is_relative() {
                    *file = base.join(&*file);
                }
            }
        }
        for texture in &mut scene.textures {
            if texture.path.is_relative() {
                texture.path = base.join(&texture.path);
            }
        }
        Ok(scene)
    }

    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        if !root.has_tag_name("scene") {
            bail!("expected <scene> root, found <{}>", root.tag_name().name());
        }

        let mut scene = Self::default();
        for node in root.children().filter(Node::is_element) {
            match node.tag_name().name() {
                "window" => {
                    scene.window = WindowSettings {
                        title: optional_text(&node, "title"),
                        width: parse_optional(optional_text(&node, "width"))?,
                        height: parse_optional(optional_text(&node, "height"))?,
                    };
                }
                "light" => {
                    scene.light_color =
                        parse_vec4(optional_text(&node, "color"), scene.light_color)?;
                    scene.light_position =
                        parse_vec3(optional_text(&node, "position"), scene.light_position)?;
                }
                "mesh" => scene.meshes.push(parse_mesh(&node)?),
                "texture" => scene.textures.push(parse_texture(&node)?),
                "object" => scene.objects.push(parse_object(&node)?),
                other => warn!("ignoring unknown scene element <{other}>"),
            }
        }
        Ok(scene)
    }

    /// Registers meshes, textures, the light and every object.
    ///
    /// Texture failures are logged and skipped; objects referencing them
    /// render untextured. Malformed meshes abort.
    pub fn populate<B: GpuBackend>(
        &self,
        registry: &mut SceneRegistry<B>,
        gpu: &mut B,
    ) -> Result<PopulateSummary> {
        let mut summary = PopulateSummary::default();

        for mesh in &self.meshes {
            let added = match &mesh.source {
                MeshSource::Shape(shape) => {
                    registry.add_primitive_mesh(gpu, &mesh.id, *shape)?
                }
                MeshSource::File(path) => {
                    let data = obj::load_obj(path);
                    registry.add_mesh(gpu, &mesh.id, &data)?
                }
            };
            if added {
                summary.meshes += 1;
            }
        }

        for texture in &self.textures {
            match registry.add_texture(gpu, &texture.id, &texture.path, texture.format) {
                Ok(true) => summary.textures += 1,
                Ok(false) => {}
                Err(err) => {
                    warn!("{:#}", anyhow::Error::from(err));
                    summary.failed_textures += 1;
                }
            }
        }

        registry.set_light_params(self.light_color, self.light_position);

        for object in &self.objects {
            registry.add_object_instance(object.clone());
            summary.objects += 1;
        }

        info!(
            "scene populated: {} meshes, {} textures ({} failed), {} objects",
            summary.meshes, summary.textures, summary.failed_textures, summary.objects
        );
        Ok(summary)
    }
}

fn parse_mesh(node: &Node<'_, '_>) -> Result<MeshDesc> {
    let id = required_text(node, "id")?;
    let source = match (optional_text(node, "shape"), optional_text(node, "path")) {
        (Some(shape), None) => MeshSource::Shape(
            shape
                .parse()
                .with_context(|| format!("mesh {id:?}"))?,
        ),
        (None, Some(path)) => MeshSource::File(PathBuf::from(path)),
        (Some(_), Some(_)) => bail!("mesh {id:?} has both <shape> and <path>"),
        (None, None) => bail!("mesh {id:?} needs a <shape> or a <path>"),
    };
    Ok(MeshDesc { id, source })
}

fn parse_texture(node: &Node<'_, '_>) -> Result<TextureDesc> {
    let id = required_text(node, "id")?;
    let path = PathBuf::from(required_text(node, "path")?);
    let format = match optional_text(node, "format").as_deref() {
        None | Some("rgb") => PixelFormat::Rgb,
        Some("rgba") => PixelFormat::Rgba,
        Some(other) => bail!("texture {id:?} has unknown format {other:?}"),
    };
    Ok(TextureDesc { id, path, format })
}

fn parse_object(node: &Node<'_, '_>) -> Result<SceneObject> {
    let name = required_text(node, "name")?;
    let mut object = SceneObject::new(
        name.as_str(),
        required_text(node, "mesh")?,
        optional_text(node, "texture").unwrap_or_default(),
        optional_text(node, "shader").unwrap_or_else(|| "default".to_string()),
    );
    object.position = parse_vec3(optional_text(node, "position"), object.position)
        .with_context(|| format!("object {name:?} position"))?;
    object.base_position = object.position;
    object.scale = parse_vec3(optional_text(node, "scale"), object.scale)
        .with_context(|| format!("object {name:?} scale"))?;

    if let Some(kind) = optional_text(node, "motion") {
        object.motion = Motion::from_parts(
            &kind,
            parse_f32(optional_text(node, "speed"), 0.0)?,
            parse_f32(optional_text(node, "amplitude"), 0.0)?,
            parse_f32(optional_text(node, "frequency"), 0.0)?,
        )
        .with_context(|| format!("object {name:?}"))?;
    }
    Ok(object)
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    node.children()
        .find(|child| child.has_tag_name(tag))
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_components<const N: usize>(value: &str) -> Result<[f32; N]> {
    let mut out = [0.0; N];
    let mut numbers = value.split_whitespace();
    for slot in &mut out {
        let component = numbers
            .next()
            .ok_or_else(|| anyhow!("vector {value:?} is missing components"))?;
        *slot = component
            .parse()
            .with_context(|| format!("invalid number {component:?}"))?;
    }
    Ok(out)
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    match value {
        Some(value) => parse_components::<3>(&value).map(Vec3::from),
        None => Ok(default),
    }
}

fn parse_vec4(value: Option<String>, default: Vec4) -> Result<Vec4> {
    match value {
        Some(value) => parse_components::<4>(&value).map(Vec4::from),
        None => Ok(default),
    }
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float: {err}")),
        None => Ok(default),
    }
}

fn parse_optional(value: Option<String>) -> Result<Option<u32>> {
    value
        .map(|value| {
            value
                .parse::<u32>()
                .with_context(|| format!("invalid integer {value:?}"))
        })
        .transpose()
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::render::HeadlessBackend;

    const SAMPLE: &str = r#"
    <scene>
        <window><title>Demo</title><width>640</width></window>
        <light><color>1 0.5 0.5 1</color><position>0 2 0</position></light>
        <mesh><id>cube</id><shape>cube</shape></mesh>
        <mesh><id>model</id><path>models/thing.obj</path></mesh>
        <texture><id>brick</id><path>brick.jpg</path></texture>
        <texture><id>glass</id><path>glass.png</path><format>rgba</format></texture>
        <object>
            <name>Cube1</name>
            <mesh>cube</mesh>
            <texture>brick</texture>
            <position>3 0 0</position>
            <scale>0.7 0.7 0.7</scale>
            <motion>rotate-xy</motion>
            <speed>90</speed>
        </object>
        <object>
            <name>Floater</name>
            <mesh>model</mesh>
            <shader>object</shader>
            <motion>bob</motion>
            <amplitude>0.5</amplitude>
            <frequency>2</frequency>
        </object>
    </scene>
    "#;

    #[test]
    fn parse_scene_reads_every_section() {
        let scene = SceneDescription::from_xml(SAMPLE).unwrap();
        assert_eq!(scene.window.title.as_deref(), Some("Demo"));
        assert_eq!(scene.window.width, Some(640));
        assert_eq!(scene.window.height, None);
        assert_eq!(scene.light_color, Vec4::new(1.0, 0.5, 0.5, 1.0));
        assert_eq!(scene.light_position, Vec3::new(0.0, 2.0, 0.0));
        assert_eq!(scene.meshes[0].source, MeshSource::Shape(ShapeType::Cube));
        assert_eq!(
            scene.meshes[1].source,
            MeshSource::File(PathBuf::from("models/thing.obj"))
        );
        assert_eq!(scene.textures[1].format, PixelFormat::Rgba);

        let cube = &scene.objects[0];
        assert_eq!(cube.shader, "default");
        assert_eq!(cube.base_position, Vec3::new(3.0, 0.0, 0.0));
        assert_eq!(cube.motion, Motion::RotateXY { speed_deg: 90.0 });
        assert_eq!(
            scene.objects[1].motion,
            Motion::Bob {
                amplitude: 0.5,
                frequency: 2.0
            }
        );
        assert_eq!(scene.objects[1].texture, "");
    }

    #[test]
    fn missing_name_is_an_error() {
        let bad = "<scene><object><mesh>cube</mesh></object></scene>";
        assert!(SceneDescription::from_xml(bad).is_err());
    }

    #[test]
    fn malformed_entries_are_errors() {
        for bad in [
            "<scene><mesh><id>a</id></mesh></scene>",
            "<scene><mesh><id>a</id><shape>sphere</shape></mesh></scene>",
            "<scene><object><name>a</name><mesh>m</mesh><motion>spin</motion></object></scene>",
            "<scene><light><color>1 1 1</color></light></scene>",
            "<world/>",
        ] {
            assert!(SceneDescription::from_xml(bad).is_err(), "{bad}");
        }
    }

    #[test]
    fn from_path_resolves_relative_paths() {
        let dir = tempfile::tempdir().unwrap();
        let mut file = std::fs::File::create(dir.path().join("scene.xml")).unwrap();
        file.write_all(SAMPLE.as_bytes()).unwrap();

        let scene = SceneDescription::from_path(dir.path().join("scene.xml")).unwrap();
        assert_eq!(
            scene.meshes[1].source,
            MeshSource::File(dir.path().join("models/thing.obj"))
        );
        assert_eq!(scene.textures[0].path, dir.path().join("brick.jpg"));
    }

    #[test]
    fn builtin_scene_matches_the_demo_layout() {
        let scene = SceneDescription::builtin(None);
        let names: Vec<_> = scene.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(
            names,
            ["Circle1", "Triangle1", "Square1", "Cube1", "Lamp", "BtnLeft", "BtnRight"]
        );
        let lamp = &scene.objects[4];
        assert_eq!(lamp.position, Vec3::splat(0.5));
        assert_eq!(lamp.shader, "object");

        let with_import = SceneDescription::builtin(Some(Path::new("model.obj")));
        assert_eq!(with_import.objects.len(), 8);
        assert_eq!(with_import.objects[4].position, Vec3::new(0.0, 0.0, 10.0));
    }

    #[test]
    fn populate_skips_unreadable_textures() {
        let mut gpu = HeadlessBackend::new();
        let mut registry = SceneRegistry::new();
        let summary = SceneDescription::builtin(None)
            .populate(&mut registry, &mut gpu)
            .unwrap();
        assert_eq!(summary.meshes, 4);
        assert_eq!(summary.objects, 7);
        assert_eq!(summary.textures + summary.failed_textures, 3);
        assert_eq!(registry.light().position, Vec3::splat(0.5));
        assert!(registry.find_object("Lamp").is_some());
    }
}
