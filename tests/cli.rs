use assert_cmd::prelude::*;
use predicates::str::contains;
use std::fs;
use std::process::Command;

fn write_scene(dir: &std::path::Path) -> std::path::PathBuf {
    fs::create_dir_all(dir.join("models")).expect("models dir");
    fs::write(
        dir.join("models/quad.obj"),
        "v -1 -1 0\nv 1 -1 0\nv 1 1 0\nv -1 1 0\nvt 0 0\nvt 1 0\nvt 1 1\nvt 0 1\nf 1/1 2/2 3/3 4/4\n",
    )
    .expect("write obj");

    let scene = r#"<scene>
  <light><color>1 1 1 1</color><position>0 2 0</position></light>
  <mesh><id>quad</id><path>models/quad.obj</path></mesh>
  <mesh><id>cube</id><shape>cube</shape></mesh>
  <object>
    <name>Quad</name><mesh>quad</mesh><position>0 0 -2</position>
  </object>
  <object>
    <name>Floater</name><mesh>cube</mesh><position>1 0 0</position>
    <motion>bob</motion><amplitude>0.5</amplitude><frequency>2</frequency>
  </object>
  <object>
    <name>Ghost</name><mesh>sphere</mesh>
  </object>
</scene>
"#;
    let path = dir.join("scene.xml");
    fs::write(&path, scene).expect("write scene");
    path
}

#[test]
fn summary_mode_reports_draws_and_positions() {
    let dir = tempfile::tempdir().expect("temp dir");
    let scene = write_scene(dir.path());

    let mut cmd = Command::cargo_bin("meshview").expect("binary exists");
    cmd.arg(&scene).arg("--summary-only").arg("--frames").arg("1");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 3 objects (2 meshes, 0 textures)"))
        .stdout(contains(
            "Simulated 1 frame(s): 2 draws, 1 skipped, 1 program switches",
        ))
        .stdout(contains(" - Quad pos=(0.00, 0.00, -2.00)"))
        .stdout(contains(" - Floater pos=(1.00, 0.00, 0.00)"));
}

#[test]
fn builtin_scene_runs_headless() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut cmd = Command::cargo_bin("meshview").expect("binary exists");
    cmd.current_dir(dir.path())
        .arg("--summary-only")
        .arg("--frames")
        .arg("2");
    cmd.assert()
        .success()
        .stdout(contains("Loaded scene with 7 objects (4 meshes, 3 textures)"))
        .stdout(contains("Simulated 2 frame(s): 14 draws, 0 skipped"))
        .stdout(contains(" - Lamp pos=(0.50, 0.50, 0.50)"));
}

#[test]
fn unknown_flag_fails() {
    let mut cmd = Command::cargo_bin("meshview").expect("binary exists");
    cmd.arg("--wireframe");
    cmd.assert()
        .failure()
        .stderr(contains("Unknown argument: --wireframe"));
}

#[test]
fn missing_scene_file_fails() {
    let dir = tempfile::tempdir().expect("temp dir");
    let mut cmd = Command::cargo_bin("meshview").expect("binary exists");
    cmd.arg(dir.path().join("nope.xml")).arg("--summary-only");
    cmd.assert()
        .failure()
        .stderr(contains("failed to read scene"));
}
