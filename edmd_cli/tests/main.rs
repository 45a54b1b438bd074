use assert_cmd::Command;
use assert_fs::prelude::*;

const CONFIG: &str = r#"{
  "simulation_size": { "x": 20.0, "y": 20.0, "z": 20.0 },
  "boundary": "Periodic",
  "flow": "Newtonian",
  "particles": [
    { "position": { "x": -1.0, "y": 0.0, "z": 0.0 },
      "velocity": { "x": 1.0, "y": 0.0, "z": 0.0 } },
    { "position": { "x": 1.0, "y": 0.0, "z": 0.0 },
      "velocity": { "x": -1.0, "y": 0.0, "z": 0.0 } }
  ],
  "properties": [
    { "name": "Mass", "unit": "Mass", "value": { "Uniform": 1.0 } },
    { "name": "Diameter", "unit": "Length", "value": { "Uniform": 1.0 } },
    { "name": "E", "unit": "Dimensionless", "value": { "Uniform": 1.0 } }
  ],
  "interactions": [
    { "HardSphere": { "name": "bulk", "range": "All",
      "diameter": "Diameter", "elasticity": "E" } }
  ],
  "seed": 7
}"#;

#[test]
fn help() {
    Command::cargo_bin("edmd")
        .unwrap()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicates::str::contains("--sim-time"));
}

#[test]
fn runs_a_two_particle_config() {
    let dir = assert_fs::TempDir::new().unwrap();
    let config = dir.child("config.json");
    config.write_str(CONFIG).unwrap();
    let output = dir.child("out.json");

    Command::cargo_bin("edmd")
        .unwrap()
        .arg(config.path())
        .arg("--events")
        .arg("10")
        .arg("--output")
        .arg(output.path())
        .assert()
        .success();

    output.assert(predicates::path::exists());
    dir.child("out.json.data.json").assert(predicates::str::contains("events"));
}

#[test]
fn missing_config_fails() {
    Command::cargo_bin("edmd")
        .unwrap()
        .arg("no-such-file.json")
        .assert()
        .failure();
}

#[test]
fn malformed_config_fails() {
    let dir = assert_fs::TempDir::new().unwrap();
    let config = dir.child("broken.json");
    config.write_str("{ not json").unwrap();

    Command::cargo_bin("edmd")
        .unwrap()
        .arg(config.path())
        .assert()
        .failure();
}
