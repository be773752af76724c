//! End-to-end test for `release`. A metadata file is always provided so the
//! command never reaches for the network.

mod common;

use assert_cmd::cargo::cargo_bin_cmd;
use assert_fs::prelude::*;
use predicates::prelude::*;

use common::{init_repo, tag};

#[test]
fn test_release_manifest_from_build_dir() {
    let scratch = assert_fs::TempDir::new().unwrap();
    let core = scratch.child("everest-core");
    init_repo(core.path(), &[("README.md", "core\n")]);
    tag(core.path(), "2024.9.0");

    let build = scratch.child("build");
    build
        .child("CPM_modules/libocpp.cmake")
        .write_str("CPMAddPackage(\"NAME;libocpp;GIT_REPOSITORY;https://github.com/EVerest/libocpp.git;GIT_TAG;v0.16.0\")\n")
        .unwrap();
    let metadata = scratch.child("metadata.yaml");
    metadata
        .write_str("libocpp:\n  description: OCPP 1.6 and 2.0.1 library\n  license: Apache-2.0\n")
        .unwrap();
    let out = scratch.child("release.json");

    cargo_bin_cmd!("edm")
        .env("EVEREST_METADATA_FILE", metadata.path())
        .env("EVEREST_UPDATE_CHANNEL", "stable")
        .env_remove("EVEREST_METADATA_INCLUDE_ALL")
        .arg("release")
        .arg("--everest-core-dir")
        .arg(core.path())
        .arg("--build-dir")
        .arg(build.path())
        .arg("--out")
        .arg(out.path())
        .assert()
        .success();

    out.assert(predicate::str::contains("\"channel\":\"stable\""));
    out.assert(predicate::str::contains("\"version\":\"2024.9.0\""));
    out.assert(predicate::str::contains(
        "{\"name\":\"libocpp\",\"version\":\"v0.16.0\",\"description\":\"OCPP 1.6 and 2.0.1 library\",\"license\":\"Apache-2.0\"}",
    ));
}

#[test]
fn test_release_without_cpm_modules_fails() {
    let scratch = assert_fs::TempDir::new().unwrap();
    let metadata = scratch.child("metadata.yaml");
    metadata.write_str("{}\n").unwrap();
    cargo_bin_cmd!("edm")
        .env("EVEREST_METADATA_FILE", metadata.path())
        .arg("release")
        .arg("--everest-core-dir")
        .arg(scratch.path())
        .arg("--build-dir")
        .arg(scratch.path())
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("CPM_modules"));
}
