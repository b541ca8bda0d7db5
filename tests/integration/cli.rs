//! Integration tests for the livenote binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn livenote(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("livenote").expect("binary builds");
    cmd.arg("--data-dir").arg(dir.path());
    cmd
}

fn stdout_line(output: &[u8]) -> String {
    String::from_utf8_lossy(output).trim().to_string()
}

#[test]
fn test_new_list_show() {
    let dir = TempDir::new().unwrap();
    let out = livenote(&dir).args(["new", "Lab Book"]).output().unwrap();
    assert!(out.status.success());
    let id = stdout_line(&out.stdout);

    livenote(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains(&id).and(predicate::str::contains("Lab Book")));

    livenote(&dir)
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Chapter 1").and(predicate::str::contains("2 cells")));

    assert!(dir.path().join("config.toml").exists());
    assert!(dir.path().join("livenote.db").exists());
}

#[test]
fn test_chapters_and_export() {
    let dir = TempDir::new().unwrap();
    let out = livenote(&dir).args(["new", "Optics"]).output().unwrap();
    let id = stdout_line(&out.stdout);

    let out = livenote(&dir)
        .args(["add-chapter", &id, "Lenses"])
        .output()
        .unwrap();
    assert!(out.status.success());
    let chapter = stdout_line(&out.stdout);

    let md = dir.path().join("optics.md");
    livenote(&dir)
        .args(["export", &id, "--format", "md", "--out"])
        .arg(&md)
        .assert()
        .success();
    let contents = std::fs::read_to_string(&md).unwrap();
    assert!(contents.starts_with("# Optics\n"));
    assert!(contents.contains("## Lenses"));

    livenote(&dir)
        .args(["remove-chapter", &id, &chapter])
        .assert()
        .success();
    livenote(&dir)
        .args(["show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("Lenses").not());
}

#[test]
fn test_import_html_export() {
    let dir = TempDir::new().unwrap();
    let out = livenote(&dir).args(["new", "Portable"]).output().unwrap();
    let id = stdout_line(&out.stdout);

    let html = dir.path().join("portable.html");
    livenote(&dir)
        .args(["export", &id, "--format", "html", "--out"])
        .arg(&html)
        .assert()
        .success();
    livenote(&dir).args(["delete", &id]).assert().success();
    livenote(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No notebooks"));

    livenote(&dir)
        .arg("import")
        .arg(&html)
        .assert()
        .success()
        .stdout(predicate::str::contains(&id));
}

#[test]
fn test_errors_exit_nonzero() {
    let dir = TempDir::new().unwrap();
    livenote(&dir)
        .args(["show", "00000000-0000-0000-0000-000000000001"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));

    livenote(&dir)
        .args(["export", "00000000-0000-0000-0000-000000000001", "--format", "pdf"])
        .assert()
        .failure();

    let out = livenote(&dir).args(["new", "Solo"]).output().unwrap();
    let id = stdout_line(&out.stdout);
    let show = livenote(&dir).args(["show", &id]).output().unwrap();
    let listing = String::from_utf8_lossy(&show.stdout).to_string();
    let only_chapter = listing
        .lines()
        .nth(1)
        .and_then(|line| line.trim_start_matches(['*', ' ']).split('\t').next())
        .unwrap()
        .to_string();
    livenote(&dir)
        .args(["remove-chapter", &id, &only_chapter])
        .assert()
        .failure()
        .stderr(predicate::str::contains("last chapter"));
}

#[test]
fn test_switch_backend() {
    let dir = TempDir::new().unwrap();
    livenote(&dir).args(["new", "On SQLite"]).assert().success();

    livenote(&dir)
        .args(["config", "set-backend", "key-value"])
        .assert()
        .success();
    let config = std::fs::read_to_string(dir.path().join("config.toml")).unwrap();
    assert!(config.contains("backend = \"key-value\""));

    livenote(&dir)
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No notebooks"));

    livenote(&dir)
        .args(["config", "set-backend", "floppy"])
        .assert()
        .failure();
}

#[test]
fn test_chapter_bundle_and_foreign_ids() {
    let dir = TempDir::new().unwrap();
    let out = livenote(&dir).args(["new", "Bundle"]).output().unwrap();
    let id = stdout_line(&out.stdout);

    let bundle = dir.path().join("bundle.zip");
    livenote(&dir)
        .args(["export", &id, "--format", "chapters", "--out"])
        .arg(&bundle)
        .assert()
        .success();
    assert!(std::fs::read(&bundle).unwrap().starts_with(b"PK"));

    let foreign = dir.path().join("waves.notebook");
    std::fs::write(
        &foreign,
        r#"{
            "id": "id_k3j2h1a_lq2x",
            "title": "Waves",
            "chapters": [{
                "id": "id_9x8w7v6_lq2y",
                "title": "Intro",
                "cells": [{
                    "id": "id_a1b2c3d_lq2z",
                    "type": "markdown",
                    "language": "markdown",
                    "content": "hello",
                    "status": "idle",
                    "createdAt": 1700000000000,
                    "updatedAt": 1700000000500
                }]
            }],
            "metadata": {
                "version": "1.0.0",
                "createdAt": 1700000000000,
                "updatedAt": 1700000000500
            }
        }"#,
    )
    .unwrap();
    livenote(&dir)
        .arg("import")
        .arg(&foreign)
        .assert()
        .success()
        .stdout(predicate::str::contains("id_k3j2h1a_lq2x"));
    livenote(&dir)
        .args(["show", "id_k3j2h1a_lq2x"])
        .assert()
        .success()
        .stdout(predicate::str::contains("id_9x8w7v6_lq2y").and(predicate::str::contains("1 cells")));
}
