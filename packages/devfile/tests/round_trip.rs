//! Parse → serialize → parse must reproduce the same sections, keep keys
//! the model does not know about, and write keys in a stable order.

use devstate_devfile::{CommandBody, Devfile, DevfileContent, DevfileError};
use indoc::indoc;
use pretty_assertions::assert_eq;

const FULL: &str = indoc! {r#"
    schemaVersion: 2.2.0
    metadata:
      name: go-app
      version: 1.0.0
      architectures: [amd64, arm64]
      projectType: Go
    variables:
      GO_VERSION: "1.21"
    starterProjects:
      - name: go-starter
        git:
          remotes:
            origin: https://github.com/devfile-samples/go-starter.git
    components:
      - name: runtime
        container:
          image: golang:1.21
          args: [tail, -f, /dev/null]
          env:
            - name: GOPATH
              value: /go
          endpoints:
            - name: http
              targetPort: 8080
              exposure: public
          annotation:
            deployment:
              team: platform
          volumeMounts:
            - name: gocache
              path: /go/pkg
          cpuLimit: 500m
          memoryRequest: 256Mi
      - name: gocache
        volume:
          ephemeral: true
          size: 2Gi
      - name: app-image
        image:
          imageName: go-app:latest
          autoBuild: false
          dockerfile:
            uri: docker/Dockerfile
            args: [--build-arg, GO_VERSION=1.21]
      - name: manifests
        openshift:
          inlined: |
            kind: Route
          deployByDefault: true
    commands:
      - id: build
        exec:
          component: runtime
          commandLine: go build -o app
          hotReloadCapable: true
          group:
            kind: build
      - id: push
        apply:
          component: app-image
      - id: deploy-all
        composite:
          commands: [build, push]
          parallel: false
    events:
      preStop: [build]
"#};

#[test]
fn test_structural_round_trip() {
    let first = DevfileContent::parse(FULL).unwrap();
    let devfile = Devfile::from_yaml(FULL).unwrap();
    let written = devfile.to_yaml().unwrap();
    let second = DevfileContent::parse(&written).unwrap();

    assert_eq!(first.metadata, second.metadata);
    assert_eq!(first.commands, second.commands);
    assert_eq!(first.containers, second.containers);
    assert_eq!(first.images, second.images);
    assert_eq!(first.resources, second.resources);
    assert_eq!(first.volumes, second.volumes);
    assert_eq!(first.events, second.events);
}

#[test]
fn test_unknown_keys_survive() {
    let devfile = Devfile::from_yaml(FULL).unwrap();
    let written = devfile.to_yaml().unwrap();

    assert!(written.contains("starterProjects:"));
    assert!(written.contains("GO_VERSION:"));
    assert!(written.contains("go-starter.git"));
}

#[test]
fn test_serialization_is_stable() {
    let devfile = Devfile::from_yaml(FULL).unwrap();
    let once = devfile.to_yaml().unwrap();
    let twice = Devfile::from_yaml(&once).unwrap().to_yaml().unwrap();
    assert_eq!(once, twice);
}

#[test]
fn test_sections_derived_from_full_document() {
    let content = DevfileContent::parse(FULL).unwrap();

    assert_eq!(content.metadata.architectures, "amd64,arm64");

    let runtime = content.container("runtime").unwrap();
    assert_eq!(runtime.env[0].name, "GOPATH");
    assert_eq!(runtime.endpoints[0].target_port, 8080);
    assert_eq!(runtime.annotation.deployment["team"], "platform");
    assert!(!runtime.configure_sources);
    assert!(runtime.mount_sources);

    let image = content.image("app-image").unwrap();
    assert_eq!(image.auto_build, "never");
    assert_eq!(image.args, vec!["--build-arg", "GO_VERSION=1.21"]);
    assert!(!image.orphan);

    let manifests = content.resource("manifests").unwrap();
    assert_eq!(manifests.deploy_by_default, "always");
    assert!(manifests.orphan);

    assert!(content.volume("gocache").unwrap().ephemeral);

    match &content.command("build").unwrap().body {
        CommandBody::Exec(exec) => assert!(exec.hot_reload_capable),
        other => panic!("expected exec command, got {other:?}"),
    }
    assert_eq!(content.events.pre_stop, vec!["build"]);
}

#[test]
fn test_from_devfile_serializes_content() {
    let devfile = Devfile::default();
    let content = DevfileContent::from_devfile(&devfile).unwrap();

    assert_eq!(content.content, "metadata: {}\nschemaVersion: 2.2.0\n");
    assert!(content.commands.is_empty());
}

#[test]
fn test_malformed_yaml_rejected() {
    let err = DevfileContent::parse("schemaVersion: [unterminated").unwrap_err();
    assert!(matches!(err, DevfileError::Parse(_)));

    let err = DevfileContent::parse("metadata:\n  name: x\n").unwrap_err();
    assert!(matches!(err, DevfileError::Invalid(_)));

    let err = DevfileContent::parse("   ").unwrap_err();
    assert!(matches!(err, DevfileError::Invalid(_)));
}
