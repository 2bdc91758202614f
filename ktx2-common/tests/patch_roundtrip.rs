//! Disk round-trips for the container patcher
//!
//! Tests the full pipeline per layout: write a container with an inline KTX2
//! image -> load -> patch -> save -> reload -> verify.

use ktx2_common::{embed_ktx2_images, ContainerLayout, GltfContainer};
use serde_json::{json, Value};
use tempfile::tempdir;

fn scene_with_inline_image() -> Value {
    json!({
        "asset": {"version": "2.0"},
        "images": [{"mimeType": "image/ktx2", "uri": "data:image/ktx2;base64,AAA="}]
    })
}

fn assert_patched(container: &GltfContainer) {
    let image = &container.json["images"][0];
    assert_eq!(image["bufferView"], json!(0));
    assert!(image.get("uri").is_none());
    assert_eq!(
        container.json["bufferViews"][0],
        json!({"buffer": 0, "byteOffset": 0, "byteLength": 3})
    );
    assert_eq!(container.json["buffers"][0]["byteLength"], json!(4));
}

#[test]
fn monolithic_patch_roundtrip() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("scene.glb");

    let container = GltfContainer {
        json: scene_with_inline_image().as_object().unwrap().clone(),
        bin: Vec::new(),
        layout: ContainerLayout::Monolithic,
    };
    container.save(&path).expect("Failed to write GLB");

    let mut loaded = GltfContainer::load(&path).expect("Failed to load GLB");
    assert_eq!(embed_ktx2_images(&mut loaded).unwrap(), 1);
    loaded.save(&path).expect("Failed to rewrite GLB");

    let reloaded = GltfContainer::load(&path).expect("Failed to reload GLB");
    assert_patched(&reloaded);
    assert_eq!(reloaded.bin.len(), 4);
    assert_eq!(&reloaded.bin[..3], &[0, 0, 0]);
}

#[test]
fn monolithic_patch_is_idempotent_on_disk() {
    let dir = tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("scene.glb");

    let container = GltfContainer {
        json: scene_with_inline_image().as_object().unwrap().clone(),
        bin: Vec::new(),
        layout: ContainerLayout::Monolithic,
    };
    container.save(&path).expect("Failed to write GLB");

    let mut first = GltfContainer::load(&path).unwrap();
    embed_ktx2_images(&mut first).unwrap();
    first.save(&path).unwrap();
    let bytes_after_first = std::fs::read(&path).unwrap();

    let mut second = GltfContainer::load(&path).unwrap();
    assert_eq!(embed_ktx2_images(&mut second).unwrap(), 0);
    second.save(&path).unwrap();
    let bytes_after_second = std::fs::read(&path).unwrap();

    assert_eq!(bytes_after_first, bytes_after_second);
}

#[test]
fn separate_file_patch_writes_sibling_bin() {
    let dir = tempdir().expect("Failed to create temp dir");
    let gltf_path = dir.path().join("scene.gltf");
    let bin_path = dir.path().join("scene.bin");

    // Pre-existing binary file seeds the buffer
    std::fs::write(&bin_path, [0xAB; 8]).unwrap();
    let mut scene = scene_with_inline_image();
    scene["buffers"] = json!([{"uri": "scene.bin", "byteLength": 8}]);
    std::fs::write(&gltf_path, serde_json::to_vec(&scene).unwrap()).unwrap();

    let mut container = GltfContainer::load(&gltf_path).expect("Failed to load glTF");
    assert!(matches!(container.layout, ContainerLayout::SeparateFile { .. }));
    assert_eq!(container.bin, vec![0xAB; 8]);

    assert_eq!(embed_ktx2_images(&mut container).unwrap(), 1);
    container.save(&gltf_path).expect("Failed to rewrite glTF");

    let bin = std::fs::read(&bin_path).unwrap();
    assert_eq!(bin.len(), 12);
    assert_eq!(&bin[..8], &[0xAB; 8]);

    let reloaded = GltfContainer::load(&gltf_path).unwrap();
    assert_eq!(
        reloaded.json["bufferViews"][0],
        json!({"buffer": 0, "byteOffset": 8, "byteLength": 3})
    );
    assert_eq!(reloaded.json["buffers"][0]["byteLength"], json!(12));
    assert_eq!(reloaded.bin, bin);
}

#[test]
fn embedded_data_uri_patch_rewrites_buffer_uri() {
    let dir = tempdir().expect("Failed to create temp dir");
    let gltf_path = dir.path().join("scene.gltf");

    let mut scene = scene_with_inline_image();
    // Empty embedded buffer
    scene["buffers"] = json!([{
        "uri": "data:application/octet-stream;base64,",
        "byteLength": 0
    }]);
    std::fs::write(&gltf_path, serde_json::to_vec(&scene).unwrap()).unwrap();

    let mut container = GltfContainer::load(&gltf_path).expect("Failed to load glTF");
    assert_eq!(container.layout, ContainerLayout::EmbeddedDataUri);

    assert_eq!(embed_ktx2_images(&mut container).unwrap(), 1);
    container.save(&gltf_path).expect("Failed to rewrite glTF");

    let reloaded = GltfContainer::load(&gltf_path).unwrap();
    assert_eq!(reloaded.layout, ContainerLayout::EmbeddedDataUri);
    assert_eq!(reloaded.bin.len(), 4);
    assert_patched(&reloaded);

    let uri = reloaded.json["buffers"][0]["uri"].as_str().unwrap();
    assert!(uri.starts_with("data:application/octet-stream;base64,"));
}
