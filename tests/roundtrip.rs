//! Integration tests for writing FBOM streams and verifying round-trip.

use byteorder::{BigEndian, WriteBytesExt};
use fbom::prelude::*;
use fbom::wire::format;
use tempfile::NamedTempFile;

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn build_scene() -> FbomObject {
    let mut scene = FbomObject::new("Scene");
    scene.set_property("name", FbomData::from_string("main"));
    scene.set_property("version", FbomData::from_u32(3));
    scene.set_property("gravity", FbomData::from_vec3f(glam::Vec3::new(0.0, -9.81, 0.0)));

    let mut mesh = FbomObject::new("Mesh");
    mesh.set_property("vertex_count", FbomData::from_u64(1024));
    mesh.set_property("double_sided", FbomData::from_bool(false));
    scene.add_child(mesh);

    let mut light = FbomObject::new("Light");
    light.set_property("energy", FbomData::from_f32(4.5));
    scene.add_child(light);

    scene
}

#[test]
fn test_roundtrip_scene_hierarchy() {
    init_logging();
    let scene = build_scene();
    let bytes = fbom::object_to_bytes(&scene).expect("Failed to serialize scene");
    let decoded = fbom::object_from_bytes(&bytes).expect("Failed to parse stream");

    assert_eq!(decoded.ty().name, "Scene");
    assert_eq!(decoded.child_count(), 2);
    assert_eq!(decoded.get_property("name").read_string().unwrap(), "main");
    assert_eq!(decoded.get_property("version").read_u32().unwrap(), 3);
    assert_eq!(
        decoded.get_property("gravity").read_vec3f().unwrap(),
        glam::Vec3::new(0.0, -9.81, 0.0)
    );

    let mesh = decoded.child_by_type("Mesh").expect("Mesh child missing");
    assert_eq!(mesh.get_property("vertex_count").read_u64().unwrap(), 1024);
    assert!(!mesh.get_property("double_sided").read_bool().unwrap());

    let light = decoded.child_by_type("Light").expect("Light child missing");
    assert_eq!(light.get_property("energy").read_f32().unwrap(), 4.5);

    // Structural identity survives the wire.
    assert_eq!(decoded, scene);
    assert_eq!(decoded.unique_id(), scene.unique_id());
}

#[test]
fn test_node_tree_end_to_end() {
    let mut root = FbomObject::new("Node");
    root.set_property("name", FbomData::from_string("Root"));
    root.set_property("position", FbomData::from_vec3f(glam::Vec3::new(1.0, 2.0, 3.0)));

    let mut child = FbomObject::new("Node");
    child.set_property("name", FbomData::from_string("Child"));
    root.add_child(child);

    let bytes = fbom::object_to_bytes(&root).unwrap();
    let decoded = fbom::object_from_bytes(&bytes).unwrap();

    assert_eq!(decoded.child_count(), 1);
    assert_eq!(decoded.get_property("name").read_string().unwrap(), "Root");
    assert_eq!(
        decoded.get_property("position").read_vec3f().unwrap(),
        glam::Vec3::new(1.0, 2.0, 3.0)
    );
    assert_eq!(
        decoded.children()[0].get_property("name").read_string().unwrap(),
        "Child"
    );
}

#[test]
fn test_roundtrip_nested_object_property() {
    let mut transform = FbomObject::new("Transform");
    transform.set_property("matrix", FbomData::from_mat4f(glam::Mat4::IDENTITY));

    let mut node = FbomObject::new("Node");
    node.set_property("transform", FbomData::from_object(transform));

    let bytes = fbom::object_to_bytes(&node).unwrap();
    let decoded = fbom::object_from_bytes(&bytes).unwrap();

    let transform = decoded.get_property("transform").as_object().unwrap();
    assert_eq!(transform.ty().name, "Transform");
    assert_eq!(
        transform.get_property("matrix").read_mat4f().unwrap(),
        glam::Mat4::IDENTITY
    );
}

#[test]
fn test_dedup_shrinks_repeated_subtrees() {
    let mut material = FbomObject::new("Material");
    material.set_property("name", FbomData::from_string("brushed_steel"));
    material.set_property("roughness", FbomData::from_f32(0.35));
    material.set_property("base_color", FbomData::from_vec4f(glam::Vec4::splat(0.8)));

    let mut shared_root = FbomObject::new("Scene");
    let mut distinct_root = FbomObject::new("Scene");
    for i in 0..8u32 {
        shared_root.add_child(material.clone());

        let mut unique = material.clone();
        unique.set_property("index", FbomData::from_u32(i));
        distinct_root.add_child(unique);
    }

    let shared = fbom::object_to_bytes(&shared_root).unwrap();
    let distinct = fbom::object_to_bytes(&distinct_root).unwrap();
    assert!(
        shared.len() < distinct.len(),
        "repeated subtrees should pool: {} vs {}",
        shared.len(),
        distinct.len()
    );

    let decoded = fbom::object_from_bytes(&shared).unwrap();
    assert_eq!(decoded.child_count(), 8);
    for child in decoded.children() {
        assert_eq!(child, &decoded.children()[0]);
    }
}

#[test]
fn test_file_roundtrip() {
    init_logging();
    let temp = NamedTempFile::new().expect("Failed to create temp file");
    let path = temp.path();

    let scene = build_scene();
    fbom::write_file(path, &scene).expect("Failed to write file");

    let decoded = fbom::read_file(path).expect("Failed to read file");
    assert_eq!(decoded, scene);
}

#[test]
fn test_read_missing_file() {
    let err = fbom::read_file("/nonexistent/path/scene.fbom").unwrap_err();
    assert!(matches!(err, Error::FileNotFound(_)));
}

#[test]
fn test_object_library_roundtrip() {
    let mut library = FbomObjectLibrary::new(LibraryId(0x5EED));
    let mut texture = FbomObject::new("Texture");
    texture.set_property("path", FbomData::from_string("albedo.png"));
    let index = library.add_object(texture);

    let mut reference = FbomObject::new("Texture");
    reference.set_external(ExternalObjectInfo::linked(LibraryId(0x5EED), index));
    let mut scene = FbomObject::new("Scene");
    scene.add_child(reference);

    let mut writer = FbomWriter::new();
    writer.append_library(library);
    writer.append(scene);
    let bytes = writer.emit().unwrap();

    let mut reader = FbomReader::new(&bytes).unwrap();
    let decoded = reader.read_root().unwrap();
    let resolved = &decoded.children()[0];
    assert_eq!(
        resolved.get_property("path").read_string().unwrap(),
        "albedo.png"
    );
    assert_eq!(reader.libraries().len(), 1);
}

#[derive(Default, Clone, PartialEq, Debug)]
struct Camera {
    label: String,
    position: glam::Vec3,
    fov: f32,
    active: bool,
}

fn register_camera() {
    // Global registry; repeated registration across tests just
    // overwrites the same entry.
    ClassBuilder::<Camera>::new("Camera")
        .member("label", |c: &Camera| c.label.clone(), |c, v| c.label = v)
        .member("position", |c: &Camera| c.position, |c, v| c.position = v)
        .member("fov", |c: &Camera| c.fov, |c, v| c.fov = v)
        .member("active", |c: &Camera| c.active, |c, v| c.active = v)
        .register();
}

#[test]
fn test_native_value_roundtrip() {
    register_camera();

    let camera = Camera {
        label: "hero_cam".to_string(),
        position: glam::Vec3::new(0.0, 1.6, -4.0),
        fov: 68.0,
        active: true,
    };

    let bytes = fbom::to_bytes(&camera).expect("Failed to serialize camera");
    let restored: Camera = fbom::from_bytes(&bytes).expect("Failed to deserialize camera");
    assert_eq!(restored, camera);
}

#[test]
fn test_unregistered_type_errors() {
    struct Unregistered;
    let err = fbom::to_bytes(&Unregistered).unwrap_err();
    assert!(matches!(err, Error::NoMarshalRegistered(_)));
}

#[test]
fn test_deserialize_without_marshal_errors() {
    // A keyed object type whose native key was never registered.
    let object = FbomObject::with_type(ty::object_type_keyed(
        "Ghost",
        TypeKey::from_name("tests::Ghost"),
    ));
    let bytes = fbom::object_to_bytes(&object).unwrap();

    let mut reader = FbomReader::new(&bytes).unwrap();
    let err = reader
        .deserialize::<()>(MarshalRegistry::global())
        .unwrap_err();
    assert!(matches!(err, Error::NoMarshalRegistered(_)));
}

/// Hand-built big-endian stream: the reader must detect the marker and
/// byte-swap every integer field and flat payload.
#[test]
fn test_reads_big_endian_stream() {
    fn put_string(out: &mut Vec<u8>, s: &str) {
        out.write_u32::<BigEndian>(s.len() as u32).unwrap();
        out.extend_from_slice(s.as_bytes());
    }

    fn put_type_body(out: &mut Vec<u8>, ty: &FbomType) {
        put_string(out, &ty.name);
        out.push(ty.flags);
        out.write_u64::<BigEndian>(ty.size).unwrap();
        out.write_u64::<BigEndian>(ty.native.value()).unwrap();
        match &ty.extends {
            Some(parent) => {
                out.push(1);
                put_type_body(out, parent);
            }
            None => out.push(0),
        }
    }

    let mut out = Vec::new();
    out.extend_from_slice(b"FBOM");
    out.push(0x02); // big-endian marker
    out.push(0);
    out.write_u16::<BigEndian>(format::CURRENT_VERSION).unwrap();
    out.extend_from_slice(&[0u8; 8]);

    // Empty static-data section.
    out.push(1); // static data start
    out.write_u32::<BigEndian>(0).unwrap();
    out.write_u32::<BigEndian>(0).unwrap();
    out.push(2); // static data end

    // Root object with one u32 property.
    out.push(3); // object start
    out.push(0);
    out.push(0); // inline type
    put_type_body(&mut out, FbomObject::new("Node").ty());
    out.write_u64::<BigEndian>(0xC0FFEE).unwrap(); // unique id
    out.write_u32::<BigEndian>(1).unwrap(); // property count
    put_string(&mut out, "answer");
    out.push(0); // inline data
    out.push(0); // inline type
    put_type_body(&mut out, &ty::u32_type());
    out.push(0); // bytes payload
    out.write_u32::<BigEndian>(4).unwrap();
    out.write_u32::<BigEndian>(42).unwrap();
    out.write_u32::<BigEndian>(0).unwrap(); // child count
    out.push(4); // object end

    let mut reader = FbomReader::new(&out).unwrap();
    assert!(reader.swapped());
    let decoded = reader.read_root().unwrap();
    assert_eq!(decoded.ty().name, "Node");
    assert_eq!(decoded.unique_id(), UniqueId::new(0xC0FFEE));
    assert_eq!(decoded.get_property("answer").read_u32().unwrap(), 42);
}
