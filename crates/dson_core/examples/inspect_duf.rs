//! Example: Import and inspect a DSON scene.
//!
//! Run with: cargo run --example inspect_duf -- /path/to/content/scene.duf
//!
//! Set `DSON_CONTENT_ROOT` to the content library the scene references.

use std::env;

use dson_core::{import_file, ImportConfig};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        println!("Usage: inspect_duf <path-to-duf-file> [morph=value ...]");
        println!("\nExamples:");
        println!("  cargo run --example inspect_duf -- content/People/figure.duf");
        println!("  cargo run --example inspect_duf -- content/People/figure.duf Body:PBMBelly=0.5");
        return Ok(());
    }

    let path = &args[1];
    println!("Importing DSON file: {}", path);

    let config = ImportConfig::from_env();
    let mut scene = import_file(path, &config)?;

    for assignment in &args[2..] {
        let Some((target, value)) = assignment.split_once('=') else {
            eprintln!("Ignoring malformed assignment {}", assignment);
            continue;
        };
        let Some((object, morph)) = target.split_once(':') else {
            eprintln!("Expected <object>:<morph>=<value>, got {}", assignment);
            continue;
        };
        let value: f64 = value.parse()?;
        let applied = scene.set_morph_value(object, morph, value)?;
        println!("Set {}:{} = {} (applied: {})", object, morph, value, applied);
    }

    println!("\n--- Objects ---");
    for object in &scene.objects {
        let t = &object.transform;
        match object.mesh() {
            Some(mesh) => println!(
                "  {} ({:?}) - {} vertices, {} faces, {} shape keys, {} groups, {} morphs",
                object.name,
                object.kind,
                mesh.vertex_count(),
                mesh.face_count(),
                mesh.shape_keys.len(),
                mesh.vertex_groups.len(),
                object.morphs.len()
            ),
            None => println!("  {} ({:?}) - empty", object.name, object.kind),
        }
        println!(
            "       Location: ({:.3}, {:.3}, {:.3})  Parent: {:?}",
            t.location.x, t.location.y, t.location.z, object.parent
        );
    }

    if let Some(armature) = &scene.armature {
        println!("\n--- Armature: {} ({} bones) ---", armature.name, armature.bone_count());
        for bone in armature.bones() {
            let head = bone.segment().head;
            println!(
                "  {} <- {} at ({:.3}, {:.3}, {:.3})",
                bone.name,
                bone.parent.as_deref().unwrap_or("-"),
                head.x,
                head.y,
                head.z
            );
        }
    }

    println!("\n--- Materials ---");
    for material in &scene.materials {
        println!(
            "  {} [{}] on {} (textured: {})",
            material.name,
            material.kind,
            material.object.as_deref().unwrap_or("-"),
            material.has_textures()
        );
    }

    if !scene.diagnostics.is_empty() {
        println!("\n--- Diagnostics ({}) ---", scene.diagnostics.len());
        for diagnostic in scene.diagnostics.iter() {
            println!("  {}", diagnostic);
        }
    }

    Ok(())
}
