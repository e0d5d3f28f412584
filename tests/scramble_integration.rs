use std::collections::HashSet;
use std::fs;
use std::path::Path;

use tempfile::tempdir;

use graphutil::config::GraphConfig;
use graphutil::image_id::ImageId;
use graphutil::remap;

fn hex(c: char) -> String {
    c.to_string().repeat(64)
}

fn add_image(root: &Path, name: &str, cache_id: &str) {
    let image_dir = root.join("graph").join(name);
    fs::create_dir_all(&image_dir).unwrap();
    fs::write(image_dir.join("cache-id"), format!("{cache_id}\n")).unwrap();
    fs::create_dir_all(root.join("overlay").join(cache_id)).unwrap();
}

fn graph_names(root: &Path) -> Vec<String> {
    let mut names = fs::read_dir(root.join("graph"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect::<Vec<_>>();
    names.sort();
    names
}

#[test]
fn scramble_renames_single_image_and_rewrites_repositories_in_place() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    add_image(root, &hex('a'), &hex('b'));

    let repositories = root.join("repositories-overlay");
    let before = format!(
        "{{\"Repositories\":{{\"busybox\":{{\"latest\":\"{}\"}}}}}}",
        hex('a')
    );
    fs::write(&repositories, &before).unwrap();
    let offset = before.find(&hex('a')).unwrap();

    let config = GraphConfig::new(root, Some("overlay".into()));
    let report = remap::scramble(&config, false, |_| {}).unwrap();

    let names = graph_names(root);
    assert_eq!(names.len(), 1);
    assert_ne!(names[0], hex('a'));
    let new_id: ImageId = names[0].parse().unwrap();
    assert_eq!(report.remapped.len(), 1);
    assert_eq!(report.remapped[0].new_id, new_id);

    let after = fs::read_to_string(&repositories).unwrap();
    assert_eq!(after.len(), before.len());
    assert_eq!(&after[offset - 1..offset + 65], format!("\"{new_id}\""));
    assert_eq!(&after[..offset], &before[..offset]);
    assert_eq!(&after[offset + 64..], &before[offset + 64..]);

    // The image keeps pointing at the same backing storage.
    assert_eq!(
        fs::read_to_string(root.join("graph").join(new_id.as_str()).join("cache-id")).unwrap(),
        format!("{}\n", hex('b'))
    );
}

#[test]
fn scramble_keeps_cross_references_between_images_consistent() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    add_image(root, &hex('1'), &hex('2'));
    add_image(root, &hex('3'), &hex('4'));

    // Child metadata names its parent; both get renamed in the same run.
    fs::write(
        root.join("graph").join(hex('3')).join("json"),
        format!("{{\"id\":\"{}\",\"parent\":\"{}\"}}", hex('3'), hex('1')),
    )
    .unwrap();
    fs::write(
        root.join("graph").join(hex('1')).join("json"),
        format!("{{\"id\":\"{}\"}}", hex('1')),
    )
    .unwrap();

    let config = GraphConfig::new(root, Some("overlay".into()));
    let report = remap::scramble(&config, false, |_| {}).unwrap();
    assert_eq!(report.remapped.len(), 2);

    let new_of = |old: char| {
        report
            .remapped
            .iter()
            .find(|entry| entry.old_id.as_str() == hex(old))
            .map(|entry| entry.new_id.to_string())
            .unwrap()
    };
    let parent = new_of('1');
    let child = new_of('3');

    assert_eq!(
        fs::read_to_string(root.join("graph").join(&child).join("json")).unwrap(),
        format!("{{\"id\":\"{child}\",\"parent\":\"{parent}\"}}")
    );
    assert_eq!(
        fs::read_to_string(root.join("graph").join(&parent).join("json")).unwrap(),
        format!("{{\"id\":\"{parent}\"}}")
    );
}

#[test]
fn scramble_leaves_ineligible_entries_alone() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    add_image(root, &hex('a'), &hex('b'));

    // Missing backing storage.
    let orphan = root.join("graph").join(hex('c'));
    fs::create_dir_all(&orphan).unwrap();
    fs::write(orphan.join("cache-id"), hex('d')).unwrap();
    // Wrong length.
    fs::create_dir_all(root.join("graph").join("_tmp")).unwrap();

    let config = GraphConfig::new(root, Some("overlay".into()));
    let report = remap::scramble(&config, false, |_| {}).unwrap();

    assert_eq!(report.remapped.len(), 1);
    assert_eq!(report.scan.missing_cache, 1);
    assert_eq!(report.scan.ignored, 1);
    assert!(orphan.exists());
    assert!(root.join("graph").join("_tmp").exists());
    assert!(!root.join("graph").join(hex('a')).exists());
}

#[test]
fn repeated_scrambles_never_reuse_ids() {
    let dir = tempdir().unwrap();
    let root = dir.path();
    for (name, cache) in [('1', '2'), ('3', '4'), ('5', '6')] {
        add_image(root, &hex(name), &hex(cache));
    }

    let config = GraphConfig::new(root, Some("overlay".into()));
    let mut seen: HashSet<String> = graph_names(root).into_iter().collect();
    for _ in 0..3 {
        let report = remap::scramble(&config, false, |_| {}).unwrap();
        assert_eq!(report.remapped.len(), 3);
        for entry in &report.remapped {
            assert!(seen.insert(entry.new_id.to_string()));
        }
    }
    assert_eq!(graph_names(root).len(), 3);
}
