//! Diff-merge reconciliation against an existing file

use super::support::{array, checksum_at, structure};
use grove::container::AttrValue;
use grove::{
    read, save, Metadata, SaveData, SaveOptions, Tree, TreeScope, WriteError, WriteMode,
};
use tempfile::TempDir;

fn options(mode: WriteMode) -> SaveOptions {
    SaveOptions {
        mode,
        scope: TreeScope::Full,
        target: None,
    }
}

fn targeted(mode: WriteMode, target: &str) -> SaveOptions {
    SaveOptions {
        mode,
        scope: TreeScope::Full,
        target: Some(target.to_string()),
    }
}

/// Build and save a tree `r` containing `A` with payload `p1`.
fn seed(dest: &std::path::Path, values: Vec<f64>) {
    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let a = tree.add_node("A", array(values));
    tree.attach(root, a).unwrap();
    save(dest, &mut tree, SaveData::Node(root), &options(WriteMode::Write)).unwrap();
}

#[test]
fn test_appendover_replaces_append_preserves() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");
    seed(&dest, vec![1.0, 1.0]);
    let p1 = checksum_at(&dest, "r/A");

    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let a = tree.add_node("A", array(vec![2.0, 2.0]));
    tree.attach(root, a).unwrap();

    // plain append skips the conflicting node
    save(&dest, &mut tree, SaveData::Node(root), &options(WriteMode::Append)).unwrap();
    assert_eq!(checksum_at(&dest, "r/A"), p1);

    // appendover replaces it
    save(&dest, &mut tree, SaveData::Node(root), &options(WriteMode::AppendOver)).unwrap();
    let p2 = checksum_at(&dest, "r/A");
    assert_ne!(p2, p1);

    let expected = match tree.payload(a) {
        grove::Payload::Array(data) => data.checksum(),
        _ => unreachable!(),
    };
    assert_eq!(p2, expected);
}

#[test]
fn test_append_adds_new_descendants() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");
    seed(&dest, vec![1.0]);
    let p1 = checksum_at(&dest, "r/A");

    // same positions, A carries different data, plus a new child A/B
    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let a = tree.add_node("A", array(vec![7.0]));
    let b = tree.add_node("B", array(vec![8.0]));
    tree.attach(root, a).unwrap();
    tree.attach(a, b).unwrap();

    save(&dest, &mut tree, SaveData::Node(root), &options(WriteMode::Append)).unwrap();
    assert_eq!(structure(&dest), vec!["A".to_string(), "A/B".to_string()]);
    // the conflicting node kept its original payload
    assert_eq!(checksum_at(&dest, "r/A"), p1);
}

#[test]
fn test_root_metadata_merge_semantics() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");

    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let a = tree.add_node("A", array(vec![1.0]));
    tree.attach(root, a).unwrap();
    let mut m1 = Metadata::new("m1");
    m1.insert("k", 1i64);
    tree.put_metadata(root, m1);
    save(&dest, &mut tree, SaveData::Node(root), &options(WriteMode::Write)).unwrap();

    // second tree: m1 changed, m2 new
    let mut tree2 = Tree::new();
    let root2 = tree2.add_root("r");
    let mut m1b = Metadata::new("m1");
    m1b.insert("k", 2i64);
    let mut m2 = Metadata::new("m2");
    m2.insert("fresh", true);
    tree2.put_metadata(root2, m1b);
    tree2.put_metadata(root2, m2);

    // append: the absent bundle is added, the present one left alone
    save(&dest, &mut tree2, SaveData::Node(root2), &options(WriteMode::Append)).unwrap();
    let result = read::read(&dest, None).unwrap();
    let bundles = result.tree.metadata(result.node);
    assert_eq!(bundles["m1"].get("k"), Some(&AttrValue::Int(1)));
    assert_eq!(bundles["m2"].get("fresh"), Some(&AttrValue::Bool(true)));

    // appendover: the present bundle is replaced wholesale
    save(&dest, &mut tree2, SaveData::Node(root2), &options(WriteMode::AppendOver)).unwrap();
    let result = read::read(&dest, None).unwrap();
    let bundles = result.tree.metadata(result.node);
    assert_eq!(bundles["m1"].get("k"), Some(&AttrValue::Int(2)));
}

#[test]
fn test_diffmerge_b_merges_at_target() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");
    seed(&dest, vec![1.0]);
    let p1 = checksum_at(&dest, "r/A");

    // runtime tree mirrors the file and adds A/C
    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let a = tree.add_node("A", array(vec![5.0]));
    let c = tree.add_node("C", array(vec![6.0]));
    tree.attach(root, a).unwrap();
    tree.attach(a, c).unwrap();

    save(
        &dest,
        &mut tree,
        SaveData::Node(root),
        &targeted(WriteMode::Append, "r/A"),
    )
    .unwrap();

    assert_eq!(structure(&dest), vec!["A".to_string(), "A/C".to_string()]);
    assert_eq!(checksum_at(&dest, "r/A"), p1);
}

#[test]
fn test_diffmerge_b_source_below_target() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");
    seed(&dest, vec![1.0]);

    // source node A sits one step below the targeted root group
    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let a = tree.add_node("A", array(vec![5.0]));
    let c = tree.add_node("C", array(vec![6.0]));
    tree.attach(root, a).unwrap();
    tree.attach(a, c).unwrap();

    save(
        &dest,
        &mut tree,
        SaveData::Node(a),
        &targeted(WriteMode::AppendOver, "r"),
    )
    .unwrap();

    assert_eq!(structure(&dest), vec!["A".to_string(), "A/C".to_string()]);
    // appendover anchored at the source replaced A's payload
    let expected = match tree.payload(a) {
        grove::Payload::Array(data) => data.checksum(),
        _ => unreachable!(),
    };
    assert_eq!(checksum_at(&dest, "r/A"), expected);
}

#[test]
fn test_diffmerge_b_runtime_mismatch_is_fatal() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");
    seed(&dest, vec![1.0]);

    // the runtime tree has no node matching the on-disk target
    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let b = tree.add_node("B", array(vec![2.0]));
    tree.attach(root, b).unwrap();

    let err = save(
        &dest,
        &mut tree,
        SaveData::Node(root),
        &targeted(WriteMode::Append, "r/A"),
    )
    .unwrap_err();
    assert!(matches!(err, WriteError::PathMismatch(_)));
}

#[test]
fn test_invalid_target_path_is_fatal() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");
    seed(&dest, vec![1.0]);

    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let err = save(
        &dest,
        &mut tree,
        SaveData::Node(root),
        &targeted(WriteMode::Append, "r/missing/deep"),
    )
    .unwrap_err();
    assert!(matches!(err, WriteError::Path { .. }));
}

#[test]
fn test_new_root_with_target_requires_subtree() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");
    seed(&dest, vec![1.0]);

    // appending a not-yet-present root into a target can't exclude its subtree
    let mut tree = Tree::new();
    let root = tree.add_root("other");
    let a = tree.add_node("A", array(vec![2.0]));
    tree.attach(root, a).unwrap();

    let opts = SaveOptions {
        mode: WriteMode::Append,
        scope: TreeScope::NodeOnly,
        target: Some("r/A".to_string()),
    };
    let err = save(&dest, &mut tree, SaveData::Node(root), &opts).unwrap_err();
    assert!(matches!(err, WriteError::Mode(_)));
}

#[test]
fn test_target_naming_other_root_rejected() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");
    seed(&dest, vec![1.0]);

    // "r" exists but the target names a root that doesn't
    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let a = tree.add_node("A", array(vec![2.0]));
    tree.attach(root, a).unwrap();

    let err = save(
        &dest,
        &mut tree,
        SaveData::Node(root),
        &targeted(WriteMode::Append, "elsewhere/A"),
    )
    .unwrap_err();
    assert!(matches!(err, WriteError::Path { .. }));
}
