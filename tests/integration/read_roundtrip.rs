//! Read-side reconstruction and bare-data wrapping

use super::support::{array, structure};
use grove::container::{AttrValue, Values};
use grove::payload::{ArrayData, RecordList};
use grove::{read, save, Metadata, Payload, SaveData, SaveOptions, Tree, TreeScope, WriteMode};
use std::collections::BTreeMap;
use tempfile::TempDir;

fn options(mode: WriteMode) -> SaveOptions {
    SaveOptions {
        mode,
        scope: TreeScope::Full,
        target: None,
    }
}

#[test]
fn test_rootless_node_round_trip() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");

    let mut tree = Tree::new();
    let x = tree.add_node("X", array(vec![1.0]));
    assert!(tree.is_rootless(x));

    save(&dest, &mut tree, SaveData::Node(x), &options(WriteMode::Write)).unwrap();

    // no observable mutation of the input's rootedness
    assert!(tree.is_rootless(x));
    assert_eq!(tree.parent(x), None);
    // the single top-level group carries the node's name
    assert_eq!(read::root_names(&dest).unwrap(), vec!["X".to_string()]);
}

#[test]
fn test_read_reconstructs_payloads_and_metadata() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");

    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let mut cal = Metadata::new("calibration");
    cal.insert("pixel_size", 0.13);
    tree.put_metadata(root, cal.clone());

    let a = tree.add_node("A", array(vec![1.0, 2.0, 3.0]));
    let mut records = RecordList::new();
    records.push_column("qx", Values::F64(vec![0.5, 0.7])).unwrap();
    records.push_column("n", Values::I64(vec![3, 4])).unwrap();
    let p = tree.add_node("peaks", Payload::Records(records.clone()));
    tree.attach(root, a).unwrap();
    tree.attach(a, p).unwrap();

    save(&dest, &mut tree, SaveData::Node(root), &options(WriteMode::Write)).unwrap();

    let result = read::read(&dest, None).unwrap();
    assert_eq!(result.tree.name(result.node), "r");
    assert_eq!(result.tree.metadata(result.node)["calibration"], cal);

    let a_back = result.tree.node_at(result.node, "A").unwrap();
    assert_eq!(result.tree.payload(a_back), tree.payload(a));
    let p_back = result.tree.node_at(result.node, "A/peaks").unwrap();
    assert_eq!(result.tree.payload(p_back), &Payload::Records(records));
}

#[test]
fn test_read_target_path() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");

    let mut tree = Tree::new();
    let root = tree.add_root("r");
    let a = tree.add_node("A", array(vec![1.0]));
    let b = tree.add_node("B", array(vec![2.0]));
    tree.attach(root, a).unwrap();
    tree.attach(a, b).unwrap();
    save(&dest, &mut tree, SaveData::Node(root), &options(WriteMode::Write)).unwrap();

    let result = read::read(&dest, Some("r/A/B")).unwrap();
    assert_eq!(result.tree.name(result.node), "B");
    assert_eq!(result.tree.treepath(result.node), "A/B");
    assert_eq!(result.tree.payload(result.node), tree.payload(b));

    assert!(read::read(&dest, Some("r/A/C")).is_err());
}

#[test]
fn test_bare_array_is_wrapped() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");

    let data = ArrayData::new(vec![2], Values::F64(vec![1.0, 2.0])).unwrap();
    let mut tree = Tree::new();
    save(&dest, &mut tree, SaveData::Array(data.clone()), &options(WriteMode::Write)).unwrap();

    assert_eq!(read::root_names(&dest).unwrap(), vec!["root".to_string()]);
    let result = read::read(&dest, Some("root/array")).unwrap();
    assert_eq!(result.tree.payload(result.node), &Payload::Array(data));
}

#[test]
fn test_bare_dict_becomes_root_metadata() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");

    let mut items = BTreeMap::new();
    items.insert("voltage".to_string(), AttrValue::Int(300));
    let mut tree = Tree::new();
    save(&dest, &mut tree, SaveData::Dict(items), &options(WriteMode::Write)).unwrap();

    let result = read::read(&dest, None).unwrap();
    let bundles = result.tree.metadata(result.node);
    assert_eq!(bundles["dictionary"].get("voltage"), Some(&AttrValue::Int(300)));
}

#[test]
fn test_mixed_list_shares_one_root() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");

    let mut tree = Tree::new();
    let node = tree.add_node("probe", array(vec![4.0]));
    let a0 = ArrayData::new(vec![1], Values::F64(vec![1.0])).unwrap();
    let a1 = ArrayData::new(vec![1], Values::F64(vec![2.0])).unwrap();
    let items = vec![
        SaveData::Array(a0),
        SaveData::Array(a1),
        SaveData::Node(node),
    ];
    save(&dest, &mut tree, SaveData::List(items), &options(WriteMode::Write)).unwrap();

    // the caller's node is rootless again afterwards
    assert!(tree.is_rootless(node));
    assert_eq!(read::root_names(&dest).unwrap(), vec!["root".to_string()]);
    assert_eq!(
        structure(&dest),
        vec![
            "array_0".to_string(),
            "array_1".to_string(),
            "probe".to_string()
        ]
    );
}

#[test]
fn test_list_of_roots_saves_successive_trees() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");

    let mut tree = Tree::new();
    let r1 = tree.add_root("one");
    let a = tree.add_node("A", array(vec![1.0]));
    tree.attach(r1, a).unwrap();
    let r2 = tree.add_root("two");
    let b = tree.add_node("B", array(vec![2.0]));
    tree.attach(r2, b).unwrap();

    let items = vec![SaveData::Node(r1), SaveData::Node(r2)];
    save(&dest, &mut tree, SaveData::List(items), &options(WriteMode::Write)).unwrap();

    let mut roots = read::root_names(&dest).unwrap();
    roots.sort();
    assert_eq!(roots, vec!["one".to_string(), "two".to_string()]);
}

#[test]
fn test_list_mixing_roots_and_nodes_rejected() {
    let dir = TempDir::new().unwrap();
    let dest = dir.path().join("data.grove");

    let mut tree = Tree::new();
    let r1 = tree.add_root("one");
    let stray = tree.add_node("stray", array(vec![1.0]));

    let items = vec![SaveData::Node(r1), SaveData::Node(stray)];
    let err = save(&dest, &mut tree, SaveData::List(items), &options(WriteMode::Write)).unwrap_err();
    assert!(matches!(err, grove::WriteError::Mode(_)));
}
