//! Conversion of the hosting environment's file descriptors into [`UploadedFile`] trees.
//!
//! Servers describe uploads as one record per form field holding five attributes:
//! `tmp_name`, `name`, `type`, `size` and `error`. For grouped fields such as
//! `files2[a]` or `files3[]` every attribute is itself a nested structure:
//!
//! ```json
//! { "files2": { "name": { "a": "a.jpg", "b": "b.jpg" }, "tmp_name": { "a": "/tmp/1", "b": "/tmp/2" }, ... } }
//! ```
//!
//! [`parse_uploaded_files`] turns that into a tree mirroring the form structure, where
//! every leaf is a complete [`FileSpec`]:
//!
//! ```json
//! { "files2": { "a": { "tmp_name": "/tmp/1", "name": "a.jpg", ... }, "b": { ... } } }
//! ```
//!
//! and [`convert_file_specs`] replaces each leaf with an [`UploadedFile`].

use super::{HostingMode, UploadErrorCode, UploadedFile};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::warn;

const TMP_NAME: &str = "tmp_name";
const NAME: &str = "name";
const TYPE: &str = "type";
const SIZE: &str = "size";
const ERROR: &str = "error";

/// The five attributes the server reports for one uploaded file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct FileSpec {
    pub tmp_name: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub error: i64,
}

/// A merged tree node; deserializes from the per-file layout, where any object holding a
/// `tmp_name` is a [`FileSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum FileSpecNode {
    Spec(FileSpec),
    Nested(FileSpecTree),
}

pub type FileSpecTree = BTreeMap<String, FileSpecNode>;

/// A node of an uploaded-file tree, either one file or a group of nested fields.
#[derive(Debug, Clone)]
pub enum UploadedFileNode {
    File(Arc<UploadedFile>),
    Nested(UploadedFiles),
}

impl UploadedFileNode {
    pub fn as_file(&self) -> Option<&Arc<UploadedFile>> {
        match self {
            Self::File(file) => Some(file),
            Self::Nested(_) => None,
        }
    }

    pub fn as_nested(&self) -> Option<&UploadedFiles> {
        match self {
            Self::File(_) => None,
            Self::Nested(files) => Some(files),
        }
    }
}

impl From<UploadedFile> for UploadedFileNode {
    fn from(file: UploadedFile) -> Self {
        Self::File(Arc::new(file))
    }
}

impl From<Arc<UploadedFile>> for UploadedFileNode {
    fn from(file: Arc<UploadedFile>) -> Self {
        Self::File(file)
    }
}

impl From<UploadedFiles> for UploadedFileNode {
    fn from(files: UploadedFiles) -> Self {
        Self::Nested(files)
    }
}

pub type UploadedFiles = BTreeMap<String, UploadedFileNode>;

/// Regroups per-attribute file descriptors into a tree of complete [`FileSpec`]s.
///
/// Fields without a `tmp_name`, or whose attributes cannot be read, are skipped.
pub fn parse_uploaded_files(files: &Value) -> FileSpecTree {
    let Some(fields) = files.as_object() else {
        return FileSpecTree::new();
    };

    let mut tree = FileSpecTree::new();
    for (field, descriptor) in fields {
        if let Some(node) = parse_field(field, descriptor) {
            tree.insert(field.clone(), node);
        }
    }
    tree
}

fn parse_field(field: &str, descriptor: &Value) -> Option<FileSpecNode> {
    let Some(attributes) = descriptor.as_object() else {
        warn!(field, "skip uploaded file field, descriptor is not an object");
        return None;
    };

    match attributes.get(TMP_NAME) {
        Some(Value::Object(_) | Value::Array(_)) => {
            let tree = regroup(attributes);
            if tree.is_empty() {
                warn!(field, "skip uploaded file field, no file found in nested descriptor");
                return None;
            }
            Some(FileSpecNode::Nested(tree))
        }
        Some(_) => {
            let spec = read_spec(field, |attr| attributes.get(attr))?;
            Some(FileSpecNode::Spec(spec))
        }
        // already grouped by field, e.g. a pre-normalized tree
        None => {
            let tree = parse_uploaded_files(descriptor);
            if tree.is_empty() {
                warn!(field, "skip uploaded file field, missing tmp_name");
                return None;
            }
            Some(FileSpecNode::Nested(tree))
        }
    }
}

/// Flattens every attribute into `path -> value` and rebuilds one record per `tmp_name` path.
fn regroup(attributes: &Map<String, Value>) -> FileSpecTree {
    let mut flattened: BTreeMap<&str, BTreeMap<Vec<String>, &Value>> = BTreeMap::new();
    for attr in [TMP_NAME, NAME, TYPE, SIZE, ERROR] {
        let mut leaves = BTreeMap::new();
        if let Some(value) = attributes.get(attr) {
            flatten(value, &mut Vec::new(), &mut leaves);
        }
        flattened.insert(attr, leaves);
    }

    let mut tree = FileSpecTree::new();
    let Some(tmp_names) = flattened.get(TMP_NAME) else {
        return tree;
    };

    for path in tmp_names.keys() {
        let field = path.join(".");
        let lookup = |attr: &str| flattened.get(attr).and_then(|leaves| leaves.get(path)).copied();
        if let Some(spec) = read_spec(&field, lookup) {
            insert_at(&mut tree, path, spec);
        }
    }
    tree
}

fn flatten<'a>(value: &'a Value, path: &mut Vec<String>, leaves: &mut BTreeMap<Vec<String>, &'a Value>) {
    match value {
        Value::Object(map) => {
            for (key, child) in map {
                path.push(key.clone());
                flatten(child, path, leaves);
                path.pop();
            }
        }
        Value::Array(items) => {
            for (idx, child) in items.iter().enumerate() {
                path.push(idx.to_string());
                flatten(child, path, leaves);
                path.pop();
            }
        }
        scalar => {
            leaves.insert(path.clone(), scalar);
        }
    }
}

fn insert_at(tree: &mut FileSpecTree, path: &[String], spec: FileSpec) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = tree;
    for key in parents {
        let node = current.entry(key.clone()).or_insert_with(|| FileSpecNode::Nested(FileSpecTree::new()));
        current = match node {
            FileSpecNode::Nested(children) => children,
            FileSpecNode::Spec(_) => return,
        };
    }
    current.insert(last.clone(), FileSpecNode::Spec(spec));
}

fn read_spec<'a>(field: &str, attribute: impl Fn(&str) -> Option<&'a Value>) -> Option<FileSpec> {
    let Some(tmp_name) = attribute(TMP_NAME).and_then(scalar_string) else {
        warn!(field, "skip uploaded file, tmp_name is not a string");
        return None;
    };

    let error = match attribute(ERROR) {
        None | Some(Value::Null) => 0,
        Some(value) => {
            let Some(error) = scalar_integer(value) else {
                warn!(field, error = %value, "skip uploaded file, error code is not an integer");
                return None;
            };
            error
        }
    };

    Some(FileSpec {
        tmp_name,
        name: attribute(NAME).and_then(scalar_string),
        media_type: attribute(TYPE).and_then(scalar_string),
        size: attribute(SIZE).and_then(scalar_integer).and_then(|size| u64::try_from(size).ok()),
        error,
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn scalar_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Replaces every [`FileSpec`] leaf with an [`UploadedFile`].
///
/// The source files are flagged as genuine uploads: they come from the hosting server.
/// Leaves with an unknown error code are kept with [`UploadErrorCode::Unknown`]; groups
/// left empty are dropped.
pub fn convert_file_specs(tree: &FileSpecTree, hosting: HostingMode) -> UploadedFiles {
    let mut files = UploadedFiles::new();
    for (key, node) in tree {
        match node {
            FileSpecNode::Spec(spec) => {
                let file = convert_spec(key, spec, hosting);
                files.insert(key.clone(), UploadedFileNode::File(Arc::new(file)));
            }
            FileSpecNode::Nested(children) => {
                let children = convert_file_specs(children, hosting);
                if !children.is_empty() {
                    files.insert(key.clone(), UploadedFileNode::Nested(children));
                }
            }
        }
    }
    files
}

fn convert_spec(field: &str, spec: &FileSpec, hosting: HostingMode) -> UploadedFile {
    let error = UploadErrorCode::from_code(spec.error);
    if let UploadErrorCode::Unknown(code) = error {
        warn!(field, code, "uploaded file reports an unknown error code");
    }

    let mut builder = UploadedFile::from_file(&spec.tmp_name).error(error).hosting(hosting).genuine_upload(true);
    if let Some(name) = &spec.name {
        builder = builder.client_filename(name);
    }
    if let Some(media_type) = &spec.media_type {
        builder = builder.client_media_type(media_type);
    }
    if let Some(size) = spec.size {
        builder = builder.size(size);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn files_fixture() -> Value {
        json!({
            // <input type="file" name="files1">
            "files1": {
                "name": "example1.jpg",
                "type": "image/jpeg",
                "tmp_name": "/tmp/php200A.tmp",
                "error": 0,
                "size": 100000
            },
            // <input type="file" name="files2[a]"> <input type="file" name="files2[b]">
            "files2": {
                "name": { "a": "example21.jpg", "b": "example22.jpg" },
                "type": { "a": "image/jpeg", "b": "image/jpeg" },
                "tmp_name": { "a": "/tmp/php343C.tmp", "b": "/tmp/php343D.tmp" },
                "error": { "a": 0, "b": 0 },
                "size": { "a": 125100, "b": 145000 }
            },
            // <input type="file" name="files3[]"> twice
            "files3": {
                "name": ["example31.jpg", "example32.jpg"],
                "type": ["image/jpeg", "image/jpeg"],
                "tmp_name": ["/tmp/php310C.tmp", "/tmp/php313D.tmp"],
                "error": [0, 0],
                "size": [200000, 300000]
            },
            // <input type="file" name="files4[details][avatar]">
            "files4": {
                "name": { "details": { "avatar": "my-avatar.png" } },
                "type": { "details": { "avatar": "image/png" } },
                "tmp_name": { "details": { "avatar": "/tmp/phpmFLrzD" } },
                "error": { "details": { "avatar": 0 } },
                "size": { "details": { "avatar": 90996 } }
            }
        })
    }

    fn spec(tmp_name: &str, name: &str, media_type: &str, size: u64) -> FileSpecNode {
        FileSpecNode::Spec(FileSpec {
            tmp_name: tmp_name.to_owned(),
            name: Some(name.to_owned()),
            media_type: Some(media_type.to_owned()),
            size: Some(size),
            error: 0,
        })
    }

    fn nested<const N: usize>(entries: [(&str, FileSpecNode); N]) -> FileSpecNode {
        FileSpecNode::Nested(entries.into_iter().map(|(k, v)| (k.to_owned(), v)).collect())
    }

    #[test]
    fn test_parse_uploaded_files() {
        let tree = parse_uploaded_files(&files_fixture());

        let expected: FileSpecTree = [
            ("files1", spec("/tmp/php200A.tmp", "example1.jpg", "image/jpeg", 100_000)),
            (
                "files2",
                nested([
                    ("a", spec("/tmp/php343C.tmp", "example21.jpg", "image/jpeg", 125_100)),
                    ("b", spec("/tmp/php343D.tmp", "example22.jpg", "image/jpeg", 145_000)),
                ]),
            ),
            (
                "files3",
                nested([
                    ("0", spec("/tmp/php310C.tmp", "example31.jpg", "image/jpeg", 200_000)),
                    ("1", spec("/tmp/php313D.tmp", "example32.jpg", "image/jpeg", 300_000)),
                ]),
            ),
            ("files4", nested([("details", nested([("avatar", spec("/tmp/phpmFLrzD", "my-avatar.png", "image/png", 90_996))]))])),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v))
        .collect();

        assert_eq!(tree, expected);
    }

    #[test]
    fn test_convert_file_specs() {
        let tree = parse_uploaded_files(&files_fixture());
        let files = convert_file_specs(&tree, HostingMode::Cli);

        let files1 = files["files1"].as_file().unwrap();
        assert_eq!(files1.path(), Some(std::path::Path::new("/tmp/php200A.tmp")));
        assert_eq!(files1.client_filename(), Some("example1.jpg"));
        assert_eq!(files1.client_media_type(), Some("image/jpeg"));
        assert_eq!(files1.size(), Some(100_000));
        assert_eq!(files1.error(), UploadErrorCode::Ok);

        let files2 = files["files2"].as_nested().unwrap();
        let a = files2["a"].as_file().unwrap();
        let b = files2["b"].as_file().unwrap();
        assert_eq!(a.path(), Some(std::path::Path::new("/tmp/php343C.tmp")));
        assert_eq!(a.client_filename(), Some("example21.jpg"));
        assert_eq!(a.size(), Some(125_100));
        assert_eq!(b.path(), Some(std::path::Path::new("/tmp/php343D.tmp")));
        assert_eq!(b.client_filename(), Some("example22.jpg"));
        assert_eq!(b.size(), Some(145_000));

        let files3 = files["files3"].as_nested().unwrap();
        assert_eq!(files3["1"].as_file().unwrap().client_filename(), Some("example32.jpg"));

        let avatar = files["files4"].as_nested().unwrap()["details"].as_nested().unwrap()["avatar"].as_file().unwrap();
        assert_eq!(avatar.client_media_type(), Some("image/png"));
        assert_eq!(avatar.size(), Some(90_996));
    }

    #[test]
    fn test_malformed_input_is_skipped() {
        assert!(parse_uploaded_files(&json!(null)).is_empty());
        assert!(parse_uploaded_files(&json!([])).is_empty());
        assert!(parse_uploaded_files(&json!({ "broken": { "name": "x.jpg" } })).is_empty());
        assert!(parse_uploaded_files(&json!({ "broken": "x.jpg" })).is_empty());
        assert!(parse_uploaded_files(&json!({ "broken": { "tmp_name": true } })).is_empty());

        let tree = parse_uploaded_files(&json!({
            "ok": { "tmp_name": "/tmp/ok", "error": "0", "size": "12" },
            "bad": { "tmp_name": "/tmp/bad", "error": "oops" }
        }));
        assert_eq!(tree.len(), 1);
        assert_eq!(
            tree["ok"],
            FileSpecNode::Spec(FileSpec { tmp_name: "/tmp/ok".to_owned(), name: None, media_type: None, size: Some(12), error: 0 })
        );
    }

    #[test]
    fn test_unknown_error_code_is_kept() {
        let tree = parse_uploaded_files(&json!({
            "single": { "tmp_name": "/tmp/a", "error": 5 },
            "group": { "tmp_name": { "x": "/tmp/b" }, "error": { "x": 9 } }
        }));
        assert_eq!(tree.len(), 2);

        let files = convert_file_specs(&tree, HostingMode::Server);
        let single = files["single"].as_file().unwrap();
        assert_eq!(single.error(), UploadErrorCode::Unknown(5));
        assert_eq!(single.error().message(), "Unknown upload error.");

        let grouped = &files["group"].as_nested().unwrap()["x"];
        assert_eq!(grouped.as_file().unwrap().error(), UploadErrorCode::Unknown(9));
    }

    #[test]
    fn test_error_codes_are_carried() {
        let tree = parse_uploaded_files(&json!({ "partial": { "tmp_name": "", "error": 3, "size": 0 } }));
        let files = convert_file_specs(&tree, HostingMode::Server);
        assert_eq!(files["partial"].as_file().unwrap().error(), UploadErrorCode::Partial);
    }

    #[test]
    fn test_deserialize_merged_tree() {
        let tree: FileSpecTree = serde_json::from_value(json!({
            "avatar": { "tmp_name": "/tmp/a", "name": "a.png", "type": "image/png", "size": 10 },
            "docs": { "first": { "tmp_name": "/tmp/b", "error": 4 } }
        }))
        .unwrap();

        assert_eq!(
            tree["avatar"],
            FileSpecNode::Spec(FileSpec {
                tmp_name: "/tmp/a".to_owned(),
                name: Some("a.png".to_owned()),
                media_type: Some("image/png".to_owned()),
                size: Some(10),
                error: 0,
            })
        );

        let files = convert_file_specs(&tree, HostingMode::Cli);
        let first = files["docs"].as_nested().unwrap()["first"].as_file().unwrap();
        assert_eq!(first.error(), UploadErrorCode::NoFile);
    }
}
