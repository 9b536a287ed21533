//! Stable JSON encoding shared by every artifact writer.
//!
//! Two encodings are provided:
//! - `canonical_json_bytes`: compact, key-sorted bytes used as hash material
//! - `stable_json_string`: key-sorted, two-space indented text used on disk
//!
//! Neither relies on map iteration order: object keys are sorted explicitly
//! at every level, so the output is byte-identical for logically identical
//! input regardless of how the `Value` was built.

use crate::error::StableJsonError;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Serialize any value into its stable on-disk text form (no trailing newline).
pub fn to_stable_json<T: Serialize + ?Sized>(value: &T) -> Result<String, StableJsonError> {
    let value = serde_json::to_value(value)?;
    Ok(stable_json_string(&value))
}

/// Serialize any value into compact canonical bytes.
pub fn to_canonical_bytes<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, StableJsonError> {
    let value = serde_json::to_value(value)?;
    Ok(canonical_json_bytes(&value))
}

/// Compact canonical encoding: sorted keys, no whitespace.
pub fn canonical_json_bytes(value: &Value) -> Vec<u8> {
    match value {
        Value::Null => b"null".to_vec(),
        Value::Bool(true) => b"true".to_vec(),
        Value::Bool(false) => b"false".to_vec(),
        Value::Number(n) => n.to_string().into_bytes(),
        Value::String(s) => encode_string(s).into_bytes(),
        Value::Array(items) => {
            let mut out = Vec::new();
            out.push(b'[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(b',');
                }
                out.extend(canonical_json_bytes(item));
            }
            out.push(b']');
            out
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();

            let mut out = Vec::new();
            out.push(b'{');
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    out.push(b',');
                }
                out.extend(encode_string(key).into_bytes());
                out.push(b':');
                if let Some(item) = map.get(*key) {
                    out.extend(canonical_json_bytes(item));
                }
            }
            out.push(b'}');
            out
        }
    }
}

/// Indented canonical encoding: sorted keys, two-space indent.
pub fn stable_json_string(value: &Value) -> String {
    let mut out = String::new();
    write_indented(value, 0, &mut out);
    out
}

fn write_indented(value: &Value, depth: usize, out: &mut String) {
    match value {
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Array(items) => {
            out.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push('\n');
                push_indent(depth + 1, out);
                write_indented(item, depth + 1, out);
            }
            out.push('\n');
            push_indent(depth, out);
            out.push(']');
        }
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            out.push('{');
            for (idx, key) in keys.iter().enumerate() {
                if idx > 0 {
                    out.push(',');
                }
                out.push('\n');
                push_indent(depth + 1, out);
                out.push_str(&encode_string(key));
                out.push_str(": ");
                if let Some(item) = map.get(*key) {
                    write_indented(item, depth + 1, out);
                }
            }
            out.push('\n');
            push_indent(depth, out);
            out.push('}');
        }
        scalar => out.push_str(&String::from_utf8_lossy(&canonical_json_bytes(scalar))),
    }
}

fn push_indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn encode_string(s: &str) -> String {
    // serde_json string escaping is total for &str.
    serde_json::to_string(s).unwrap_or_else(|_| format!("\"{s}\""))
}

/// Lowercase hex SHA-256 of raw bytes.
pub fn sha256_hex(bytes: &[u8]) -> String {
    hex_lower(&Sha256::digest(bytes))
}

/// Lowercase hex SHA-256 of the canonical encoding of `value`.
pub fn digest_value(value: &Value) -> String {
    sha256_hex(&canonical_json_bytes(value))
}

fn hex_lower(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(bytes.len() * 2);
    for byte in bytes {
        out.push(HEX[(byte >> 4) as usize] as char);
        out.push(HEX[(byte & 0x0f) as usize] as char);
    }
    out
}

/// Express `path` relative to `root` with forward slashes.
///
/// Paths outside `root` are returned whole, still forward-slashed.
pub fn relativize_path(root: &Path, path: &Path) -> String {
    let rendered = match path.strip_prefix(root) {
        Ok(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Ok(rel) => rel.to_string_lossy().into_owned(),
        Err(_) => path.to_string_lossy().into_owned(),
    };
    rendered.replace('\\', "/")
}

/// Write `value` as stable JSON plus a trailing newline, atomically.
pub fn write_stable_json<T: Serialize + ?Sized>(
    path: impl AsRef<Path>,
    value: &T,
) -> Result<(), StableJsonError> {
    let text = to_stable_json(value)?;
    write_text_atomic(path, &format!("{text}\n"))
}

/// Replace `path` with `contents` via a temp file and rename.
pub fn write_text_atomic(path: impl AsRef<Path>, contents: &str) -> Result<(), StableJsonError> {
    let path = path.as_ref();
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(|e| StableJsonError::io(parent, e))?;
    }

    let tmp_path = tmp_write_path(path);
    let write_result = (|| -> Result<(), StableJsonError> {
        let mut file = File::create(&tmp_path).map_err(|e| StableJsonError::io(&tmp_path, e))?;
        file.write_all(contents.as_bytes())
            .map_err(|e| StableJsonError::io(&tmp_path, e))?;
        file.sync_all()
            .map_err(|e| StableJsonError::io(&tmp_path, e))?;
        Ok(())
    })();

    if let Err(error) = write_result {
        let _ = fs::remove_file(&tmp_path);
        return Err(error);
    }

    fs::rename(&tmp_path, path).map_err(|e| {
        let _ = fs::remove_file(&tmp_path);
        StableJsonError::io(path, e)
    })
}

fn tmp_write_path(path: &Path) -> PathBuf {
    let unique = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    let mut tmp: OsString = path.as_os_str().to_os_string();
    tmp.push(format!(".tmp.{}.{}", std::process::id(), unique));
    PathBuf::from(tmp)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn canonical_bytes_sort_keys_at_every_level() {
        let a = json!({"b": 1, "a": {"d": [1, 2], "c": null}});
        let b = json!({"a": {"c": null, "d": [1, 2]}, "b": 1});
        assert_eq!(canonical_json_bytes(&a), canonical_json_bytes(&b));
        assert_eq!(
            String::from_utf8(canonical_json_bytes(&a)).unwrap(),
            r#"{"a":{"c":null,"d":[1,2]},"b":1}"#
        );
    }

    #[test]
    fn stable_string_layout() {
        let value = json!({"zeta": [], "alpha": {"k": "v", "e": {}}, "mid": [1, true]});
        insta::assert_snapshot!(stable_json_string(&value), @r#"
        {
          "alpha": {
            "e": {},
            "k": "v"
          },
          "mid": [
            1,
            true
          ],
          "zeta": []
        }
        "#);
    }

    #[test]
    fn digest_is_order_insensitive() {
        let a = json!({"x": "1", "y": "2"});
        let b = json!({"y": "2", "x": "1"});
        assert_eq!(digest_value(&a), digest_value(&b));
        assert_eq!(digest_value(&a).len(), 64);
    }

    #[test]
    fn relativize_inside_and_outside_root() {
        let root = Path::new("/work/repo");
        assert_eq!(
            relativize_path(root, Path::new("/work/repo/out/run/manifest.json")),
            "out/run/manifest.json"
        );
        assert_eq!(relativize_path(root, Path::new("/work/repo")), ".");
        assert_eq!(
            relativize_path(root, Path::new("/elsewhere/file.json")),
            "/elsewhere/file.json"
        );
    }

    #[test]
    fn write_stable_json_appends_newline() {
        let unique = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock should be after unix epoch")
            .as_nanos();
        let path = std::env::temp_dir().join(format!(
            "parity-stable-json-{}-{unique}/out.json",
            std::process::id()
        ));
        write_stable_json(&path, &json!({"b": 2, "a": 1})).expect("write should succeed");
        let text = fs::read_to_string(&path).expect("file should exist");
        assert_eq!(text, "{\n  \"a\": 1,\n  \"b\": 2\n}\n");
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }
}
