// Dot-path addressing into a message's JSON property tree.

use crate::Core::error::{BridgeError, Result};
use serde_json::{Map, Value};

fn segments(path: &str) -> Result<Vec<&str>> {
    if path.is_empty() {
        return Ok(Vec::new());
    }
    let segs: Vec<&str> = path.split('.').collect();
    if segs.iter().any(|s| s.is_empty()) {
        return Err(BridgeError::invalid(format!(
            "malformed property path '{}'",
            path
        )));
    }
    Ok(segs)
}

/// Resolve `path`. Numeric segments index into arrays.
pub(super) fn lookup<'a>(root: &'a Value, path: &str) -> Result<Option<&'a Value>> {
    let mut cur = root;
    for seg in segments(path)? {
        let next = match cur {
            Value::Object(map) => map.get(seg),
            Value::Array(items) => seg.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        };
        match next {
            Some(v) => cur = v,
            None => return Ok(None),
        }
    }
    Ok(Some(cur))
}

fn ensure_object(v: &mut Value) -> &mut Map<String, Value> {
    if !v.is_object() {
        *v = Value::Object(Map::new());
    }
    match v {
        Value::Object(map) => map,
        _ => unreachable!("value was just replaced with an object"),
    }
}

/// Write `value` at `path`, creating (or overwriting non-object)
/// intermediate nodes. The root itself only accepts an object.
pub(super) fn assign(root: &mut Value, path: &str, value: Value) -> Result<()> {
    let segs = segments(path)?;
    let Some((last, parents)) = segs.split_last() else {
        if !value.is_object() {
            return Err(BridgeError::invalid(
                "the property root can only be replaced by an object",
            ));
        }
        *root = value;
        return Ok(());
    };

    let mut cur = root;
    for seg in parents {
        cur = ensure_object(cur)
            .entry((*seg).to_owned())
            .or_insert(Value::Null);
    }
    ensure_object(cur).insert((*last).to_owned(), value);
    Ok(())
}
