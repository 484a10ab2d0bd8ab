//! JSON body helpers for use inside response handlers.
//!
//! Paths use dotted notation with optional indices: `article.description`,
//! `articles[1].slug`, `articles.1.slug`. A leading `$.` is accepted.

use crate::error::HandlerError;
use serde_json::Value;

enum Segment<'a> {
    Key(&'a str),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment<'_>>, HandlerError> {
    let trimmed = path.strip_prefix("$.").unwrap_or(path);
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);

    let mut segments = Vec::new();
    for part in trimmed.split('.').filter(|p| !p.is_empty()) {
        let (key, mut rest) = match part.find('[') {
            Some(pos) => (&part[..pos], &part[pos..]),
            None => (part, ""),
        };
        if !key.is_empty() {
            match key.parse::<usize>() {
                Ok(index) => segments.push(Segment::Index(index)),
                Err(_) => segments.push(Segment::Key(key)),
            }
        }
        while let Some(stripped) = rest.strip_prefix('[') {
            let close = stripped
                .find(']')
                .ok_or_else(|| HandlerError::message(format!("unclosed '[' in path '{path}'")))?;
            let index = stripped[..close].parse::<usize>().map_err(|_| {
                HandlerError::message(format!("invalid index in path '{path}'"))
            })?;
            segments.push(Segment::Index(index));
            rest = &stripped[close + 1..];
        }
    }
    Ok(segments)
}

/// Look up a value by path.
pub fn field<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    let segments = parse_path(path).ok()?;
    segments.iter().try_fold(body, |current, segment| match segment {
        Segment::Key(key) => current.get(*key),
        Segment::Index(index) => current.get(*index),
    })
}

/// Fail with [`HandlerError::Assertion`] unless `path` equals `expected`.
pub fn expect_eq(body: &Value, path: &str, expected: impl Into<Value>) -> Result<(), HandlerError> {
    let expected = expected.into();
    let actual = field(body, path).cloned().unwrap_or(Value::Null);
    if actual == expected {
        Ok(())
    } else {
        Err(HandlerError::Assertion {
            path: path.to_string(),
            expected,
            actual,
        })
    }
}

/// Replace the value at `path`. Parents must already exist; the last object
/// key is inserted if missing.
pub fn set_field(body: &mut Value, path: &str, value: impl Into<Value>) -> Result<(), HandlerError> {
    let segments = parse_path(path)?;
    let Some((last, parents)) = segments.split_last() else {
        *body = value.into();
        return Ok(());
    };

    let mut current = body;
    for segment in parents {
        current = match segment {
            Segment::Key(key) => current.get_mut(*key),
            Segment::Index(index) => current.get_mut(*index),
        }
        .ok_or_else(|| HandlerError::message(format!("path '{path}' does not exist")))?;
    }

    match last {
        Segment::Key(key) => match current.as_object_mut() {
            Some(map) => {
                map.insert((*key).to_string(), value.into());
                Ok(())
            }
            None => Err(HandlerError::message(format!(
                "parent of '{path}' is not an object"
            ))),
        },
        Segment::Index(index) => match current.get_mut(*index) {
            Some(slot) => {
                *slot = value.into();
                Ok(())
            }
            None => Err(HandlerError::message(format!(
                "index {index} out of bounds in '{path}'"
            ))),
        },
    }
}
