//! Input loaders: comments from CSV or JSON files.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use bl_core::{BlError, Comment, ErrorInfo};
use bl_pipeline::Config;
use serde::Deserialize;
use serde_json::Value;

/// Loads the comment corpus named by `config.input`, dispatching on the
/// file extension (`.json` / anything else is treated as CSV).
pub fn load_comments(config: &Config) -> Result<Vec<Comment>, BlError> {
    let path = &config.input;
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("json") => load_json(path),
        _ => load_csv(path, &config.property_names()),
    }
}

#[derive(Debug, Deserialize)]
struct JsonComment {
    #[serde(alias = "comment-id")]
    id: Value,
    #[serde(default, alias = "comment-body")]
    body: String,
    #[serde(default, alias = "source-url", alias = "url")]
    source_url: Option<String>,
    #[serde(default)]
    attributes: Option<BTreeMap<String, String>>,
    #[serde(default)]
    properties: Option<BTreeMap<String, Value>>,
}

fn load_json(path: &Path) -> Result<Vec<Comment>, BlError> {
    let contents = fs::read_to_string(path).map_err(|err| {
        BlError::Config(
            ErrorInfo::new("input-read", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    let raw: Vec<JsonComment> = serde_json::from_str(&contents).map_err(|err| {
        BlError::Config(
            ErrorInfo::new("input-parse", err.to_string())
                .with_context("path", path.display().to_string()),
        )
    })?;
    Ok(raw
        .into_iter()
        .map(|comment| Comment {
            id: scalar_to_string(&comment.id),
            body: comment.body,
            source_url: comment.source_url,
            attributes: comment.attributes,
            properties: comment.properties,
        })
        .collect())
}

fn load_csv(path: &Path, property_names: &[String]) -> Result<Vec<Comment>, BlError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(path)
        .map_err(|err| {
            BlError::Config(
                ErrorInfo::new("input-open", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;

    let headers = reader
        .headers()
        .map_err(|err| BlError::Config(ErrorInfo::new("input-headers", err.to_string())))?
        .clone();
    let find = |names: &[&str]| {
        headers
            .iter()
            .position(|header| names.contains(&header))
    };
    let id_col = find(&["comment-id", "id"]).ok_or_else(|| {
        BlError::Config(
            ErrorInfo::new("input-columns", "no comment-id or id column")
                .with_context("path", path.display().to_string()),
        )
    })?;
    let body_col = find(&["comment-body", "body", "comment"]).ok_or_else(|| {
        BlError::Config(
            ErrorInfo::new("input-columns", "no comment-body or body column")
                .with_context("path", path.display().to_string()),
        )
    })?;
    let url_col = find(&["source-url", "url"]);
    let attribute_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, header)| {
            header
                .strip_prefix("attribute_")
                .map(|name| (idx, name.to_string()))
        })
        .collect();
    let property_cols: Vec<(usize, String)> = headers
        .iter()
        .enumerate()
        .filter_map(|(idx, header)| {
            property_names
                .iter()
                .find(|name| name.as_str() == header)
                .map(|name| (idx, name.clone()))
        })
        .collect();

    let mut comments = Vec::new();
    for result in reader.records() {
        let record =
            result.map_err(|err| BlError::Config(ErrorInfo::new("input-record", err.to_string())))?;
        let attributes: BTreeMap<String, String> = attribute_cols
            .iter()
            .filter_map(|(idx, name)| {
                record
                    .get(*idx)
                    .filter(|value| !value.is_empty())
                    .map(|value| (name.clone(), value.to_string()))
            })
            .collect();
        let properties: BTreeMap<String, Value> = property_cols
            .iter()
            .filter_map(|(idx, name)| {
                record
                    .get(*idx)
                    .filter(|value| !value.is_empty())
                    .map(|value| (name.clone(), Value::String(value.to_string())))
            })
            .collect();
        comments.push(Comment {
            id: record.get(id_col).unwrap_or("").to_string(),
            body: record.get(body_col).unwrap_or("").to_string(),
            source_url: url_col
                .and_then(|idx| record.get(idx))
                .filter(|value| !value.is_empty())
                .map(str::to_string),
            attributes: (!attributes.is_empty()).then_some(attributes),
            properties: (!properties.is_empty()).then_some(properties),
        });
    }
    Ok(comments)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
