//! Aggregation: assembles the final artifact from the populated context.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use bl_core::BlError;
use serde_json::{json, Map, Value};
use tracing::debug;

use crate::config::Config;
use crate::context::Context;
use crate::files;
use crate::summary;

pub fn run(ctx: &mut Context, config: &Config, output_dir: &Path) -> Result<(), BlError> {
    let rows = summary::cluster_rows(ctx);

    let mut clusters = Vec::with_capacity(rows.len() + 1);
    clusters.push(json!({
        "level": 0,
        "id": "0",
        "label": "全体",
        "takeaway": "",
        "value": ctx.arguments.len(),
        "parent": "",
        "density_rank_percentile": Value::Null,
    }));
    for row in &rows {
        clusters.push(json!({
            "level": row.level,
            "id": row.id,
            "label": row.label,
            "takeaway": row.description,
            "value": row.value,
            "parent": row.parent,
            "density_rank_percentile": row.density_rank_percentile,
        }));
    }

    let arguments: Vec<Value> = ctx
        .arguments
        .iter()
        .map(|arg| {
            let mut entry = Map::new();
            entry.insert("arg_id".to_string(), json!(arg.arg_id));
            entry.insert("argument".to_string(), json!(arg.argument));
            entry.insert("comment_id".to_string(), json!(numeric_comment_id(arg)));
            entry.insert("x".to_string(), json!(arg.x));
            entry.insert("y".to_string(), json!(arg.y));
            entry.insert("p".to_string(), json!(0));
            entry.insert("cluster_ids".to_string(), json!(arg.cluster_ids));
            if let Some(attributes) = &arg.attributes {
                entry.insert("attributes".to_string(), json!(attributes));
            }
            if config.enable_source_link {
                if let Some(url) = &arg.url {
                    entry.insert("url".to_string(), json!(url));
                }
            }
            Value::Object(entry)
        })
        .collect();

    let with_arguments: BTreeSet<&str> = ctx
        .arguments
        .iter()
        .map(|arg| arg.comment_id.as_str())
        .collect();
    let mut comments = Map::new();
    for comment in &ctx.comments {
        if with_arguments.contains(comment.id.as_str()) {
            comments.insert(comment.id.clone(), json!({ "comment": comment.body }));
        }
    }

    let mut property_map = Map::new();
    for name in config.property_names() {
        let mut column = Map::new();
        for arg in &ctx.arguments {
            if let Some(value) = arg.properties.as_ref().and_then(|props| props.get(&name)) {
                column.insert(arg.arg_id.clone(), value.clone());
            }
        }
        property_map.insert(name, Value::Object(column));
    }

    let result = json!({
        "arguments": arguments,
        "clusters": clusters,
        "comments": comments,
        "propertyMap": property_map,
        "translations": {},
        "overview": ctx.overview,
        "config": config.echo(),
        "comment_num": ctx.comment_count(),
    });
    ctx.result = Some(result);

    if config.is_pubcom {
        write_pubcom_csv(ctx, output_dir)?;
    }
    debug!(clusters = rows.len(), "aggregation complete");
    Ok(())
}

/// Integer comment id: parse the stored id, fall back to the digits between
/// `A` and `_` in the arg id, then to 0.
fn numeric_comment_id(arg: &bl_core::Argument) -> i64 {
    if let Ok(value) = arg.comment_id.parse::<i64>() {
        return value;
    }
    arg.arg_id
        .strip_prefix('A')
        .and_then(|rest| rest.split('_').next())
        .and_then(|digits| digits.parse::<i64>().ok())
        .unwrap_or(0)
}

/// Companion CSV for public-comment runs: one row per argument with its
/// original comment, level-1 category, coordinates, and every attribute
/// column observed across arguments and comments.
fn write_pubcom_csv(ctx: &Context, output_dir: &Path) -> Result<(), BlError> {
    let comment_bodies: BTreeMap<&str, &str> = ctx
        .comments
        .iter()
        .map(|comment| (comment.id.as_str(), comment.body.as_str()))
        .collect();
    let comment_attributes: BTreeMap<&str, &BTreeMap<String, String>> = ctx
        .comments
        .iter()
        .filter_map(|comment| {
            comment
                .attributes
                .as_ref()
                .map(|attrs| (comment.id.as_str(), attrs))
        })
        .collect();

    let mut attribute_names: BTreeSet<String> = BTreeSet::new();
    for arg in &ctx.arguments {
        if let Some(attrs) = &arg.attributes {
            attribute_names.extend(attrs.keys().cloned());
        }
    }
    for attrs in comment_attributes.values() {
        attribute_names.extend(attrs.keys().cloned());
    }

    let path = output_dir.join("final_result_with_comments.csv");
    let mut writer = files::csv_writer(&path)?;
    let mut header = vec![
        "comment_id".to_string(),
        "original_comment".to_string(),
        "arg_id".to_string(),
        "argument".to_string(),
        "category_id".to_string(),
        "category".to_string(),
        "x".to_string(),
        "y".to_string(),
    ];
    header.extend(attribute_names.iter().map(|name| format!("attribute_{name}")));
    writer
        .write_record(&header)
        .map_err(|err| files::wrap_csv("pubcom-header", err))?;

    for arg in &ctx.arguments {
        let category_id = arg.cluster_ids.get(1).cloned().unwrap_or_default();
        let category = ctx
            .cluster_labels
            .get(&category_id)
            .map(|label| label.label.clone())
            .unwrap_or_default();
        let mut row = vec![
            arg.comment_id.clone(),
            comment_bodies
                .get(arg.comment_id.as_str())
                .map(|body| body.to_string())
                .unwrap_or_default(),
            arg.arg_id.clone(),
            arg.argument.clone(),
            category_id,
            category,
            arg.x.to_string(),
            arg.y.to_string(),
        ];
        for name in &attribute_names {
            let value = arg
                .attributes
                .as_ref()
                .and_then(|attrs| attrs.get(name))
                .cloned()
                .or_else(|| {
                    comment_attributes
                        .get(arg.comment_id.as_str())
                        .and_then(|attrs| attrs.get(name))
                        .cloned()
                })
                .unwrap_or_default();
            row.push(value);
        }
        writer
            .write_record(&row)
            .map_err(|err| files::wrap_csv("pubcom-row", err))?;
    }
    writer
        .flush()
        .map_err(|err| files::wrap_io("pubcom-flush", &path, err))
}
