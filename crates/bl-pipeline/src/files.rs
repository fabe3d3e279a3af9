//! Stage output formats under the run's output directory.
//!
//! These files double as the resume boundary: whatever subset exists in a
//! directory determines how far a context can be reconstructed.

use std::collections::BTreeMap;
use std::fs;
use std::io::BufWriter;
use std::path::Path;

use bl_core::{Argument, BlError, ClusterLabel, ClusterResults, ErrorInfo, Relation};
use csv::{ReaderBuilder, WriterBuilder};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::summary::ClusterRow;

/// Extraction outputs.
pub const ARGS_CSV: &str = "args.csv";
/// Extraction outputs.
pub const RELATIONS_CSV: &str = "relations.csv";
/// Embedding output.
pub const EMBEDDINGS_JSON: &str = "embeddings.json";
/// Clustering output.
pub const CLUSTERS_CSV: &str = "hierarchical_clusters.csv";
/// Initial labelling output.
pub const INITIAL_LABELS_CSV: &str = "hierarchical_initial_labels.csv";
/// Merge labelling output.
pub const MERGE_LABELS_CSV: &str = "hierarchical_merge_labels.csv";
/// Overview output.
pub const OVERVIEW_TXT: &str = "hierarchical_overview.txt";
/// Aggregation output.
pub const RESULT_JSON: &str = "hierarchical_result.json";

pub(crate) fn wrap_csv(code: &str, err: csv::Error) -> BlError {
    BlError::Serde(ErrorInfo::new(code, "CSV failure").with_hint(err.to_string()))
}

pub(crate) fn wrap_io(code: &str, path: &Path, err: impl ToString) -> BlError {
    BlError::Serde(
        ErrorInfo::new(code, err.to_string()).with_context("path", path.display().to_string()),
    )
}

pub(crate) fn csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<fs::File>>, BlError> {
    let file = fs::File::create(path).map_err(|err| wrap_io("csv-create", path, err))?;
    Ok(WriterBuilder::new().from_writer(BufWriter::new(file)))
}

/// Writes `args.csv` (`arg-id, argument`).
pub fn write_args_csv(dir: &Path, arguments: &[Argument]) -> Result<(), BlError> {
    let path = dir.join(ARGS_CSV);
    let mut writer = csv_writer(&path)?;
    writer
        .write_record(["arg-id", "argument"])
        .map_err(|err| wrap_csv("args-header", err))?;
    for argument in arguments {
        writer
            .write_record([argument.arg_id.as_str(), argument.argument.as_str()])
            .map_err(|err| wrap_csv("args-row", err))?;
    }
    writer.flush().map_err(|err| wrap_io("args-flush", &path, err))
}

/// Writes `relations.csv` (`arg-id, comment-id`).
pub fn write_relations_csv(dir: &Path, relations: &[Relation]) -> Result<(), BlError> {
    let path = dir.join(RELATIONS_CSV);
    let mut writer = csv_writer(&path)?;
    writer
        .write_record(["arg-id", "comment-id"])
        .map_err(|err| wrap_csv("relations-header", err))?;
    for relation in relations {
        writer
            .write_record([relation.arg_id.as_str(), relation.comment_id.as_str()])
            .map_err(|err| wrap_csv("relations-row", err))?;
    }
    writer
        .flush()
        .map_err(|err| wrap_io("relations-flush", &path, err))
}

/// Reads `args.csv` + `relations.csv` back into arguments and relations.
pub fn read_args_relations(dir: &Path) -> Result<(Vec<Argument>, Vec<Relation>), BlError> {
    let relations = read_relations_csv(dir)?;
    let by_arg: BTreeMap<&str, &str> = relations
        .iter()
        .map(|rel| (rel.arg_id.as_str(), rel.comment_id.as_str()))
        .collect();

    let path = dir.join(ARGS_CSV);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .map_err(|err| wrap_csv("args-open", err))?;
    let mut arguments = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| wrap_csv("args-record", err))?;
        let arg_id = record.get(0).unwrap_or("").to_string();
        let comment_id = by_arg.get(arg_id.as_str()).copied().unwrap_or("").to_string();
        arguments.push(Argument {
            arg_id,
            argument: record.get(1).unwrap_or("").to_string(),
            comment_id,
            embedding: Vec::new(),
            x: 0.0,
            y: 0.0,
            cluster_ids: Vec::new(),
            attributes: None,
            url: None,
            properties: None,
        });
    }
    Ok((arguments, relations))
}

fn read_relations_csv(dir: &Path) -> Result<Vec<Relation>, BlError> {
    let path = dir.join(RELATIONS_CSV);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .map_err(|err| wrap_csv("relations-open", err))?;
    let mut relations = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| wrap_csv("relations-record", err))?;
        relations.push(Relation {
            arg_id: record.get(0).unwrap_or("").to_string(),
            comment_id: record.get(1).unwrap_or("").to_string(),
        });
    }
    Ok(relations)
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingsFile {
    arguments: Vec<EmbeddingEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct EmbeddingEntry {
    arg_id: String,
    embedding: Vec<f64>,
}

/// Writes `embeddings.json`.
pub fn write_embeddings_json(dir: &Path, arguments: &[Argument]) -> Result<(), BlError> {
    let path = dir.join(EMBEDDINGS_JSON);
    let payload = EmbeddingsFile {
        arguments: arguments
            .iter()
            .map(|arg| EmbeddingEntry {
                arg_id: arg.arg_id.clone(),
                embedding: arg.embedding.clone(),
            })
            .collect(),
    };
    let json = serde_json::to_string(&payload)
        .map_err(|err| wrap_io("embeddings-serialize", &path, err))?;
    fs::write(&path, json).map_err(|err| wrap_io("embeddings-write", &path, err))
}

/// Applies `embeddings.json` onto the matching arguments.
pub fn read_embeddings_json(dir: &Path, arguments: &mut [Argument]) -> Result<(), BlError> {
    let path = dir.join(EMBEDDINGS_JSON);
    let contents = fs::read_to_string(&path).map_err(|err| wrap_io("embeddings-read", &path, err))?;
    let payload: EmbeddingsFile =
        serde_json::from_str(&contents).map_err(|err| wrap_io("embeddings-parse", &path, err))?;
    let mut by_id: BTreeMap<String, Vec<f64>> = payload
        .arguments
        .into_iter()
        .map(|entry| (entry.arg_id, entry.embedding))
        .collect();
    for argument in arguments.iter_mut() {
        if let Some(embedding) = by_id.remove(&argument.arg_id) {
            argument.embedding = embedding;
        }
    }
    Ok(())
}

/// Writes `hierarchical_clusters.csv` with one cluster-id column per level.
pub fn write_clusters_csv(
    dir: &Path,
    arguments: &[Argument],
    results: &ClusterResults,
) -> Result<(), BlError> {
    let path = dir.join(CLUSTERS_CSV);
    let mut writer = csv_writer(&path)?;
    let levels = results.sorted_levels();
    let mut header = vec!["arg-id".to_string(), "argument".to_string(), "x".to_string(), "y".to_string()];
    for level in &levels {
        header.push(format!("cluster-level-{level}-id"));
    }
    writer
        .write_record(&header)
        .map_err(|err| wrap_csv("clusters-header", err))?;
    for (idx, argument) in arguments.iter().enumerate() {
        let mut row = vec![
            argument.arg_id.clone(),
            argument.argument.clone(),
            argument.x.to_string(),
            argument.y.to_string(),
        ];
        for level in &levels {
            let num = results.level(*level).map(|seq| seq[idx]).unwrap_or(0);
            row.push(bl_core::cluster_id(*level, num));
        }
        writer
            .write_record(&row)
            .map_err(|err| wrap_csv("clusters-row", err))?;
    }
    writer
        .flush()
        .map_err(|err| wrap_io("clusters-flush", &path, err))
}

/// Reads `hierarchical_clusters.csv`, restoring coordinates and cluster ids
/// on the arguments (matched by `arg-id`, appended when unknown) and
/// rebuilding the per-level assignments.
pub fn read_clusters_csv(
    dir: &Path,
    arguments: &mut Vec<Argument>,
) -> Result<ClusterResults, BlError> {
    let path = dir.join(CLUSTERS_CSV);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .map_err(|err| wrap_csv("clusters-open", err))?;

    let headers = reader
        .headers()
        .map_err(|err| wrap_csv("clusters-headers", err))?
        .clone();
    let mut level_columns: Vec<(usize, u32)> = Vec::new();
    for (idx, name) in headers.iter().enumerate() {
        if let Some(rest) = name.strip_prefix("cluster-level-") {
            if let Some(level) = rest.strip_suffix("-id").and_then(|s| s.parse::<u32>().ok()) {
                level_columns.push((idx, level));
            }
        }
    }

    let mut index_of: BTreeMap<String, usize> = arguments
        .iter()
        .enumerate()
        .map(|(idx, arg)| (arg.arg_id.clone(), idx))
        .collect();

    let mut assignments: BTreeMap<u32, Vec<usize>> = BTreeMap::new();
    for result in reader.records() {
        let record = result.map_err(|err| wrap_csv("clusters-record", err))?;
        let arg_id = record.get(0).unwrap_or("").to_string();
        let row_idx = match index_of.get(&arg_id).copied() {
            Some(idx) => idx,
            None => {
                arguments.push(Argument {
                    arg_id: arg_id.clone(),
                    argument: record.get(1).unwrap_or("").to_string(),
                    comment_id: String::new(),
                    embedding: Vec::new(),
                    x: 0.0,
                    y: 0.0,
                    cluster_ids: Vec::new(),
                    attributes: None,
                    url: None,
                    properties: None,
                });
                index_of.insert(arg_id, arguments.len() - 1);
                arguments.len() - 1
            }
        };

        let argument = &mut arguments[row_idx];
        argument.x = record.get(2).and_then(|s| s.parse().ok()).unwrap_or(0.0);
        argument.y = record.get(3).and_then(|s| s.parse().ok()).unwrap_or(0.0);
        argument.cluster_ids = vec!["0".to_string()];
        for &(col, level) in &level_columns {
            let cell = record.get(col).unwrap_or("");
            argument.cluster_ids.push(cell.to_string());
            let num = cell
                .rsplit('_')
                .next()
                .and_then(|s| s.parse::<usize>().ok())
                .unwrap_or(0);
            assignments.entry(level).or_default().push(num);
        }
    }

    let mut results = ClusterResults::new();
    for (level, seq) in assignments {
        results.insert(level, seq);
    }
    Ok(results)
}

/// Writes `hierarchical_initial_labels.csv` for the finest-level labels.
pub fn write_initial_labels_csv(dir: &Path, labels: &[&ClusterLabel]) -> Result<(), BlError> {
    let path = dir.join(INITIAL_LABELS_CSV);
    let mut writer = csv_writer(&path)?;
    writer
        .write_record(["level", "id", "label", "description"])
        .map_err(|err| wrap_csv("initial-labels-header", err))?;
    for label in labels {
        writer
            .write_record([
                label.level.to_string().as_str(),
                label.cluster_id.as_str(),
                label.label.as_str(),
                label.description.as_str(),
            ])
            .map_err(|err| wrap_csv("initial-labels-row", err))?;
    }
    writer
        .flush()
        .map_err(|err| wrap_io("initial-labels-flush", &path, err))
}

/// Writes `hierarchical_merge_labels.csv` for every labelled cluster. The
/// CSV carries density and rank columns that the JSON artifact deliberately
/// omits.
pub fn write_merge_labels_csv(dir: &Path, rows: &[ClusterRow]) -> Result<(), BlError> {
    let path = dir.join(MERGE_LABELS_CSV);
    let mut writer = csv_writer(&path)?;
    writer
        .write_record([
            "level",
            "id",
            "label",
            "description",
            "value",
            "parent",
            "density",
            "density_rank",
            "density_rank_percentile",
        ])
        .map_err(|err| wrap_csv("merge-labels-header", err))?;
    for row in rows {
        writer
            .write_record([
                row.level.to_string().as_str(),
                row.id.as_str(),
                row.label.as_str(),
                row.description.as_str(),
                row.value.to_string().as_str(),
                row.parent.as_str(),
                row.density.to_string().as_str(),
                row.density_rank.to_string().as_str(),
                row.density_rank_percentile.to_string().as_str(),
            ])
            .map_err(|err| wrap_csv("merge-labels-row", err))?;
    }
    writer
        .flush()
        .map_err(|err| wrap_io("merge-labels-flush", &path, err))
}

/// Reads labels back from either labels CSV.
pub fn read_labels_csv(dir: &Path, file: &str) -> Result<Vec<ClusterLabel>, BlError> {
    let path = dir.join(file);
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .map_err(|err| wrap_csv("labels-open", err))?;
    let mut labels = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|err| wrap_csv("labels-record", err))?;
        labels.push(ClusterLabel {
            level: record.get(0).and_then(|s| s.parse().ok()).unwrap_or(0),
            cluster_id: record.get(1).unwrap_or("").to_string(),
            label: record.get(2).unwrap_or("").to_string(),
            description: record.get(3).unwrap_or("").to_string(),
        });
    }
    Ok(labels)
}

/// Writes `hierarchical_overview.txt` as raw text.
pub fn write_overview_txt(dir: &Path, overview: &str) -> Result<(), BlError> {
    let path = dir.join(OVERVIEW_TXT);
    fs::write(&path, overview).map_err(|err| wrap_io("overview-write", &path, err))
}

/// Reads `hierarchical_overview.txt`.
pub fn read_overview_txt(dir: &Path) -> Result<String, BlError> {
    let path = dir.join(OVERVIEW_TXT);
    fs::read_to_string(&path).map_err(|err| wrap_io("overview-read", &path, err))
}

/// Writes `hierarchical_result.json`.
pub fn write_result_json(dir: &Path, result: &Value) -> Result<(), BlError> {
    let path = dir.join(RESULT_JSON);
    let json = serde_json::to_string_pretty(result)
        .map_err(|err| wrap_io("result-serialize", &path, err))?;
    fs::write(&path, json).map_err(|err| wrap_io("result-write", &path, err))
}
