//! Query command: run a filter against a dataset in the memory store

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use clap::Args;
use serde::{Deserialize, Serialize};
use trellis_core::{Node, NodeKey, Schema, Value};
use trellis_filter::ConditionGenerator;
use trellis_storage::{GraphStore, MemoryStorage};

use super::read_filter;
use crate::output::{format_json, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct QueryArgs {
    /// Entity kind to query
    pub kind: String,

    /// Filter as JSON, or @path to a JSON file
    pub filter: String,

    /// Dataset file with nodes and edges
    #[arg(short, long)]
    pub data: PathBuf,

    /// Pattern variable bound to the filtered node
    #[arg(long = "var")]
    pub variable: Option<String>,
}

/// Dataset file layout
///
/// Edges name a relationship field on the `from` node; the store derives
/// the edge label and orientation from the schema.
#[derive(Debug, Deserialize)]
struct Dataset {
    #[serde(default)]
    nodes: Vec<DatasetNode>,
    #[serde(default)]
    edges: Vec<DatasetEdge>,
}

#[derive(Debug, Serialize, Deserialize)]
struct DatasetNode {
    id: String,
    kind: String,
    #[serde(default)]
    attributes: BTreeMap<String, Value>,
}

#[derive(Debug, Deserialize)]
struct DatasetEdge {
    from: String,
    field: String,
    to: String,
}

impl Dataset {
    fn read(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse dataset {}", path.display()))
    }

    /// Save every node and edge into a fresh store
    async fn load(self, schema: Arc<Schema>) -> anyhow::Result<MemoryStorage> {
        let storage = MemoryStorage::new(schema.clone());

        let mut nodes = Vec::with_capacity(self.nodes.len());
        let mut keys: HashMap<String, (NodeKey, usize)> = HashMap::new();
        for declared in self.nodes {
            let kind = schema.require_kind(&declared.kind)?;
            let mut node = Node::new(kind).with_id(declared.id.clone());
            for (name, value) in declared.attributes {
                node.set_attribute(name, value);
            }
            if keys.insert(declared.id.clone(), (node.key(), nodes.len())).is_some() {
                anyhow::bail!("Duplicate node id in dataset: {}", declared.id);
            }
            nodes.push(node);
        }

        for edge in &self.edges {
            let (_, from) = keys
                .get(&edge.from)
                .with_context(|| format!("Edge from unknown node {}", edge.from))?;
            let (to, _) = keys
                .get(&edge.to)
                .with_context(|| format!("Edge to unknown node {}", edge.to))?;
            nodes[*from].property_mut(&edge.field)?.add(*to);
        }

        let operations = storage.save(&mut nodes).await?;
        tracing::debug!(
            "Loaded dataset with {} nodes and {} edges",
            nodes.len(),
            operations.len()
        );
        Ok(storage)
    }
}

pub async fn run(args: &QueryArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let input = read_filter(&args.filter)?;
    let filter = ctx.filters.parse(&args.kind, &input)?;
    let variable = ctx.config.pattern_variable(args.variable.as_deref())?;
    let condition = filter.generate_condition(&variable);

    let storage = Dataset::read(&args.data)?.load(ctx.schema.clone()).await?;
    let matches = storage.query(&args.kind, &variable, &condition).await?;
    tracing::info!("{} {} nodes matched", matches.len(), args.kind);

    let results: Vec<DatasetNode> = matches
        .iter()
        .map(|node| DatasetNode {
            id: node.id().unwrap_or_default().to_string(),
            kind: node.kind().to_string(),
            attributes: node.attributes().clone(),
        })
        .collect();

    match cli.output_format() {
        OutputFormat::Json => println!("{}", format_json(&results)?),
        OutputFormat::Text => {
            if results.is_empty() && !cli.quiet {
                println!("No {} nodes matched", args.kind);
            }
            for node in &results {
                let attributes: Vec<String> = node
                    .attributes
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect();
                println!("{} {}", node.id, attributes.join(" "));
            }
        }
    }
    Ok(())
}
