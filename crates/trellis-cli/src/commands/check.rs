//! Schema check command

use serde::Serialize;
use trellis_core::{AttributeDecl, Cardinality, Direction, EntityKind};

use crate::output::{format_json, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Debug, Serialize)]
struct KindSummary<'a> {
    name: &'a str,
    attributes: &'a [AttributeDecl],
    relationships: Vec<RelationshipSummary<'a>>,
}

#[derive(Debug, Serialize)]
struct RelationshipSummary<'a> {
    field: &'a str,
    related_kind: &'a str,
    label: &'a str,
    direction: Direction,
    cardinality: Cardinality,
    mirror: Option<&'a str>,
}

impl<'a> From<&'a EntityKind> for KindSummary<'a> {
    fn from(kind: &'a EntityKind) -> Self {
        let relationships = kind
            .relationships()
            .iter()
            .map(|r| RelationshipSummary {
                field: r.field(),
                related_kind: r.related_kind(),
                label: r.label(),
                direction: r.direction(),
                cardinality: r.cardinality(),
                mirror: r.remote_field(),
            })
            .collect();

        Self {
            name: kind.name(),
            attributes: kind.attributes(),
            relationships,
        }
    }
}

pub fn run(cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let kinds: Vec<KindSummary> = ctx.schema.kinds().map(|k| KindSummary::from(k.as_ref())).collect();
    tracing::info!("Schema is valid with {} kinds", kinds.len());

    if cli.output_format() == OutputFormat::Json {
        println!("{}", format_json(&kinds)?);
        return Ok(());
    }
    if cli.quiet {
        return Ok(());
    }

    println!("Schema OK: {} kinds", kinds.len());
    for kind in &kinds {
        println!();
        println!("{}", kind.name);
        for attribute in kind.attributes {
            println!("  {}: {}", attribute.name, attribute.ty);
        }
        for r in &kind.relationships {
            let arrow = match r.direction {
                Direction::Outgoing => format!("-[:{}]->", r.label),
                Direction::Incoming => format!("<-[:{}]-", r.label),
            };
            let cardinality = match r.cardinality {
                Cardinality::One => "one",
                Cardinality::Many => "many",
            };
            let mirror = r
                .mirror
                .map(|m| format!(" (mirror: {}.{})", r.related_kind, m))
                .unwrap_or_default();
            println!(
                "  {} {} {} [{}]{}",
                r.field, arrow, r.related_kind, cardinality, mirror
            );
        }
    }
    Ok(())
}
