//! Describe command: the filter fields of each kind

use clap::Args;
use trellis_filter::{FieldDescription, FilterDescription};

use crate::output::{format_json, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct DescribeArgs {
    /// Kind to describe; all kinds when omitted
    pub kind: Option<String>,
}

pub fn run(args: &DescribeArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let descriptions = match &args.kind {
        Some(kind) => vec![ctx.filters.describe(kind)?],
        None => ctx.filters.describe_all(),
    };

    match cli.output_format() {
        OutputFormat::Json => println!("{}", format_json(&descriptions)?),
        OutputFormat::Text => {
            for (i, description) in descriptions.iter().enumerate() {
                if i > 0 {
                    println!();
                }
                print_description(description);
            }
        }
    }
    Ok(())
}

fn print_description(description: &FilterDescription) {
    println!("{} ({})", description.kind, description.type_name);
    println!("  combinators: {}", description.combinators.join(", "));

    for field in &description.fields {
        match field {
            FieldDescription::Scalar {
                name,
                ty,
                operators,
                ..
            } => println!("  {}: {} [{}]", name, ty, operators.join(", ")),
            FieldDescription::Relationship {
                name,
                related_kind,
                quantifiers,
                ..
            } => {
                println!("  {}: {}", name, related_kind);
                for quantifier in quantifiers {
                    println!("    {}: {}", quantifier.name, quantifier.description);
                }
            }
        }
    }
}
