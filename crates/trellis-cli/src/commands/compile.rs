//! Compile command: JSON filter to condition

use clap::Args;
use serde::Serialize;
use trellis_core::{Condition, Variable};
use trellis_filter::ConditionGenerator;

use super::read_filter;
use crate::output::{format_json, OutputFormat};
use crate::{AppContext, Cli};

#[derive(Args)]
pub struct CompileArgs {
    /// Entity kind the filter applies to
    pub kind: String,

    /// Filter as JSON, or @path to a JSON file
    pub filter: String,

    /// Pattern variable bound to the filtered node
    #[arg(long = "var")]
    pub variable: Option<String>,
}

#[derive(Serialize)]
struct Compiled<'a> {
    kind: &'a str,
    variable: &'a Variable,
    cypher: String,
    condition: &'a Condition,
}

pub fn run(args: &CompileArgs, cli: &Cli, ctx: &AppContext) -> anyhow::Result<()> {
    let input = read_filter(&args.filter)?;
    let filter = ctx.filters.parse(&args.kind, &input)?;

    let variable = ctx.config.pattern_variable(args.variable.as_deref())?;
    let condition = filter.generate_condition(&variable);
    tracing::info!("Compiled {} filter against {}", args.kind, variable);

    match cli.output_format() {
        OutputFormat::Json => {
            let compiled = Compiled {
                kind: &args.kind,
                variable: &variable,
                cypher: condition.to_string(),
                condition: &condition,
            };
            println!("{}", format_json(&compiled)?);
        }
        OutputFormat::Text => println!("{}", condition),
    }
    Ok(())
}
