// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Simple CLI for EL evaluation
//!
//! Evaluates expressions against top-level variables read from JSON, prints
//! parse trees and checks identifiers.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use el_runtime::{ElType, ExpressionFactory, IdentifierPolicy};
use std::fs;
use std::process;

#[derive(Parser)]
#[command(name = "el-eval")]
#[command(about = "Evaluate Expression Language expressions from the command line")]
#[command(version)]
#[command(author = "OctoFHIR Team <funyloony@gmail.com>")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate an expression
    Evaluate {
        /// Expression to evaluate, e.g. 'Hello ${user.name}'
        expression: String,
        /// JSON file with top-level variables, or a JSON object directly
        #[arg(long)]
        vars: Option<String>,
        /// Type the result is coerced to (e.g. Long, String, int[])
        #[arg(short = 't', long)]
        expected_type: Option<String>,
        /// Pretty-print JSON output
        #[arg(short, long)]
        pretty: bool,
    },
    /// Parse an expression and print its syntax tree
    Parse {
        /// Expression to parse
        expression: String,
    },
    /// Check whether a name is a valid identifier
    Ident {
        /// Name to check
        name: String,
        /// Accept every name, as with EL_SKIP_IDENTIFIER_CHECK=true
        #[arg(long)]
        skip_check: bool,
    },
}

fn main() {
    human_panic::setup_panic!();
    env_logger::init();

    let cli = Cli::parse();
    let outcome = match cli.command {
        Commands::Evaluate {
            expression,
            vars,
            expected_type,
            pretty,
        } => handle_evaluate(&expression, vars.as_deref(), expected_type.as_deref(), pretty),
        Commands::Parse { expression } => handle_parse(&expression),
        Commands::Ident { name, skip_check } => handle_ident(&name, skip_check),
    };

    if let Err(err) = outcome {
        eprintln!("Error: {err:#}");
        process::exit(1);
    }
}

fn read_variables(vars: Option<&str>) -> Result<serde_json::Value> {
    let Some(vars) = vars else {
        return Ok(serde_json::Value::Object(serde_json::Map::new()));
    };
    let text = if vars.trim_start().starts_with('{') {
        vars.to_string()
    } else {
        fs::read_to_string(vars).with_context(|| format!("reading variables file '{vars}'"))?
    };
    serde_json::from_str(&text).context("variables must be a JSON object")
}

fn handle_evaluate(
    expression: &str,
    vars: Option<&str>,
    expected_type: Option<&str>,
    pretty: bool,
) -> Result<()> {
    let factory = ExpressionFactory::from_env();
    let ctx = factory.context_with_variables(read_variables(vars)?)?;
    let expected_type = match expected_type {
        Some(name) => factory
            .type_registry()
            .for_name(name)?
            .unwrap_or(ElType::Object),
        None => ElType::Object,
    };

    let expr = factory.create_value_expression(&ctx, expression, expected_type)?;
    let value = expr.get_value(&ctx)?;
    let json = value.to_json()?;
    let output = if pretty {
        serde_json::to_string_pretty(&json)?
    } else {
        serde_json::to_string(&json)?
    };
    println!("{output}");
    Ok(())
}

fn handle_parse(expression: &str) -> Result<()> {
    let factory = ExpressionFactory::from_env();
    let node = factory.builder().parse(expression)?;
    println!("{node:#?}");
    if node.is_literal_text() {
        println!("(literal text)");
    } else if node.is_deferred() {
        println!("(deferred)");
    }
    Ok(())
}

fn handle_ident(name: &str, skip_check: bool) -> Result<()> {
    let policy = if skip_check {
        IdentifierPolicy::permissive()
    } else {
        IdentifierPolicy::from_env()
    };
    if !policy.is_identifier(Some(name)) {
        bail!("'{name}' is not a valid identifier");
    }
    println!("'{name}' is a valid identifier");
    Ok(())
}
