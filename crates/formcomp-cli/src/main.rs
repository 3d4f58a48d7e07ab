//! formcomp CLI - compile spreadsheet formulas and evaluate them

mod csv_loader;

use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use formcomp::prelude::*;
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::csv_loader::CsvLoader;

#[derive(Parser)]
#[command(name = "formcomp")]
#[command(
    author,
    version,
    about = "Compile spreadsheet formulas into computations and evaluate them"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate output cells for one set of input values
    Eval {
        #[command(flatten)]
        compile: CompileArgs,

        /// Recompute every cell on each read instead of caching values
        #[arg(long)]
        no_cache: bool,

        /// Print results as a JSON object
        #[arg(long)]
        json: bool,
    },

    /// Print the transformed computation model
    Describe {
        #[command(flatten)]
        compile: CompileArgs,

        /// Skip constant folding and inlining
        #[arg(long)]
        no_optimize: bool,
    },
}

#[derive(Args, Debug)]
struct CompileArgs {
    /// Spreadsheet file (csv)
    sheet: PathBuf,

    /// Output cell or defined name, optionally with a slot name (e.g. `total=C1`)
    #[arg(short, long = "output", value_name = "[SLOT=]REF", required = true)]
    outputs: Vec<String>,

    /// Input cell or defined name with its value (e.g. `A1=2`)
    #[arg(short, long = "input", value_name = "REF=VALUE")]
    inputs: Vec<String>,

    /// Define a name before binding (e.g. `Price=A1`)
    #[arg(long = "name", value_name = "NAME=REF")]
    names: Vec<String>,

    /// Numeric type: double, decimal[:scale[:rounding]] or scaled:scale
    #[arg(short, long, default_value = "double")]
    numeric: String,
}

impl CompileArgs {
    fn config(&self) -> Result<CompilerConfig> {
        let numeric: NumericTypeSpec = self
            .numeric
            .parse()
            .with_context(|| format!("Invalid numeric type '{}'", self.numeric))?;
        Ok(CompilerConfig::default().with_numeric_type(numeric))
    }

    /// `(slot, reference)` pairs; a bare reference is its own slot name
    fn output_slots(&self) -> Vec<(&str, &str)> {
        self.outputs
            .iter()
            .map(|o| o.split_once('=').unwrap_or((o.as_str(), o.as_str())))
            .collect()
    }

    fn input_values(&self) -> Result<Vec<(&str, Value)>> {
        self.inputs
            .iter()
            .map(|i| {
                let (reference, text) = split_pair(i, "REF=VALUE")?;
                let value = match text.trim().parse::<f64>() {
                    Ok(n) => Value::from(n),
                    Err(_) => Value::text(text),
                };
                Ok((reference, value))
            })
            .collect()
    }
}

fn split_pair<'a>(text: &'a str, expected: &str) -> Result<(&'a str, &'a str)> {
    text.split_once('=')
        .filter(|(left, _)| !left.is_empty())
        .ok_or_else(|| anyhow!("Expected {}, got '{}'", expected, text))
}

fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Eval {
            compile,
            no_cache,
            json,
        } => {
            let results = evaluate(&compile, !no_cache)?;
            if json {
                let object: serde_json::Map<String, serde_json::Value> = results
                    .into_iter()
                    .map(|(slot, text)| (slot, serde_json::Value::String(text)))
                    .collect();
                println!("{}", serde_json::to_string_pretty(&object)?);
            } else {
                for (slot, text) in results {
                    println!("{} = {}", slot, text);
                }
            }
            Ok(())
        }
        Commands::Describe {
            compile,
            no_optimize,
        } => {
            print!("{}", describe(&compile, !no_optimize)?);
            Ok(())
        }
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env("FORMCOMP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path, names: &[String]) -> Result<Spreadsheet> {
    let mut registry = LoaderRegistry::new();
    registry.register(CsvLoader::new());

    let mut book = registry
        .open(path)
        .with_context(|| format!("Failed to open '{}'", path.display()))?;
    for definition in names {
        let (name, reference) = split_pair(definition, "NAME=REF")?;
        book.define_name(name, reference)
            .with_context(|| format!("Failed to define name '{}'", name))?;
    }
    Ok(book)
}

/// Bind inputs as numeric or string slots (by their value) and every output as a string slot
fn bind<'s>(
    book: &'s Spreadsheet,
    args: &CompileArgs,
    config: CompilerConfig,
) -> Result<(EngineBuilder<'s>, Record)> {
    let inputs = args.input_values()?;
    let outputs = args.output_slots();

    let in_shape = inputs.iter().fold(Shape::new(), |shape, (slot, value)| {
        let data_type = match value {
            Value::Text(_) => DataType::String,
            _ => DataType::Numeric,
        };
        shape.value(*slot, data_type)
    });
    let out_shape = outputs
        .iter()
        .fold(Shape::new(), |shape, (slot, _)| shape.value(*slot, DataType::String));

    let mut builder = EngineBuilder::with_config(book, in_shape, out_shape, config)?;
    let mut record = Record::new();
    for (reference, value) in inputs {
        builder
            .input(reference, reference)
            .with_context(|| format!("Failed to bind input '{}'", reference))?;
        record.set(reference, value);
    }
    for (slot, reference) in outputs {
        builder
            .output(reference, slot)
            .with_context(|| format!("Failed to bind output '{}'", reference))?;
    }
    Ok((builder, record))
}

/// Compile and evaluate; returns `(slot, text)` per requested output, in order
fn evaluate(args: &CompileArgs, caching: bool) -> Result<Vec<(String, String)>> {
    let book = load(&args.sheet, &args.names)?;
    let config = args.config()?.with_caching(caching);
    let (builder, record) = bind(&book, args, config)?;
    let engine = builder.build().context("Failed to compile spreadsheet")?;
    debug!(outputs = args.outputs.len(), "evaluating");

    let computation = engine.computation(&record);
    let mut results = Vec::new();
    for (slot, _) in args.output_slots() {
        let value = computation
            .get(slot)
            .with_context(|| format!("Failed to evaluate '{}'", slot))?;
        let text = match value {
            Value::Text(text) => text,
            Value::Null => String::new(),
            other => bail!("Output '{}' produced {} instead of text", slot, other),
        };
        results.push((slot.to_string(), text));
    }
    Ok(results)
}

fn describe(args: &CompileArgs, optimize: bool) -> Result<String> {
    let book = load(&args.sheet, &args.names)?;
    let config = args
        .config()?
        .with_constant_folding(optimize)
        .with_inlining(optimize);
    let (builder, _) = bind(&book, args, config)?;
    let model = builder.compile().context("Failed to compile spreadsheet")?;
    Ok(model.describe())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn sheet(text: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        file.write_all(text.as_bytes()).unwrap();
        file
    }

    fn args(file: &tempfile::NamedTempFile, extra: &[&str]) -> CompileArgs {
        let path = file.path().to_str().unwrap();
        let mut argv = vec!["formcomp", "describe", path];
        argv.extend_from_slice(extra);
        match Cli::try_parse_from(argv).unwrap().command {
            Commands::Describe { compile, .. } => compile,
            Commands::Eval { .. } => unreachable!(),
        }
    }

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_output_is_required() {
        assert!(Cli::try_parse_from(["formcomp", "eval", "book.csv"]).is_err());
    }

    #[test]
    fn test_eval_sum() {
        let file = sheet("1,2,=SUM(A1:B1)\n");
        let args = args(&file, &["-o", "total=C1", "-i", "A1=1.5", "-i", "B1=2"]);
        assert_eq!(
            evaluate(&args, true).unwrap(),
            vec![("total".to_string(), "3.5".to_string())]
        );
    }

    #[test]
    fn test_eval_with_decimal_numeric_type() {
        let file = sheet("1,3,=A1/B1\n");
        let args = args(&file, &["-o", "C1", "-i", "A1=1", "--numeric", "decimal:4"]);
        assert_eq!(
            evaluate(&args, false).unwrap(),
            vec![("C1".to_string(), "0.3333".to_string())]
        );
    }

    #[test]
    fn test_eval_defined_names() {
        let file = sheet("2,4,=Price*Quantity\n");
        let args = args(
            &file,
            &[
                "--name",
                "Price=A1",
                "--name",
                "Quantity=B1",
                "-o",
                "C1",
                "-i",
                "Price=2.5",
            ],
        );
        assert_eq!(
            evaluate(&args, true).unwrap(),
            vec![("C1".to_string(), "10".to_string())]
        );
    }

    #[test]
    fn test_describe_folds_constants() {
        let file = sheet("1,2,=A1+B1*3\n");
        let optimized = describe(&args(&file, &["-o", "C1", "-i", "A1=0"]), true).unwrap();
        assert!(optimized.contains("(A1 + 6)"), "{}", optimized);

        let plain = describe(&args(&file, &["-o", "C1", "-i", "A1=0"]), false).unwrap();
        assert!(plain.contains("B1"), "{}", plain);
    }

    #[test]
    fn test_bad_arguments() {
        let file = sheet("1\n");
        assert!(evaluate(&args(&file, &["-o", "A1", "-i", "A1"]), true).is_err());
        assert!(evaluate(&args(&file, &["-o", "A1", "--numeric", "float"]), true).is_err());
        assert!(evaluate(&args(&file, &["-o", "not a ref"]), true).is_err());
    }
}
