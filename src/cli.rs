//! Command-line interface for goahead.

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use crate::config::{Config, CONFIG_TEMPLATE};
use crate::project::LoadError;
use crate::report;
use crate::runner::Runner;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Compile-time code generation for Go.
///
/// goahead runs helper functions from files marked `//go:ahead functions`
/// and writes their results into the source lines that follow `//:Name`
/// placeholders. `//:inject:Name` copies a helper and its dependencies
/// after an interface declaration.
#[derive(Parser)]
#[command(name = "goahead")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Replace placeholders and inject helpers under a directory
    #[command(visible_alias = "run")]
    Generate(GenerateArgs),
    /// Write a commented goahead.yaml
    Init(InitArgs),
}

/// Arguments for the generate command.
#[derive(Parser)]
pub struct GenerateArgs {
    /// Project root to process
    #[arg(default_value = ".")]
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover in PATH)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,

    /// Print debug output (same as setting GOAHEAD_DEBUG)
    #[arg(short, long)]
    pub verbose: bool,
}

/// Arguments for the init command.
#[derive(Parser)]
pub struct InitArgs {
    /// Output file path
    #[arg(short, long, default_value = "goahead.yaml")]
    pub output: PathBuf,
}

/// Run the generate command.
pub fn run_generate(args: &GenerateArgs) -> anyhow::Result<i32> {
    report::set_verbose(args.verbose);

    if args.format != "pretty" && args.format != "json" {
        eprintln!(
            "Error: invalid format {:?}, must be 'pretty' or 'json'",
            args.format
        );
        return Ok(EXIT_ERROR);
    }

    let metadata = match std::fs::metadata(&args.path) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(EXIT_ERROR);
        }
    };
    if !metadata.is_dir() {
        eprintln!("Error: {} is not a directory", args.path.display());
        return Ok(EXIT_ERROR);
    }

    let config = match Config::load(&args.path, args.config.as_deref()) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(EXIT_ERROR);
        }
    };

    let runner = Runner::new(config);
    let result = match runner.run(&args.path) {
        Ok(result) => result,
        Err(e) => {
            return Ok(match e.downcast_ref::<LoadError>() {
                Some(load) => {
                    eprintln!("{} error: {}", report::TAG, load);
                    EXIT_FAILED
                }
                None => {
                    eprintln!("Error: {:#}", e);
                    EXIT_ERROR
                }
            });
        }
    };

    let path_str = args.path.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&path_str, &result)?,
        _ => report::write_pretty(&path_str, &result),
    }

    if result.has_errors() {
        Ok(EXIT_FAILED)
    } else {
        Ok(EXIT_SUCCESS)
    }
}

/// Run the init command.
pub fn run_init(args: &InitArgs) -> anyhow::Result<i32> {
    if args.output.exists() {
        eprintln!("Error: file already exists: {}", args.output.display());
        eprintln!("Remove it or use --output to specify a different path");
        return Ok(EXIT_ERROR);
    }

    if let Some(parent) = args.output.parent() {
        if !parent.as_os_str().is_empty() && parent != Path::new(".") {
            if let Err(e) = std::fs::create_dir_all(parent) {
                eprintln!("Error: failed to create directory: {}", e);
                return Ok(EXIT_ERROR);
            }
        }
    }

    // Make sure the template we ship still parses.
    Config::parse_str(CONFIG_TEMPLATE)?;

    if let Err(e) = std::fs::write(&args.output, CONFIG_TEMPLATE) {
        eprintln!("Error: failed to write config: {}", e);
        return Ok(EXIT_ERROR);
    }

    println!("Created {}", args.output.display());
    println!();
    println!("Next steps:");
    println!("  1. Mark a helper file with `//go:ahead functions` (and `//go:build ignore`)");
    println!("  2. Run: goahead generate .");

    Ok(EXIT_SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_init_writes_template_once() {
        let temp = TempDir::new().unwrap();
        let args = InitArgs {
            output: temp.path().join("conf/goahead.yaml"),
        };
        assert_eq!(run_init(&args).unwrap(), EXIT_SUCCESS);
        let written = std::fs::read_to_string(&args.output).unwrap();
        assert_eq!(written, CONFIG_TEMPLATE);
        assert_eq!(run_init(&args).unwrap(), EXIT_ERROR);
    }

    #[test]
    fn test_generate_rejects_bad_format() {
        let temp = TempDir::new().unwrap();
        let args = GenerateArgs {
            path: temp.path().to_path_buf(),
            config: None,
            format: "sarif".to_string(),
            verbose: false,
        };
        assert_eq!(run_generate(&args).unwrap(), EXIT_ERROR);
    }

    #[test]
    fn test_generate_on_empty_project_succeeds() {
        let temp = TempDir::new().unwrap();
        let args = GenerateArgs {
            path: temp.path().to_path_buf(),
            config: None,
            format: "json".to_string(),
            verbose: false,
        };
        assert_eq!(run_generate(&args).unwrap(), EXIT_SUCCESS);
    }

    #[test]
    fn test_cli_parses_alias() {
        let cli = Cli::try_parse_from(["goahead", "run", "src", "--format", "json"]).unwrap();
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.path, PathBuf::from("src"));
                assert_eq!(args.format, "json");
            }
            Commands::Init(_) => panic!("expected generate"),
        }
    }
}
