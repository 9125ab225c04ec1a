use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

mod format;
mod inspect;
mod merge_cmd;
mod telemetry;

/// Region-scoped feature model merger
///
/// Merges feature models written per region (market, country, product
/// line) into one model. The merged model accepts exactly the
/// configurations some region accepts. Constraints shared by every region
/// are stated once; the rest stay guarded by a region indicator.
///
/// QUICK START:
///
///   regionmerge check demos/car-eu.toml
///   regionmerge merge demos/car-eu.toml demos/car-us.toml -o merged.toml
///   regionmerge count merged.toml --where region=0
///
/// CONFIGURATION:
///
///   Settings are read from ./regionmerge.toml when present (or --config).
///   Command-line flags override file values.
///
/// LOGGING:
///
///   REGIONMERGE_LOG=regionmerge=debug regionmerge merge ...
#[derive(Parser)]
#[command(name = "regionmerge")]
#[command(version, about)]
#[command(propagate_version = true)]
#[command(
    after_help = "See 'regionmerge <command> --help' for more information on a specific command."
)]
struct Cli {
    /// Log event format on stderr
    #[arg(long, global = true, value_enum, default_value_t)]
    log_format: telemetry::LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge region model files into one model
    ///
    /// Files are merged in the order given; with the integer strategy the
    /// first file gets indicator value 0, the second 1, and so on.
    ///
    /// Examples:
    ///   regionmerge merge eu.toml us.toml > merged.toml
    ///   regionmerge merge eu.toml us.toml -o merged.toml --report json
    ///   regionmerge merge eu.toml us.toml --strategy feature-tree
    #[command(verbatim_doc_comment)]
    Merge(merge_cmd::MergeArgs),

    /// Count the solutions of a model file
    ///
    /// Examples:
    ///   regionmerge count eu.toml
    ///   regionmerge count merged.toml --where region=1
    #[command(verbatim_doc_comment)]
    Count(inspect::CountArgs),

    /// Validate a model file and check that it has a solution
    Check(inspect::CheckArgs),

    /// Print shell completions
    Completions {
        /// Target shell
        shell: Shell,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init(cli.log_format);

    match cli.command {
        Commands::Merge(ref args) => merge_cmd::run(args),
        Commands::Count(ref args) => inspect::count(args),
        Commands::Check(ref args) => inspect::check(args),
        Commands::Completions { shell } => {
            clap_complete::generate(
                shell,
                &mut Cli::command(),
                "regionmerge",
                &mut std::io::stdout(),
            );
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
