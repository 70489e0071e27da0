//! Command line interface definition

use clap::{Args, Parser, Subcommand};
use pkgreg_types::PackageType;
use std::path::PathBuf;

/// pkgreg - operate a local package registry
#[derive(Parser)]
#[command(name = "pkgreg")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Operate a local pkgreg package registry")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to stderr
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Registry data directory (overrides config)
    #[arg(long, global = true, value_name = "DIR")]
    pub data_dir: Option<PathBuf>,
}

/// Organization a command operates on
#[derive(Args, Clone)]
pub struct OrgArg {
    /// Organization id
    #[arg(long, env = "PKGREG_ORG")]
    pub org: String,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Upload a file as a new package version
    Push {
        /// Artifact to upload
        file: PathBuf,

        #[command(flatten)]
        org: OrgArg,

        /// Package name
        #[arg(long)]
        name: String,

        /// Package version
        #[arg(long)]
        version: String,

        /// Package type
        #[arg(long = "type", value_enum)]
        package_type: PackageType,

        /// Expected digest as `algorithm:hex`; computed from the file if omitted
        #[arg(long)]
        checksum: Option<String>,
    },

    /// Show one package
    Get {
        #[command(flatten)]
        org: OrgArg,

        /// Package name
        name: String,

        /// Package version, or `latest`
        version: String,

        /// Package type
        #[arg(long = "type", value_enum)]
        package_type: PackageType,

        /// Include a signed download URL
        #[arg(long)]
        url: bool,
    },

    /// List packages of an organization
    #[command(alias = "ls")]
    List {
        #[command(flatten)]
        org: OrgArg,

        /// Only packages with this name
        #[arg(long)]
        name: Option<String>,

        /// Only packages with this version
        #[arg(long)]
        version: Option<String>,

        /// Only packages of this type
        #[arg(long = "type", value_enum)]
        package_type: Option<PackageType>,

        /// Include signed download URLs
        #[arg(long)]
        url: bool,
    },

    /// Delete package versions
    #[command(alias = "rm")]
    Delete {
        #[command(flatten)]
        org: OrgArg,

        /// Package type of every listed package
        #[arg(long = "type", value_enum)]
        package_type: PackageType,

        /// Packages as `name@version`
        #[arg(required = true)]
        packages: Vec<String>,
    },

    /// Download the blob behind a signed URL
    Fetch {
        /// Signed download URL
        url: String,

        /// Output file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Reclaim abandoned uploads
    Sweep,
}

/// Split a `name@version` argument
pub fn parse_name_version(spec: &str) -> Option<(&str, &str)> {
    let (name, version) = spec.rsplit_once('@')?;
    if name.is_empty() || version.is_empty() {
        return None;
    }
    Some((name, version))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_name_version() {
        assert_eq!(parse_name_version("nav@1.0.0"), Some(("nav", "1.0.0")));
        assert_eq!(parse_name_version("scoped@pkg@2"), Some(("scoped@pkg", "2")));
        assert_eq!(parse_name_version("nav"), None);
        assert_eq!(parse_name_version("@1.0"), None);
        assert_eq!(parse_name_version("nav@"), None);
    }
}
