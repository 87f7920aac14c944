use clap::{ArgAction, Parser, Subcommand, ValueHint};

#[derive(Parser)]
#[command(
    author,
    version,
    about,
    help_template = "{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}",
    arg_required_else_help = true
)]
pub struct Args {
    /// Set output verbosity
    #[arg(short = 'v', long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress outputs
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Output logs as json
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Disable colors in output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Provide custom config file
    #[arg(short, long, global = true, value_hint = ValueHint::FilePath)]
    pub config: Option<String>,

    /// Set proxy
    #[arg(required = false, long, short = 'P', global = true)]
    pub proxy: Option<String>,

    /// Set request headers
    #[arg(required = false, long, short = 'H', global = true)]
    pub header: Option<Vec<String>>,

    /// Set user agent
    #[arg(required = false, long, short = 'A', global = true)]
    pub user_agent: Option<String>,

    #[clap(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the configuration file to stdout
    Config,

    /// Generate default config
    #[clap(name = "defconfig")]
    DefConfig,

    /// Show the metadata of a published artifact
    #[command(arg_required_else_help = true)]
    Info {
        /// Channel name or URL, e.g. conda-forge
        channel: String,

        /// Platform subdir, e.g. linux-64 or noarch
        subdir: String,

        /// Artifact file name, e.g. attrs-23.1.0-pyhd8ed1ab_0.conda
        artifact: String,

        /// Backend to read from (oci, streamed, libcfgraph)
        #[arg(required = false, short, long)]
        backend: Option<String>,

        /// Drop listed files ending with this suffix (repeatable)
        #[arg(required = false, short, long = "skip-suffix")]
        skip_suffix: Vec<String>,
    },

    /// Show the metadata of a package file on disk
    #[command(arg_required_else_help = true)]
    Inspect {
        /// Path to a .conda or .tar.bz2 file
        #[arg(value_hint = ValueHint::FilePath)]
        path: String,
    },

    /// List the feedstocks allowed to publish packages
    #[command(arg_required_else_help = true)]
    Feedstock {
        /// Package names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the sharded feedstock-outputs path of a package
    #[command(arg_required_else_help = true)]
    #[clap(name = "shard-path")]
    ShardPath {
        /// Package name
        name: String,

        /// Number of shard directories (defaults to the remote config)
        #[arg(required = false, long)]
        level: Option<usize>,

        /// Padding character for short names
        #[arg(required = false, long)]
        fill: Option<char>,

        /// Base directory of the output files
        #[arg(required = false, long)]
        base: Option<String>,
    },

    /// Map Python imports to conda packages
    #[command(arg_required_else_help = true)]
    Import {
        /// Import names, e.g. numpy.linalg
        #[arg(required = true)]
        names: Vec<String>,

        /// Print every candidate package instead of the best guess
        #[arg(required = false, short, long)]
        all: bool,

        /// Use the frozen libcfgraph import maps
        #[arg(required = false, long)]
        libcfgraph: bool,
    },

    /// Map PyPI names to conda package names
    #[command(arg_required_else_help = true)]
    Pypi {
        /// PyPI distribution names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Print the conda-forge linter hints
    Hints,

    /// Bulk repodata operations
    #[command(arg_required_else_help = true)]
    Repodata {
        #[command(subcommand)]
        action: RepodataAction,
    },
}

#[derive(Subcommand)]
pub enum RepodataAction {
    /// Download repodata into the cache directory
    Fetch {
        /// Subdirs to fetch (all when omitted)
        subdirs: Vec<String>,

        /// Download even if a cached copy exists
        #[arg(required = false, short, long)]
        force: bool,

        /// Channel label
        #[arg(required = false, short, long, default_value = "main")]
        label: String,
    },

    /// List every artifact as subdir/filename
    List {
        /// Include artifacts marked as broken
        #[arg(required = false, long)]
        broken: bool,
    },

    /// Count artifacts
    Count {
        /// Include artifacts marked as broken
        #[arg(required = false, long)]
        broken: bool,
    },
}
