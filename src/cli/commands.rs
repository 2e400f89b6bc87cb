use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "arbor")]
#[command(version, about = "Ordered prompt trees stamped from templates")]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new arbor project in the current directory
    Init,

    /// Create a prompt tree from a template file
    Instantiate {
        /// Template file (YAML, or JSON with a .json extension)
        template: PathBuf,

        /// Attach the new tree under this node (UUID or unique prefix)
        #[arg(long)]
        parent: Option<String>,

        /// Name the root node verbatim instead of using the template name
        #[arg(long)]
        name: Option<String>,

        /// Variable values in format "name=value" (can be specified multiple times)
        #[arg(long = "var", short = 'v')]
        vars: Vec<String>,

        /// Do not warn about cross-tree references
        #[arg(long)]
        no_reference_warnings: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Move a node to a new slot, optionally under a new parent
    Move {
        /// Node ID (UUID or unique prefix)
        id: String,

        /// New parent node (defaults to the node's current parent)
        #[arg(long, conflicts_with = "root")]
        parent: Option<String>,

        /// Move to the top level
        #[arg(long)]
        root: bool,

        /// Zero-based position among the new siblings
        #[arg(long)]
        index: usize,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the tree, or the subtree under one node
    Tree {
        /// Node ID (UUID or unique prefix)
        id: Option<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List the variables a template uses and their initial values
    Variables {
        /// Template file
        template: PathBuf,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Import global settings (default model, instructions, model defaults) from YAML
    Settings {
        /// Settings file
        file: PathBuf,
    },

    /// Delete a node and everything under it
    Delete {
        /// Node ID (UUID or unique prefix)
        id: String,
    },
}
