use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::classify::ClassifierConfig;
use crate::marker::DEFAULT_SEPARATOR;
use crate::preprocess::Brightness;

#[derive(Parser)]
#[command(name = "qrsplit")]
#[command(about = "Split PDF files into separate documents at QR-code separator pages")]
#[command(version)]
#[command(subcommand_negates_reqs = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    #[command(flatten)]
    pub split: SplitArgs,

    /// Show verbose processing messages
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Show debug messages (implies --verbose)
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as MCP server
    Mcp,

    /// List separator pages without writing any files
    Scan {
        /// PDF file to scan
        path: PathBuf,

        #[command(flatten)]
        marker: MarkerArgs,
    },
}

#[derive(Args, Debug, Clone)]
pub struct SplitArgs {
    /// Filename or glob to process (write ./scan or ./mcp for files with those names)
    #[arg(value_name = "INPUTFILE", required = true)]
    pub pattern: Option<String>,

    /// Prefix for generated PDF files (reserved; files are named after their separator label)
    #[arg(short, long, default_value = "split")]
    pub prefix: String,

    #[command(flatten)]
    pub marker: MarkerArgs,

    /// Keep separator page in previous document
    #[arg(short, long)]
    pub keep_page: bool,

    /// Keep separator page in next document
    #[arg(long)]
    pub keep_page_next: bool,

    /// Directory to write the split files to
    #[arg(short, long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct MarkerArgs {
    /// Barcode content used to find separator pages
    #[arg(short, long, default_value = DEFAULT_SEPARATOR)]
    pub separator: String,

    /// Brightness threshold for barcode preparation (0-255)
    #[arg(short, long, default_value_t = 128, allow_negative_numbers = true)]
    pub brightness: i64,
}

impl Default for MarkerArgs {
    fn default() -> Self {
        MarkerArgs {
            separator: DEFAULT_SEPARATOR.to_string(),
            brightness: i64::from(Brightness::DEFAULT.value()),
        }
    }
}

impl MarkerArgs {
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            brightness: Brightness::clamped(self.brightness),
            separator: self.separator.clone(),
        }
    }
}
