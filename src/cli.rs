use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "zipread")]
#[command(version)]
#[command(about = "Read and extract ZIP archives", long_about = None)]
#[command(after_help = "Examples:\n  \
  zipread archive.zip                   print the archive's directory tree\n  \
  zipread -l archive.zip                list entries, one per line\n  \
  zipread -e docs -d out archive.zip    extract the docs directory into out/\n  \
  zipread -e . archive.zip              extract the whole archive")]
pub struct Cli {
    /// ZIP archive path
    #[arg(value_name = "ARCHIVE")]
    pub archive: String,

    /// List entries (short format)
    #[arg(short = 'l')]
    pub list: bool,

    /// List entries verbosely
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Extract the entry or directory at this archive path
    #[arg(short = 'e', long = "extract", value_name = "PATH")]
    pub extract: Option<String>,

    /// Extract into this directory
    #[arg(short = 'd', value_name = "DIR", default_value = ".")]
    pub dest: String,

    /// Concurrent extraction workers
    #[arg(short = 'j', long = "jobs", value_name = "N", default_value_t = 4)]
    pub jobs: usize,

    /// Quiet mode
    #[arg(short = 'q', action = clap::ArgAction::Count)]
    pub quiet: u8,
}

impl Cli {
    pub fn is_quiet(&self) -> bool {
        self.quiet > 0
    }
}
