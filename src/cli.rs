use clap::Parser;

#[derive(Parser, Debug)]
#[command(name = "epub-shrink")]
#[command(version)]
#[command(about = "Shrink EPUB files by pruning unused assets and recompressing images", long_about = None)]
#[command(after_help = "Examples:\n  \
  epub-shrink book.epub                     lossless pass, writes book-min.epub\n  \
  epub-shrink book.epub -t 2048             search lossy qualities until <= 2 MB\n  \
  epub-shrink book.epub -i '*promo*' -v     also purge promo files, list every disposition\n  \
  epub-shrink https://example.com/b.epub    shrink a remote package")]
pub struct Cli {
    /// EPUB file path or HTTP URL
    #[arg(value_name = "INPUT")]
    pub input: String,

    /// Output file (default: input stem + '-min.epub')
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<String>,

    /// Initial image quality (100 = lossless)
    #[arg(short = 'q', long = "quality", default_value_t = 100,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    pub quality: u8,

    /// Target size in KB; lower the quality step by step until reached
    #[arg(short = 't', long = "targetsize", value_name = "KB")]
    pub target_size: Option<u64>,

    /// Lowest quality the search will try
    #[arg(long = "floor", default_value_t = 15,
          value_parser = clap::value_parser!(u8).range(0..=100))]
    pub floor: u8,

    /// Quality decrement between attempts
    #[arg(long = "step", default_value_t = 5,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    pub step: u8,

    /// Extra glob pattern(s) to delete (can repeat)
    #[arg(short = 'i', long = "ignore", value_name = "PATTERN")]
    pub ignore: Vec<String>,

    /// Do not estimate JPEG source quality before the first lossy attempt
    #[arg(long = "no-estimate")]
    pub no_estimate: bool,

    /// Image worker threads (default: one per core)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Print disposition of each processed file
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// Quiet mode
    #[arg(long = "quiet", conflicts_with = "verbose")]
    pub quiet: bool,
}
