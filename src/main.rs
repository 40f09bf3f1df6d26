//! # Sello CLI
//!
//! Command-line batch renderer for mail-merge images.
//!
//! ## Usage
//!
//! ```bash
//! # Render one PNG per CSV row into out.zip
//! sello render --data guests.csv --template invite.png
//!
//! # Reuse a saved layout and pick the output path
//! sello render --data guests.csv --template invite.png \
//!     --state sello-state.json --out invites.zip
//!
//! # Load fonts from a local directory instead of the network
//! sello render --data guests.csv --template invite.png --fonts-dir ./fonts
//!
//! # List the available font catalog
//! sello fonts
//! sello fonts --filter mono
//! ```

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

use sello::{
    SelloError, Session,
    fonts::{DirFontProvider, FontBook, FontService, GlyphTextBackend},
    persist::FileStore,
};

/// Sello - batch mail-merge image renderer
#[derive(Parser, Debug)]
#[command(name = "sello")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Render every dataset row over the template into a ZIP archive
    Render {
        /// CSV dataset with a header row
        #[arg(long, value_name = "FILE")]
        data: PathBuf,

        /// Template image (PNG or JPEG)
        #[arg(long, value_name = "FILE")]
        template: PathBuf,

        /// Layout state file (positions, styles, removed fonts)
        #[arg(long, value_name = "FILE", default_value = "sello-state.json")]
        state: PathBuf,

        /// Output archive path
        #[arg(long, value_name = "FILE", default_value = "out.zip")]
        out: PathBuf,

        /// Load fonts from a directory of `<family>.ttf` files instead of
        /// fetching them over the network
        #[arg(long, value_name = "DIR")]
        fonts_dir: Option<PathBuf>,
    },

    /// List the font catalog
    Fonts {
        /// Case-insensitive substring filter
        #[arg(long)]
        filter: Option<String>,

        /// Layout state file (consulted for removed fonts)
        #[arg(long, value_name = "FILE", default_value = "sello-state.json")]
        state: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    env_logger::init();
    if let Err(e) = run().await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), SelloError> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Render {
            data,
            template,
            state,
            out,
            fonts_dir,
        } => {
            let store = Arc::new(FileStore::open(&state));
            let mut session = match fonts_dir {
                Some(dir) => {
                    let book = Arc::new(FontBook::default());
                    let provider = Arc::new(DirFontProvider::new(dir, book.clone()));
                    let fonts = Arc::new(FontService::new(provider, store.clone()));
                    let backend = Arc::new(GlyphTextBackend::new(book));
                    Session::new(fonts, backend, store)
                }
                None => Session::over_http(store)?,
            };

            session.load_template(&std::fs::read(&template)?)?;
            session.load_dataset(&std::fs::read(&data)?)?;

            println!("Verifying fonts...");
            let report = session.verify_fonts().await;
            println!(
                "{} fonts available, {} removed",
                report.available.len(),
                report.removed.len()
            );

            let total_rows = session.dataset().map(|d| d.len()).unwrap_or(0);
            println!("Rendering {} rows...", total_rows);
            let outcome = session
                .export_all(|done, total| {
                    log::info!("rendered {}/{} rows", done, total);
                })
                .await?;

            for failure in &outcome.report.failures {
                eprintln!("  row {}: {}", failure.row_index, failure.reason);
            }
            std::fs::write(&out, &outcome.archive)?;
            println!(
                "Wrote {} ({} rendered, {} failed)",
                out.display(),
                outcome.report.succeeded,
                outcome.report.failed
            );
            Ok(())
        }

        Commands::Fonts { filter, state } => {
            let store = Arc::new(FileStore::open(&state));
            let session = Session::over_http(store)?;

            println!("Verifying fonts...");
            let report = session.verify_fonts().await;
            for family in session.search_fonts(filter.as_deref().unwrap_or("")) {
                println!("  {}", family);
            }
            if !report.removed.is_empty() {
                println!("{} unavailable: {}", report.removed.len(), report.removed.join(", "));
            }
            Ok(())
        }
    }
}
