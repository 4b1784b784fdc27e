use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use anyhow::bail;
use rollcall_core::builder::build_gallery;
use rollcall_core::recognizer::{tolerance_too_strict, ARCFACE_MATCH_TOLERANCE};
use rollcall_core::{
    default_data_dir, default_model_dir, identify, DecoderChain, EuclideanMatcher, FaceAnalyzer,
    Gallery, GalleryError, OnnxFaceAnalyzer,
};
use rollcall_ledger::{AttendanceRecord, Ledger, LedgerBackend, LedgerStore, MarkOutcome};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rollcall", version, about = "Rollcall face-recognition attendance CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct GalleryArgs {
    /// Gallery blob (default: $XDG_DATA_HOME/rollcall/gallery.json)
    #[arg(long, env = "ROLLCALL_GALLERY_PATH")]
    gallery: Option<PathBuf>,
}

impl GalleryArgs {
    fn path(&self) -> PathBuf {
        self.gallery
            .clone()
            .unwrap_or_else(|| default_data_dir().join("gallery.json"))
    }
}

#[derive(Args)]
struct ModelArgs {
    /// Directory holding det_10g.onnx and w600k_r50.onnx
    #[arg(long, env = "ROLLCALL_MODEL_DIR")]
    model_dir: Option<PathBuf>,
}

impl ModelArgs {
    fn load(&self) -> Result<OnnxFaceAnalyzer> {
        let dir = self.model_dir.clone().unwrap_or_else(default_model_dir);
        OnnxFaceAnalyzer::load(&dir)
            .with_context(|| format!("failed to load face models from {}", dir.display()))
    }
}

#[derive(Args)]
struct LedgerArgs {
    /// Attendance ledger location (default: $XDG_DATA_HOME/rollcall/attendance.{csv,db})
    #[arg(long, env = "ROLLCALL_LEDGER_PATH")]
    ledger: Option<PathBuf>,
    /// Ledger backend: csv or sqlite
    #[arg(long, env = "ROLLCALL_LEDGER_BACKEND", default_value = "csv")]
    backend: LedgerBackend,
    #[command(flatten)]
    gallery: GalleryArgs,
}

impl LedgerArgs {
    /// Open the ledger, seeding a new table from the gallery's identities.
    ///
    /// A missing gallery is tolerated only when the table already exists, so
    /// the roster is never frozen empty before the gallery is built.
    fn open(&self) -> Result<Ledger> {
        let path = self
            .ledger
            .clone()
            .unwrap_or_else(|| default_data_dir().join(self.backend.default_file_name()));
        let store = self
            .backend
            .open(&path)
            .with_context(|| format!("failed to open ledger at {}", path.display()))?;

        let gallery_path = self.gallery.path();
        let roster = match Gallery::load(&gallery_path) {
            Ok(gallery) => gallery.identities(),
            Err(GalleryError::NotFound(_)) => {
                if !store.exists()? {
                    bail!(
                        "no ledger at {} and no gallery at {} to seed it from; \
                         run `rollcall build-gallery` first",
                        path.display(),
                        gallery_path.display()
                    );
                }
                tracing::debug!(
                    gallery = %gallery_path.display(),
                    "no gallery; using the existing ledger as is"
                );
                Vec::new()
            }
            Err(e) => {
                let context = format!("failed to load gallery from {}", gallery_path.display());
                return Err(anyhow::Error::new(e).context(context));
            }
        };
        Ok(Ledger::new(store, roster))
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Build a gallery from a directory of per-identity photo folders
    BuildGallery {
        /// Dataset root; each subdirectory name is an identity
        #[arg(long)]
        dataset: PathBuf,
        /// Where to write the gallery (default: $XDG_DATA_HOME/rollcall/gallery.json)
        #[arg(long, env = "ROLLCALL_GALLERY_PATH")]
        output: Option<PathBuf>,
        #[command(flatten)]
        models: ModelArgs,
    },
    /// Show identities and sample counts in a gallery
    InspectGallery {
        #[command(flatten)]
        gallery: GalleryArgs,
    },
    /// Match a single photo against the gallery without touching the ledger
    Identify {
        /// Photo to identify
        image: PathBuf,
        /// Distance below which the nearest entry is accepted
        #[arg(long, env = "ROLLCALL_MATCH_TOLERANCE", default_value_t = ARCFACE_MATCH_TOLERANCE)]
        tolerance: f32,
        #[command(flatten)]
        gallery: GalleryArgs,
        #[command(flatten)]
        models: ModelArgs,
    },
    /// Print the attendance table
    Attendance {
        #[command(flatten)]
        ledger: LedgerArgs,
    },
    /// Mark an identity present now
    Mark {
        /// Identity to mark
        name: String,
        #[command(flatten)]
        ledger: LedgerArgs,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::BuildGallery {
            dataset,
            output,
            models,
        } => {
            let output = output.unwrap_or_else(|| default_data_dir().join("gallery.json"));
            let mut analyzer = models.load()?;
            let (gallery, report) =
                build_gallery(&dataset, &DecoderChain::standard(), &mut analyzer).with_context(
                    || format!("failed to build gallery from {}", dataset.display()),
                )?;
            gallery
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;

            println!(
                "Enrolled {} sample(s) across {} identities into {}",
                report.enrolled,
                gallery.identities().len(),
                output.display()
            );
            for skipped in &report.skipped {
                println!("  skipped {}: {}", skipped.path.display(), skipped.reason);
            }
        }
        Commands::InspectGallery { gallery } => {
            let path = gallery.path();
            let gallery = load_gallery(&path)?;
            print!("{}", render_gallery(&gallery));
        }
        Commands::Identify {
            image,
            tolerance,
            gallery,
            models,
        } => {
            let gallery = load_gallery(&gallery.path())?;
            if tolerance_too_strict(tolerance, gallery.dimension()) {
                tracing::warn!(
                    tolerance,
                    "match tolerance is too strict for ArcFace embeddings; expect Unknown"
                );
            }
            let mut analyzer = models.load()?;

            let bytes = std::fs::read(&image)
                .with_context(|| format!("failed to read {}", image.display()))?;
            let pixels = DecoderChain::standard().decode(&bytes)?;
            let faces = analyzer.analyze(&pixels)?;
            let (identification, result) =
                identify(&EuclideanMatcher, &faces, &gallery, tolerance)?;

            match result.and_then(|r| r.distance) {
                Some(distance) => println!("{identification} (distance {distance:.4})"),
                None => println!("{identification}"),
            }
        }
        Commands::Attendance { ledger } => {
            let ledger = ledger.open()?;
            print!("{}", render_attendance(&ledger.list_all()?));
        }
        Commands::Mark { name, ledger } => {
            let ledger = ledger.open()?;
            let now = chrono::Local::now().naive_local();
            match ledger.mark_present(&name, now)? {
                MarkOutcome::Skipped => println!("'{name}' is not an identity; nothing marked"),
                MarkOutcome::Updated => println!("Marked {name} present"),
                MarkOutcome::Appended => println!("Added {name} to the ledger as present"),
            }
        }
    }

    Ok(())
}

fn load_gallery(path: &Path) -> Result<Gallery> {
    Gallery::load(path).with_context(|| format!("failed to load gallery from {}", path.display()))
}

fn render_gallery(gallery: &Gallery) -> String {
    let mut out = format!(
        "{} entries, {} identities, dimension {}",
        gallery.len(),
        gallery.identities().len(),
        gallery
            .dimension()
            .map_or_else(|| "-".to_string(), |d| d.to_string())
    );
    if let Some(version) = gallery.model_version() {
        out.push_str(&format!(", model {version}"));
    }
    out.push('\n');
    for (identity, count) in gallery.sample_counts() {
        out.push_str(&format!("  {identity}: {count}\n"));
    }
    out
}

fn render_attendance(records: &[AttendanceRecord]) -> String {
    let width = records
        .iter()
        .map(|r| r.identity.chars().count())
        .chain(std::iter::once("Name".len()))
        .max()
        .unwrap_or(0);

    let mut out = format!("{:<width$}  {:<7}  LastMarked\n", "Name", "Status");
    for record in records {
        out.push_str(&format!(
            "{:<width$}  {:<7}  {}\n",
            record.identity,
            record.status.as_str(),
            record.last_marked_cell()
        ));
    }
    out
}
