//! Background persistence of derived planes.
//!
//! The caller points its plot state at the target path first, then
//! schedules the write. Until the file lands, the cache serves the staged
//! planes for that path; once written, they are registered for good.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::cache::{normalize, FitsCache, PlaneSet};
use crate::error::{PlotError, Result};
use crate::io::fits_writer::write_planes;
use crate::state::Band;
use crate::transform::TransformOp;

/// A file the engine will write, and what goes in it.
#[derive(Clone, Debug)]
pub struct DerivedFileDescriptor {
    pub target: PathBuf,
    pub planes: PlaneSet,
    pub band: Band,
    /// The target also replaces the band's original file.
    pub supersedes_original: bool,
}

#[derive(Clone, Debug)]
pub enum WriteJob {
    /// Uncompressed copy of a gzip source, all planes.
    Unzip {
        source: PathBuf,
        descriptor: DerivedFileDescriptor,
    },
    /// Output of one geometric operation.
    Geometric {
        op: TransformOp,
        params: Option<String>,
        descriptor: DerivedFileDescriptor,
    },
}

impl WriteJob {
    pub fn descriptor(&self) -> &DerivedFileDescriptor {
        match self {
            Self::Unzip { descriptor, .. } | Self::Geometric { descriptor, .. } => descriptor,
        }
    }

    pub fn target(&self) -> &Path {
        &self.descriptor().target
    }
}

fn run_job(job: &WriteJob) -> Result<()> {
    match job {
        WriteJob::Unzip { source, descriptor } => {
            write_planes(&descriptor.target, &descriptor.planes)?;
            info!(
                source = %source.display(),
                file = %descriptor.target.display(),
                planes = descriptor.planes.len(),
                "unzipped source written"
            );
        }
        WriteJob::Geometric { op, params, descriptor } => {
            write_planes(&descriptor.target, &descriptor.planes)?;
            info!(
                op = %op,
                params = params.as_deref().unwrap_or(""),
                band = %descriptor.band,
                file = %descriptor.target.display(),
                "derived file written"
            );
        }
    }
    Ok(())
}

/// Completion signal for one scheduled write. Dropping it does not cancel
/// the write.
pub struct WriteHandle {
    target: PathBuf,
    rx: mpsc::Receiver<Result<()>>,
}

impl WriteHandle {
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Block until the write finishes or `timeout` passes.
    pub fn wait(&self, timeout: Duration) -> Option<Result<()>> {
        self.rx.recv_timeout(timeout).ok()
    }
}

pub struct DerivedFileWriter {
    cache: Arc<FitsCache>,
    delay: Duration,
    in_flight: Arc<AtomicUsize>,
}

impl DerivedFileWriter {
    pub fn new(cache: Arc<FitsCache>, delay: Duration) -> Self {
        Self {
            cache,
            delay,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Start writing `job` on a background thread and return at once.
    /// Failures are logged; nothing is propagated to the caller.
    pub fn schedule(&self, job: WriteJob) -> WriteHandle {
        let target = job.target().to_path_buf();
        let (tx, rx) = mpsc::channel();
        self.cache.stage(&target, Arc::clone(&job.descriptor().planes));
        self.in_flight.fetch_add(1, Ordering::SeqCst);

        let cache = Arc::clone(&self.cache);
        let in_flight = Arc::clone(&self.in_flight);
        let delay = self.delay;
        let spawned = std::thread::Builder::new()
            .name("skyplot-writer".into())
            .spawn(move || {
                std::thread::sleep(delay);
                let result = run_job(&job);
                let descriptor = job.descriptor();
                match &result {
                    Ok(()) => cache.register(&descriptor.target, Arc::clone(&descriptor.planes)),
                    Err(e) => {
                        warn!(file = %descriptor.target.display(), "derived file write failed: {e}");
                        cache.unstage(&descriptor.target);
                    }
                }
                in_flight.fetch_sub(1, Ordering::SeqCst);
                let _ = tx.send(result);
            });

        if let Err(e) = spawned {
            warn!(file = %target.display(), "could not start writer thread: {e}");
            self.cache.unstage(&target);
            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            let (tx, rx) = mpsc::channel();
            let _ = tx.send(Err(PlotError::from(e)));
            return WriteHandle { target, rx };
        }
        WriteHandle { target, rx }
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Wait until no writes are running. Returns false on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while self.in_flight() > 0 {
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
        true
    }
}

/// Base name of a source file with `.gz` and the FITS extension removed.
pub fn base_name(source: &Path) -> String {
    let mut name = source
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".into());
    for ext in [".gz", ".fits", ".fit", ".fts"] {
        if name.len() > ext.len() && name.to_ascii_lowercase().ends_with(ext) {
            name.truncate(name.len() - ext.len());
        }
    }
    name
}

/// Base name for files derived from `source`. Sources outside `work_dir`
/// get a tag from their full path, so same-named files in different
/// directories never share a derived file. Files already in `work_dir`
/// carry their tag in the name.
pub fn derived_base(work_dir: &Path, source: &Path) -> String {
    let source = normalize(source);
    let stem = base_name(&source);
    if source.starts_with(normalize(work_dir)) {
        return stem;
    }
    let mut hasher = DefaultHasher::new();
    source.hash(&mut hasher);
    format!("{stem}-{:08x}", hasher.finish() as u32)
}

/// `{work_dir}/{base}-{plane}-{suffix}[-{params}].fits`
pub fn derived_path(
    work_dir: &Path,
    source: &Path,
    plane_index: usize,
    suffix: &str,
    params: Option<&str>,
) -> PathBuf {
    let mut name = format!("{}-{plane_index}-{suffix}", derived_base(work_dir, source));
    if let Some(p) = params.filter(|p| !p.is_empty()) {
        name.push('-');
        name.push_str(&sanitize(p));
    }
    name.push_str(".fits");
    work_dir.join(name)
}

/// Target of the uncompressed copy of a gzip source.
pub fn unzipped_path(work_dir: &Path, source: &Path) -> PathBuf {
    work_dir.join(format!("{}.fits", derived_base(work_dir, source)))
}

fn sanitize(s: &str) -> String {
    s.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_name(p: &Path) -> String {
        p.file_name().unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn derived_names_follow_the_pattern() {
        let work = Path::new("/work");
        let rot = file_name(&derived_path(work, Path::new("/data/m31.fits.gz"), 2, "rot", Some("30.00")));
        assert!(rot.starts_with("m31-"), "{rot}");
        assert!(rot.ends_with("-2-rot-30.00.fits"), "{rot}");
        assert_eq!(rot.len(), "m31-".len() + 8 + "-2-rot-30.00.fits".len());

        let flip = file_name(&derived_path(work, Path::new("/data/m31.fits"), 0, "flip", None));
        assert!(flip.ends_with("-0-flip.fits"), "{flip}");

        let unzipped = file_name(&unzipped_path(work, Path::new("/data/sky.FITS.gz")));
        assert!(unzipped.starts_with("sky-") && unzipped.ends_with(".fits"), "{unzipped}");
    }

    #[test]
    fn same_name_in_different_dirs_gets_different_targets() {
        let work = Path::new("/work");
        let a = derived_path(work, Path::new("/a/img.fits"), 0, "flip", None);
        let b = derived_path(work, Path::new("/b/img.fits"), 0, "flip", None);
        assert_ne!(a, b);
        assert_eq!(a, derived_path(work, Path::new("/a/img.fits"), 0, "flip", None));
    }

    #[test]
    fn files_in_work_dir_keep_their_name() {
        let work = Path::new("/work");
        assert_eq!(
            derived_path(work, Path::new("/work/m31-0a1b2c3d-0-flip.fits"), 0, "rot", Some("30.00")),
            PathBuf::from("/work/m31-0a1b2c3d-0-flip-0-rot-30.00.fits")
        );
    }

    #[test]
    fn params_cannot_leave_the_work_dir() {
        let p = derived_path(Path::new("/work"), Path::new("a.fits"), 0, "crop", Some("../../etc"));
        assert_eq!(p.parent(), Some(Path::new("/work")));
    }
}
