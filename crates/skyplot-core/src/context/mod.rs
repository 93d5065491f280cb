//! Per-session plot contexts.
//!
//! Every operation starts with [`PlotContextManager::prepare`], which turns
//! the session's band files into an [`ActiveImageGroup`]. If those files
//! cannot be read or parsed, the plot is rebuilt once from the requests it
//! was made from and resolution is retried; a second failure leaves the
//! context `Failed`.

mod ops;
mod registry;

pub use ops::PlotView;
pub use registry::{PlotPhase, SessionRecord, SessionRegistry};

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::cache::{normalize, FitsCache, FitsSource, MemoryStore};
use crate::config::EngineConfig;
use crate::error::{PlotError, Result};
use crate::group::ActiveImageGroup;
use crate::plane::ImagePlane;
use crate::request::PlotRequest;
use crate::state::{Band, BandState, ContextKey, PlotState};
use crate::stretch::StretchEngine;
use crate::transform::{self, TransformOp};
use crate::writer::{
    derived_path, unzipped_path, DerivedFileDescriptor, DerivedFileWriter, WriteJob,
};

pub struct PlotContextManager {
    cache: Arc<FitsCache>,
    writer: DerivedFileWriter,
    stretch: StretchEngine,
    config: EngineConfig,
    sessions: SessionRegistry,
    recreations: AtomicUsize,
}

impl PlotContextManager {
    /// Manager with an in-process store and the FITS reader.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let store = Arc::new(MemoryStore::new(config.cache.capacity_bytes, config.cache_ttl()));
        let source = Arc::new(FitsSource::new(config.max_file_size));
        Self::new(config, Arc::new(FitsCache::new(store, source)))
    }

    pub fn new(config: EngineConfig, cache: Arc<FitsCache>) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.work_dir)
            .map_err(|e| PlotError::io_at(&config.work_dir, e))?;
        let stretch = StretchEngine::new(config.stretch.parallel_cores, config.stretch_timeout())?;
        let writer = DerivedFileWriter::new(Arc::clone(&cache), config.write_delay());
        Ok(Self {
            cache,
            writer,
            stretch,
            config,
            sessions: SessionRegistry::default(),
            recreations: AtomicUsize::new(0),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<FitsCache> {
        &self.cache
    }

    pub fn phase(&self, key: &ContextKey) -> Option<PlotPhase> {
        self.sessions.get(key).map(|r| r.phase)
    }

    pub fn state(&self, key: &ContextKey) -> Option<PlotState> {
        self.sessions.get(key).map(|r| r.state)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Recreation passes run since the manager started.
    pub fn recreation_count(&self) -> usize {
        self.recreations.load(Ordering::SeqCst)
    }

    /// Take back a state held by a caller whose session was evicted.
    pub fn restore(&self, state: PlotState) -> ContextKey {
        let key = state.context_key.clone();
        self.sessions.insert(state, PlotPhase::Uninitialized);
        key
    }

    pub fn delete_plot(&self, key: &ContextKey) -> bool {
        let removed = self.sessions.remove(key);
        if removed {
            info!(context = %key, "plot deleted");
        }
        removed
    }

    pub fn evict_idle(&self) -> usize {
        let evicted = self.sessions.evict_idle(self.config.session_idle());
        if evicted > 0 {
            info!(evicted, "evicted idle plot contexts");
        }
        evicted
    }

    /// Wait for background writes to finish. Returns false on timeout.
    pub fn flush_writes(&self, timeout: Duration) -> bool {
        self.writer.wait_idle(timeout)
    }

    /// Resolve the session's planes, recreating the plot once if its files
    /// are gone or unreadable. The recreated state is stored before
    /// returning.
    pub fn prepare(&self, key: &ContextKey) -> Result<(PlotState, ActiveImageGroup)> {
        let record = self.sessions.touch(key)?;
        if record.phase == PlotPhase::Failed {
            return Err(PlotError::Staleness(format!(
                "plot {key} could not be recreated earlier"
            )));
        }

        let first = match self.resolve_group(&record.state) {
            Ok(group) => {
                if record.phase != PlotPhase::Valid {
                    self.sessions.set_phase(key, PlotPhase::Valid);
                }
                return Ok((record.state, group));
            }
            Err(e) if e.is_stale_source() => e,
            Err(e) => return Err(e),
        };

        warn!(context = %key, "plot is stale ({first}), recreating");
        self.sessions.set_phase(key, PlotPhase::Stale);
        self.sessions.set_phase(key, PlotPhase::Recreating);
        self.recreations.fetch_add(1, Ordering::SeqCst);

        let rebuilt = self
            .recreate(&record.state)
            .and_then(|state| self.resolve_group(&state).map(|group| (state, group)));
        match rebuilt {
            Ok((state, group)) => {
                info!(context = %key, "plot recreated");
                self.sessions.replace(state.clone(), PlotPhase::Valid)?;
                Ok((state, group))
            }
            Err(e) => {
                warn!(context = %key, "plot recreation failed: {e}");
                self.sessions.set_phase(key, PlotPhase::Failed);
                Err(PlotError::Staleness(format!(
                    "plot {key} could not be recreated: {e}"
                )))
            }
        }
    }

    fn resolve_group(&self, state: &PlotState) -> Result<ActiveImageGroup> {
        let mut group = ActiveImageGroup::new();
        for (band, bs) in &state.bands {
            let planes = self.cache.get_or_parse(&bs.working_file)?;
            let plane = planes.get(bs.image_index).ok_or_else(|| {
                PlotError::parse(format!(
                    "{} has no plane {}",
                    bs.working_file.display(),
                    bs.image_index
                ))
            })?;
            group.insert(*band, Arc::clone(plane));
        }
        if group.is_empty() {
            return Err(PlotError::MissingBand("any".into()));
        }
        Ok(group)
    }

    /// Rebuild every band from its request, keeping the session's current
    /// display settings.
    fn recreate(&self, state: &PlotState) -> Result<PlotState> {
        let mut fresh = state.clone();
        for (band, bs) in fresh.bands.iter_mut() {
            let rebuilt = self.build_band(*band, &bs.request)?;
            *bs = BandState {
                range: bs.range.clone(),
                visible: bs.visible,
                ..rebuilt
            };
        }
        Ok(fresh)
    }

    /// Parse the request's source, run its operations, and schedule the
    /// derived files. The returned state already points at them.
    pub(crate) fn build_band(&self, band: Band, request: &PlotRequest) -> Result<BandState> {
        self.check_source(&request.source)?;
        let planes = self.cache.get_or_parse(&request.source)?;
        let plane = planes.get(request.plane_index).ok_or_else(|| {
            PlotError::parse(format!(
                "{} has no plane {}",
                request.source.display(),
                request.plane_index
            ))
        })?;

        let mut working = request.source.clone();
        let mut original = request.source.clone();
        let mut index = request.plane_index;

        if is_gzip(&request.source) {
            let target = unzipped_path(&self.config.work_dir, &request.source);
            self.check_target(&target)?;
            self.writer.schedule(WriteJob::Unzip {
                source: request.source.clone(),
                descriptor: DerivedFileDescriptor {
                    target: target.clone(),
                    planes: Arc::clone(&planes),
                    band,
                    supersedes_original: true,
                },
            });
            working = target.clone();
            original = target;
        }

        if request.has_post_processing() {
            let outcome = transform::apply(plane, &request.ops)?;
            for step in outcome.steps {
                let target = self.schedule_step(band, &working, index, &step.op, step.params, step.plane)?;
                working = target;
                index = 0;
            }
        }

        Ok(BandState {
            working_file: working,
            original_file: original,
            image_index: index,
            original_image_index: request.plane_index,
            range: request.range.clone(),
            visible: true,
            cube_plane: plane.cube_plane(),
            request: request.clone(),
            multi_image: planes.len() > 1,
        })
    }

    /// Schedule the write of one transform result derived from `from`.
    pub(crate) fn schedule_step(
        &self,
        band: Band,
        from: &Path,
        plane_index: usize,
        op: &TransformOp,
        params: Option<String>,
        plane: Arc<ImagePlane>,
    ) -> Result<PathBuf> {
        let target = derived_path(
            &self.config.work_dir,
            from,
            plane_index,
            op.suffix(),
            params.as_deref(),
        );
        self.check_target(&target)?;
        self.writer.schedule(WriteJob::Geometric {
            op: op.clone(),
            params,
            descriptor: DerivedFileDescriptor {
                target: target.clone(),
                planes: vec![plane].into(),
                band,
                supersedes_original: false,
            },
        });
        Ok(target)
    }

    fn check_source(&self, source: &Path) -> Result<()> {
        if self.config.source_roots.is_empty() {
            return Ok(());
        }
        let path = normalize(source);
        let allowed = self
            .config
            .source_roots
            .iter()
            .chain(std::iter::once(&self.config.work_dir))
            .any(|root| path.starts_with(normalize(root)));
        if allowed {
            Ok(())
        } else {
            Err(PlotError::Security(format!(
                "{} is outside the permitted source directories",
                source.display()
            )))
        }
    }

    fn check_target(&self, target: &Path) -> Result<()> {
        if normalize(target).starts_with(normalize(&self.config.work_dir)) {
            Ok(())
        } else {
            Err(PlotError::Security(format!(
                "derived file {} would be written outside the work directory",
                target.display()
            )))
        }
    }
}

fn is_gzip(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("gz"))
}
