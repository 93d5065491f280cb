use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;

use crate::error::{PlotError, Result};
use crate::group::ActiveImageGroup;
use crate::request::PlotRequest;
use crate::state::{Band, ContextKey, Operation, PlotState, RotationInfo, RotationKind};
use crate::stretch::{BandRanges, CompressType, StretchMode, StretchOutput, StretchParams};
use crate::transform::{self, CropPoint, RotateSpec, TransformOp};
use crate::wcs::{ImagePt, SkyPoint};
use crate::zoom::{resolve_for_plane, ZoomPolicy};

use super::{PlotContextManager, PlotPhase};

/// State after an operation, with the image rendered from it.
#[derive(Clone, Debug)]
pub struct PlotView {
    pub state: PlotState,
    pub image: StretchOutput,
}

impl PlotContextManager {
    pub fn create_plot(&self, request: PlotRequest) -> Result<PlotView> {
        let mut bands = BTreeMap::new();
        bands.insert(Band::NoBand, request);
        self.create(bands, false)
    }

    /// Plot of up to three color bands, each from its own request.
    pub fn create_three_color_plot(&self, requests: BTreeMap<Band, PlotRequest>) -> Result<PlotView> {
        if requests.is_empty() {
            return Err(PlotError::MissingBand("Red, Green or Blue".into()));
        }
        if requests.contains_key(&Band::NoBand) {
            return Err(PlotError::MissingBand(
                "three-color plots take Red, Green and Blue bands only".into(),
            ));
        }
        self.create(requests, true)
    }

    fn create(&self, requests: BTreeMap<Band, PlotRequest>, three_color: bool) -> Result<PlotView> {
        let mut state = PlotState::new(ContextKey::generate());
        state.three_color = three_color;
        for (band, request) in &requests {
            let bs = self.build_band(*band, request)?;
            state.bands.insert(*band, bs);
        }

        let Some(first) = requests.values().next() else {
            return Err(PlotError::MissingBand("any".into()));
        };
        state.color_table = first.color_table;
        for op in &first.ops {
            record_op(&mut state, op);
        }

        let key = state.context_key.clone();
        self.sessions.insert(state, PlotPhase::Uninitialized);
        let (mut state, group) = match self.prepare(&key) {
            Ok(resolved) => resolved,
            Err(e) => {
                self.sessions.remove(&key);
                return Err(e);
            }
        };
        if let Some((_, plane)) = group.primary() {
            state.zoom_level = resolve_for_plane(first.zoom, plane, self.config.max_zoom)?;
        }
        self.sessions.replace(state.clone(), PlotPhase::Valid)?;
        info!(
            context = %state.context_key,
            bands = state.bands.len(),
            three_color,
            zoom = state.zoom_level,
            "plot created"
        );
        self.view(state, &group)
    }

    pub fn zoom(&self, key: &ContextKey, policy: ZoomPolicy) -> Result<PlotView> {
        let (mut state, group) = self.prepare(key)?;
        let (_, plane) = group
            .primary()
            .ok_or_else(|| PlotError::MissingBand("any".into()))?;
        state.zoom_level = resolve_for_plane(policy, plane, self.config.max_zoom)?;
        self.sessions.replace(state.clone(), PlotPhase::Valid)?;
        self.view(state, &group)
    }

    pub fn crop(&self, key: &ContextKey, corner1: CropPoint, corner2: CropPoint) -> Result<PlotView> {
        self.transform_all(key, TransformOp::PostCrop { corner1, corner2 }, |_| {})
    }

    pub fn crop_and_center(&self, key: &ContextKey, center: SkyPoint, size_deg: f64) -> Result<PlotView> {
        self.transform_all(key, TransformOp::PostCropAndCenter { center, size_deg }, |_| {})
    }

    /// Rotate to an absolute angle, or north up. Angles are applied
    /// relative to the rotation already on the plot.
    pub fn rotate(&self, key: &ContextKey, spec: RotateSpec) -> Result<PlotView> {
        match spec {
            RotateSpec::Angle(target) => {
                let (state, group) = self.prepare(key)?;
                let current = match state.rotation.kind {
                    RotationKind::Angle => state.rotation.angle,
                    _ => 0.0,
                };
                let delta = target - current;
                if delta.rem_euclid(360.0) == 0.0 {
                    return self.view(state, &group);
                }
                self.transform_all(key, TransformOp::Rotate(RotateSpec::Angle(delta)), |s| {
                    s.rotation = RotationInfo {
                        kind: RotationKind::Angle,
                        angle: target,
                        north_system: None,
                    };
                })
            }
            RotateSpec::North(system) => self.transform_all(key, TransformOp::Rotate(spec), |s| {
                s.rotation = RotationInfo {
                    kind: RotationKind::North,
                    angle: 0.0,
                    north_system: Some(system),
                };
            }),
        }
    }

    pub fn flip_y(&self, key: &ContextKey) -> Result<PlotView> {
        self.transform_all(key, TransformOp::FlipY, |_| {})
    }

    /// Apply one operation to every band. Nothing is stored unless all
    /// bands succeed.
    fn transform_all(
        &self,
        key: &ContextKey,
        op: TransformOp,
        update: impl FnOnce(&mut PlotState),
    ) -> Result<PlotView> {
        let (mut state, group) = self.prepare(key)?;

        let mut outcomes = Vec::with_capacity(state.bands.len());
        for band in state.bands.keys() {
            let plane = group.require(*band)?;
            outcomes.push((*band, transform::apply(plane, std::slice::from_ref(&op))?));
        }

        let mut next = ActiveImageGroup::new();
        for (band, outcome) in outcomes {
            let Some(bs) = state.bands.get_mut(&band) else { continue };
            for step in outcome.steps {
                bs.working_file = self.schedule_step(
                    band,
                    &bs.working_file,
                    bs.image_index,
                    &step.op,
                    step.params,
                    step.plane,
                )?;
                bs.image_index = 0;
            }
            bs.request.push_op(op.clone());
            next.insert(band, outcome.plane);
        }

        record_op(&mut state, &op);
        update(&mut state);
        self.sessions.replace(state.clone(), PlotPhase::Valid)?;
        info!(context = %key, op = %op, "plot transformed");
        self.view(state, &next)
    }

    /// Change the range spec of the given bands.
    pub fn recompute_stretch(&self, key: &ContextKey, ranges: BandRanges) -> Result<PlotView> {
        let (mut state, group) = self.prepare(key)?;
        for (band, range) in ranges {
            let bs = state
                .bands
                .get_mut(&band)
                .ok_or_else(|| PlotError::MissingBand(band.to_string()))?;
            bs.request.range = range.clone();
            bs.range = range;
        }
        self.sessions.replace(state.clone(), PlotPhase::Valid)?;
        self.view(state, &group)
    }

    pub fn add_band(&self, key: &ContextKey, band: Band, request: PlotRequest) -> Result<PlotView> {
        if band == Band::NoBand {
            return Err(PlotError::MissingBand(
                "bands added to a plot must be Red, Green or Blue".into(),
            ));
        }
        let (mut state, _) = self.prepare(key)?;
        let bs = self.build_band(band, &request)?;
        if let Some(plain) = state.bands.remove(&Band::NoBand) {
            // The existing single band becomes red.
            if band != Band::Red {
                state.bands.insert(Band::Red, plain);
            }
        }
        state.bands.insert(band, bs);
        state.three_color = true;
        let group = self.resolve_group(&state)?;
        self.sessions.replace(state.clone(), PlotPhase::Valid)?;
        info!(context = %key, band = %band, "band added");
        self.view(state, &group)
    }

    pub fn remove_band(&self, key: &ContextKey, band: Band) -> Result<PlotView> {
        let (mut state, _) = self.prepare(key)?;
        if !state.bands.contains_key(&band) {
            return Err(PlotError::MissingBand(band.to_string()));
        }
        if state.bands.len() == 1 {
            return Err(PlotError::MissingBand(format!(
                "{band} is the only band and cannot be removed"
            )));
        }
        state.bands.remove(&band);
        let group = self.resolve_group(&state)?;
        self.sessions.replace(state.clone(), PlotPhase::Valid)?;
        info!(context = %key, band = %band, "band removed");
        self.view(state, &group)
    }

    pub fn change_color(&self, key: &ContextKey, color_table: u32) -> Result<PlotView> {
        let (mut state, group) = self.prepare(key)?;
        state.color_table = color_table;
        for bs in state.bands.values_mut() {
            bs.request.color_table = color_table;
        }
        self.sessions.replace(state.clone(), PlotPhase::Valid)?;
        self.view(state, &group)
    }

    /// Pixel value under `pt` in every band.
    pub fn get_flux(&self, key: &ContextKey, pt: ImagePt) -> Result<Vec<(Band, f64)>> {
        let (_, group) = self.prepare(key)?;
        group
            .iter()
            .map(|(band, plane)| plane.flux(pt).map(|v| (band, v)))
            .collect()
    }

    pub fn get_byte_stretch(
        &self,
        key: &ContextKey,
        tile_size: usize,
        mask_bits: Option<u64>,
    ) -> Result<StretchOutput> {
        let (state, group) = self.prepare(key)?;
        let params = StretchParams {
            tile_size,
            mode: stretch_mode(&state, mask_bits),
            compress: CompressType::Full,
        };
        self.stretch.stretch(&visible(&state, &group), &state.ranges(), &params)
    }

    fn view(&self, state: PlotState, group: &ActiveImageGroup) -> Result<PlotView> {
        let mask_bits = state.bands.values().find_map(|bs| bs.request.mask_bits);
        let params = StretchParams {
            tile_size: self.config.stretch.tile_size,
            mode: stretch_mode(&state, mask_bits),
            compress: CompressType::Full,
        };
        let image = self.stretch.stretch(&visible(&state, group), &state.ranges(), &params)?;
        Ok(PlotView { state, image })
    }
}

fn stretch_mode(state: &PlotState, mask_bits: Option<u64>) -> StretchMode {
    match mask_bits {
        Some(bits) => StretchMode::Mask { bits },
        None if state.three_color => StretchMode::ThreeColor,
        None => StretchMode::Standard,
    }
}

/// Only visible bands are rendered; a plot with every band hidden still
/// renders its first band.
fn visible(state: &PlotState, group: &ActiveImageGroup) -> ActiveImageGroup {
    let mut out = ActiveImageGroup::new();
    for (band, plane) in group.iter() {
        if state.bands.get(&band).is_some_and(|bs| bs.visible) {
            out.insert(band, Arc::clone(plane));
        }
    }
    if out.is_empty() {
        if let Some((band, plane)) = group.primary() {
            out.insert(band, Arc::clone(plane));
        }
    }
    out
}

fn record_op(state: &mut PlotState, op: &TransformOp) {
    let operation = match op {
        TransformOp::FlipY => {
            state.flipped_y = !state.flipped_y;
            Operation::FlipY
        }
        TransformOp::FlipX => Operation::FlipX,
        TransformOp::Rotate(spec) => {
            state.rotation = match spec {
                RotateSpec::Angle(a) => RotationInfo {
                    kind: RotationKind::Angle,
                    angle: state.rotation.angle + a,
                    north_system: None,
                },
                RotateSpec::North(system) => RotationInfo {
                    kind: RotationKind::North,
                    angle: 0.0,
                    north_system: Some(*system),
                },
            };
            Operation::Rotate
        }
        TransformOp::PostCrop { .. } | TransformOp::PostCropAndCenter { .. } => Operation::Crop,
    };
    state.operations.push(operation);
}
