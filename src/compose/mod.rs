//! The frame composer: palettised DEF frames to
//! RGBA, with the shadow/transparency palette policy, HotA fixes, cropping
//! modes, group naming, and per-frame durations.

pub mod config;

pub use config::{CropBounds, CropConfig, DurationConfig, GroupNameTable, HotaConfig};

use crate::def::{Def, DefPalette};
use crate::BatchReport;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("composition was requested without an available palette")]
    PaletteMissing,
}

pub type Result<T> = core::result::Result<T, Error>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShadowMode {
    /// Main and shadow are two separate DEFs; shadow frames are
    /// composited under each matching main frame.
    Separate,
    /// Shadow information is baked into the main DEF's own frames; any
    /// separate shadow DEF is ignored.
    ShadowInMain,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropMode {
    Predefined,
    IndividualCrop,
    NoCrop,
}

pub struct ComposeOptions<'a> {
    pub def_id: u32,
    pub object_name: &'a str,
    pub shadow_mode: ShadowMode,
    pub crop_mode: CropMode,
    pub crop_config: &'a CropConfig,
    pub group_names: &'a GroupNameTable,
    pub hota: &'a HotaConfig,
    pub durations: &'a DurationConfig,
}

#[derive(Clone, Debug)]
pub struct ComposedFrame {
    pub rgba: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub origin_in_canvas: (i32, i32),
    pub duration_ms: u32,
    pub group_label: String,
}

fn shadow_edge() -> (u8, u8, u8, u8) {
    (0, 0, 0, 127)
}

fn shadow_body() -> (u8, u8, u8, u8) {
    (0, 0, 0, 191)
}

/// Applies the palette policy table to one source
/// index, producing an RGBA sample.
fn apply_palette_policy(
    index: u8,
    palette: &DefPalette,
    shadow_in_main: bool,
    hota_p2p3: bool,
    keep_selection_palette: bool,
) -> (u8, u8, u8, u8) {
    let opaque = |i: u8| {
        let (r, g, b) = palette[i as usize];
        (r, g, b, 255)
    };

    match index {
        0 => (0, 0, 0, 0),
        1 => {
            if shadow_in_main {
                shadow_edge()
            } else {
                opaque(1)
            }
        }
        2 => {
            if shadow_in_main || hota_p2p3 {
                shadow_edge()
            } else {
                opaque(2)
            }
        }
        3 => {
            if shadow_in_main || hota_p2p3 {
                shadow_body()
            } else {
                opaque(3)
            }
        }
        4 => {
            if shadow_in_main {
                shadow_body()
            } else {
                opaque(4)
            }
        }
        5 => {
            if keep_selection_palette {
                opaque(5)
            } else {
                (0, 0, 0, 0)
            }
        }
        6 => {
            if shadow_in_main {
                shadow_body()
            } else {
                opaque(6)
            }
        }
        7 => {
            if shadow_in_main {
                shadow_edge()
            } else {
                opaque(7)
            }
        }
        other => opaque(other),
    }
}

/// Resolves a group's display label. Creature DEFs (`def_type == 0x42`)
/// dynamically relabel groups 17/18 for objects in the cast/attack-2 sets;
/// everything else falls back to the def-type table, then a numeric label.
fn group_label(def_type: u32, group_index: u32, def_id: u32, names: &GroupNameTable) -> String {
    if def_type == 0x42 {
        if group_index == 17 && names.cast_ids.contains(&def_id) {
            return format!("Cast {}", base_label(def_type, group_index, names));
        }
        if group_index == 18 && names.attack2_ids.contains(&def_id) {
            return format!("Attack 2 {}", base_label(def_type, group_index, names));
        }
    }
    base_label(def_type, group_index, names)
}

fn base_label(def_type: u32, group_index: u32, names: &GroupNameTable) -> String {
    names
        .by_def_type
        .get(&def_type)
        .and_then(|table| table.get(&group_index))
        .cloned()
        .unwrap_or_else(|| format!("group {group_index}"))
}

/// Duration is a pure function of `(def_type, group, frame_index, frame_count)`
/// and the config table: the base per-type/per-group duration, doubled on
/// the final ("held") frame of any group with an explicit override.
/// Standing/idle groups configure an override precisely so their rest pose
/// holds longer.
fn frame_duration_ms(cfg: &DurationConfig, def_type: u32, group_index: u32, frame_index: usize, frame_count: usize) -> u32 {
    let base = cfg.lookup_ms(def_type, group_index);
    let is_last = frame_count > 0 && frame_index + 1 == frame_count;
    if is_last && cfg.group_overrides.contains_key(&(def_type, group_index)) {
        base * 2
    } else {
        base
    }
}

fn paint_into_canvas(canvas: &mut [u8], canvas_width: u32, left: i32, top: i32, width: u32, height: u32, pixels: &[(u8, u8, u8, u8)]) {
    for y in 0..height {
        for x in 0..width {
            let (r, g, b, a) = pixels[(y * width + x) as usize];
            if a == 0 {
                continue;
            }
            let cx = left + x as i32;
            let cy = top + y as i32;
            if cx < 0 || cy < 0 {
                continue;
            }
            let idx = ((cy as u32 * canvas_width + cx as u32) * 4) as usize;
            canvas[idx..idx + 4].copy_from_slice(&[r, g, b, a]);
        }
    }
}

fn crop_rect(bounds: CropBounds, canvas: &[u8], canvas_width: u32, canvas_height: u32) -> (Vec<u8>, u32, u32, (i32, i32)) {
    let left = bounds.left.min(canvas_width);
    let top = bounds.top.min(canvas_height);
    let right = bounds.right.min(canvas_width).max(left);
    let bottom = bounds.bottom.min(canvas_height).max(top);
    let width = right - left;
    let height = bottom - top;

    let mut out = vec![0u8; (width * height * 4) as usize];
    for y in 0..height {
        let src_row = ((top + y) * canvas_width + left) as usize * 4;
        let dst_row = (y * width) as usize * 4;
        out[dst_row..dst_row + (width * 4) as usize]
            .copy_from_slice(&canvas[src_row..src_row + (width * 4) as usize]);
    }
    (out, width, height, (left as i32, top as i32))
}

fn tight_bbox(canvas: &[u8], canvas_width: u32, canvas_height: u32) -> CropBounds {
    let (mut min_x, mut min_y) = (canvas_width, canvas_height);
    let (mut max_x, mut max_y) = (0u32, 0u32);
    let mut any = false;

    for y in 0..canvas_height {
        for x in 0..canvas_width {
            let idx = ((y * canvas_width + x) * 4) as usize;
            if canvas[idx + 3] != 0 {
                any = true;
                min_x = min_x.min(x);
                min_y = min_y.min(y);
                max_x = max_x.max(x + 1);
                max_y = max_y.max(y + 1);
            }
        }
    }

    if any {
        CropBounds {
            left: min_x,
            top: min_y,
            right: max_x,
            bottom: max_y,
        }
    } else {
        CropBounds::default()
    }
}

fn resolve_crop_bounds(def_type: u32, object_name: &str, cfg: &CropConfig) -> Option<CropBounds> {
    if def_type == 4 && (object_name.contains("Airship") || object_name.contains("Boat")) {
        return Some(cfg.airship_boat_override);
    }
    cfg.predefined.get(&def_type).copied()
}

/// Composes every frame of `main` (shadow-compositing against `shadow` when
/// `options.shadow_mode` is [`ShadowMode::Separate`]), applying the
/// configured crop mode and computing each frame's duration. Failures
/// (currently only [`Error::PaletteMissing`], which cannot occur once a
/// `Def` has been read, since reading always yields a palette) are
/// collected rather than aborting, matching the tolerant-batch policy used
/// throughout this crate.
pub fn compose_def(main: &mut Def<'_>, mut shadow: Option<&mut Def<'_>>, options: &ComposeOptions<'_>) -> BatchReport<Error, ComposedFrame> {
    let mut report = BatchReport::default();
    let palette = *main.palette();
    let header = main.header();

    let hota_p2p3 = options.hota.enabled && options.hota.p2p3_shadow_ids.contains(&options.def_id);
    let bg255_to_5 = options.hota.enabled && options.hota.bg255_to_5_ids.contains(&options.def_id);
    let shadow_in_main = options.shadow_mode == ShadowMode::ShadowInMain;
    let keep_selection = options.hota.keep_selection_palette_ids.contains(&options.def_id);

    let group_count = main.groups().len();
    for g in 0..group_count {
        let (group_index, def_type, frame_count) = {
            let group = &main.groups()[g];
            (group.group_index, header.def_type, group.frame_names.len())
        };
        let label = group_label(def_type, group_index, options.def_id, options.group_names);

        // First pass (individual-crop only): union the tight bboxes of every
        // frame's full canvas in this group.
        let mut group_bbox: Option<CropBounds> = None;

        let mut canvases: Vec<(Vec<u8>, i32, i32)> = Vec::with_capacity(frame_count);
        for f in 0..frame_count {
            let frame = match main.decode_frame(g, f) {
                Ok(frame) => frame.clone(),
                Err(_) => continue,
            };

            let mut canvas = vec![0u8; (frame.full_width * frame.full_height * 4) as usize];
            let pixels: Vec<_> = frame
                .pixels
                .iter()
                .map(|&raw| {
                    let idx = if bg255_to_5 && raw == 255 { 5 } else { raw };
                    apply_palette_policy(idx, &palette, shadow_in_main, hota_p2p3, keep_selection)
                })
                .collect();
            paint_into_canvas(&mut canvas, frame.full_width, frame.left, frame.top, frame.width, frame.height, &pixels);

            if matches!(options.shadow_mode, ShadowMode::Separate) {
                if let Some(shadow_def) = shadow.as_deref_mut() {
                    if let Ok(shadow_frame) = shadow_def.decode_frame(g, f).map(|f| f.clone()) {
                        let shadow_pixels: Vec<_> = shadow_frame
                            .pixels
                            .iter()
                            .map(|&raw| apply_palette_policy(raw, &palette, true, false, keep_selection))
                            .collect();
                        let mut shadow_canvas = vec![0u8; canvas.len()];
                        paint_into_canvas(
                            &mut shadow_canvas,
                            frame.full_width,
                            shadow_frame.left,
                            shadow_frame.top,
                            shadow_frame.width,
                            shadow_frame.height,
                            &shadow_pixels,
                        );
                        for (dst, src) in canvas.chunks_exact_mut(4).zip(shadow_canvas.chunks_exact(4)) {
                            if dst[3] == 0 && src[3] != 0 {
                                dst.copy_from_slice(src);
                            }
                        }
                    }
                }
            }

            if options.crop_mode == CropMode::IndividualCrop {
                let bbox = tight_bbox(&canvas, frame.full_width, frame.full_height);
                group_bbox = Some(match group_bbox {
                    Some(acc) => CropBounds {
                        left: acc.left.min(bbox.left),
                        top: acc.top.min(bbox.top),
                        right: acc.right.max(bbox.right),
                        bottom: acc.bottom.max(bbox.bottom),
                    },
                    None => bbox,
                });
            }

            canvases.push((canvas, frame.full_width as i32, frame.full_height as i32));
        }

        for (f, (canvas, full_width, full_height)) in canvases.into_iter().enumerate() {
            let duration_ms = frame_duration_ms(options.durations, def_type, group_index, f, frame_count);

            let (rgba, width, height, origin) = match options.crop_mode {
                CropMode::NoCrop => (canvas, full_width as u32, full_height as u32, (0, 0)),
                CropMode::Predefined => match resolve_crop_bounds(def_type, options.object_name, options.crop_config) {
                    Some(bounds) if !options.crop_config.no_crop_types.contains(&def_type) => {
                        crop_rect(bounds, &canvas, full_width as u32, full_height as u32)
                    }
                    _ => (canvas, full_width as u32, full_height as u32, (0, 0)),
                },
                CropMode::IndividualCrop => {
                    let bounds = group_bbox.unwrap_or_default();
                    crop_rect(bounds, &canvas, full_width as u32, full_height as u32)
                }
            };

            report.push_ok(ComposedFrame {
                rgba,
                width,
                height,
                origin_in_canvas: origin,
                duration_ms,
                group_label: label.clone(),
            });
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_hides_index_0_and_5() {
        let palette = {
            let mut p: DefPalette = [(0, 0, 0); 256];
            p[99] = (200, 0, 0);
            p
        };
        assert_eq!(apply_palette_policy(0, &palette, false, false, false), (0, 0, 0, 0));
        assert_eq!(apply_palette_policy(99, &palette, false, false, false), (200, 0, 0, 255));
        assert_eq!(apply_palette_policy(5, &palette, false, false, false), (0, 0, 0, 0));
        assert_eq!(apply_palette_policy(5, &palette, false, false, true), (0, 0, 0, 255));
    }

    #[test]
    fn hota_p2p3_fix_yields_shadow_edge_and_body() {
        let palette: DefPalette = [(0, 0, 0); 256];
        assert_eq!(apply_palette_policy(2, &palette, false, true, false), (0, 0, 0, 127));
        assert_eq!(apply_palette_policy(3, &palette, false, true, false), (0, 0, 0, 191));
    }

    #[test]
    fn airship_override_beats_default_crop_bounds() {
        let mut cfg = CropConfig::default();
        cfg.predefined.insert(4, CropBounds { left: 15, top: 3, right: 77, bottom: 64 });
        cfg.airship_boat_override = CropBounds { left: 0, top: 0, right: 85, bottom: 127 };

        let bounds = resolve_crop_bounds(4, "Royal Airship", &cfg).unwrap();
        assert_eq!(bounds, cfg.airship_boat_override);

        let default_bounds = resolve_crop_bounds(4, "Peasant", &cfg).unwrap();
        assert_eq!(default_bounds, CropBounds { left: 15, top: 3, right: 77, bottom: 64 });
    }

    #[test]
    fn duration_is_pure_and_doubles_on_held_frame() {
        let mut cfg = DurationConfig::default();
        cfg.default_ms_by_type.insert(0x42, 100);
        cfg.group_overrides.insert((0x42, 1), 150);

        assert_eq!(frame_duration_ms(&cfg, 0x42, 0, 0, 3), 100);
        assert_eq!(frame_duration_ms(&cfg, 0x42, 1, 2, 3), 300);
        assert_eq!(frame_duration_ms(&cfg, 0x42, 1, 0, 3), 150);
    }
}
