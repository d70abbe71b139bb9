#![forbid(unsafe_code)]

mod dither;
mod encode;
mod error;
mod exif;
mod histogram;
mod linear;
mod matrix;
mod median_cut;
mod palette;
mod parallel;
mod prefix;
#[cfg(feature = "truecolor")]
mod truecolor;

pub use dither::{DitherMode, DitherQuality};
pub use error::EncodeError;
pub use parallel::Execution;
pub use rgb::{RGB, RGBA};

use std::sync::{Mutex, MutexGuard, PoisonError};

use linear::SrgbLut;
use palette::Candidate;

/// Total output color depth, split across the three channels.
///
/// Depths of 8 bits per pixel and below fit a 256-entry indexed palette and
/// may use the adaptive median-cut path; deeper outputs always quantize each
/// channel against its own uniform level grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BitDepth {
    /// 1 bit per channel: 8 colors.
    Bpp3,
    /// 2 bits per channel: 64 colors.
    Bpp6,
    /// 3-3-2: the classic 256-color split.
    #[default]
    Bpp8,
    /// 4 bits per channel.
    Bpp12,
    /// 5-6-5 "high color".
    Bpp16,
    /// 8 bits per channel; channel values pass through unchanged.
    Bpp24,
}

impl BitDepth {
    /// Bits allocated to R, G, and B, in that order.
    pub fn channel_bits(self) -> [u32; 3] {
        match self {
            BitDepth::Bpp3 => [1, 1, 1],
            BitDepth::Bpp6 => [2, 2, 2],
            BitDepth::Bpp8 => [3, 3, 2],
            BitDepth::Bpp12 => [4, 4, 4],
            BitDepth::Bpp16 => [5, 6, 5],
            BitDepth::Bpp24 => [8, 8, 8],
        }
    }

    /// Total bits per pixel.
    pub fn bits_per_pixel(self) -> u32 {
        let [r, g, b] = self.channel_bits();
        r + g + b
    }

    /// Whether every representable color fits a 256-entry indexed palette.
    pub fn is_indexed(self) -> bool {
        self.bits_per_pixel() <= 8
    }
}

/// How output colors are chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PaletteMode {
    /// Fixed per-channel level grid derived from the bit depth.
    Uniform,
    /// Median-cut palette fitted to the frame's histogram. Only effective at
    /// indexed depths; deeper outputs quietly use the uniform grid.
    #[default]
    Adaptive,
}

/// Configuration for encoding frames.
#[derive(Debug, Clone)]
pub struct EncodeConfig {
    /// Output color depth.
    pub bit_depth: BitDepth,
    /// Uniform grid or median-cut palette.
    pub palette_mode: PaletteMode,
    /// Threshold matrix tiled over the frame, or no dithering.
    pub dither: DitherMode,
    /// Linear-light dithering or the cheaper sRGB-space variants.
    pub dither_quality: DitherQuality,
    /// Damping applied to uniform-mode dither thresholds, 0.0 to 1.0.
    pub dither_strength: f32,
    /// Weight saturated colors more heavily in the adaptive histogram.
    pub saturation_boost: bool,
    /// Build the adaptive histogram from a half-resolution copy of the frame.
    pub downsample_histogram: bool,
    /// Run the data-parallel stages sequentially or on the thread pool.
    pub execution: Execution,
    /// Text stored in the container's metadata chunk. `None` generates a
    /// description of the quantization parameters.
    pub tag: Option<String>,
}

impl Default for EncodeConfig {
    fn default() -> Self {
        Self {
            bit_depth: BitDepth::Bpp8,
            palette_mode: PaletteMode::Adaptive,
            dither: DitherMode::Bayer,
            dither_quality: DitherQuality::Full,
            dither_strength: 0.9,
            saturation_boost: false,
            downsample_histogram: false,
            execution: Execution::Sequential,
            tag: None,
        }
    }
}

impl EncodeConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bit_depth(mut self, depth: BitDepth) -> Self {
        self.bit_depth = depth;
        self
    }

    pub fn palette_mode(mut self, mode: PaletteMode) -> Self {
        self.palette_mode = mode;
        self
    }

    pub fn dither(mut self, mode: DitherMode) -> Self {
        self.dither = mode;
        self
    }

    pub fn dither_quality(mut self, quality: DitherQuality) -> Self {
        self.dither_quality = quality;
        self
    }

    pub fn dither_strength(mut self, strength: f32) -> Self {
        self.dither_strength = strength;
        self
    }

    pub fn saturation_boost(mut self, boost: bool) -> Self {
        self.saturation_boost = boost;
        self
    }

    pub fn downsample_histogram(mut self, downsample: bool) -> Self {
        self.downsample_histogram = downsample;
        self
    }

    pub fn execution(mut self, execution: Execution) -> Self {
        self.execution = execution;
        self
    }

    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Tag text used when none is supplied, e.g. `"8bpp adaptive bayer"`.
    fn describe(&self) -> String {
        let palette =
            if self.palette_mode == PaletteMode::Adaptive && self.bit_depth.is_indexed() {
                "adaptive"
            } else {
                "uniform"
            };
        let dither = match self.dither {
            DitherMode::None => "undithered",
            DitherMode::Bayer => "bayer",
            DitherMode::BlueNoise => "blue-noise",
        };
        format!("{}bpp {} {}", self.bit_depth.bits_per_pixel(), palette, dither)
    }
}

/// Encode one RGBA frame with a throwaway working set.
///
/// The alpha channel is ignored; frames are treated as opaque. Callers
/// encoding a stream of frames should hold a [`Pipeline`] instead so the
/// histogram cube and candidate table are reused across frames.
pub fn encode_rgba(
    pixels: &[RGBA<u8>],
    width: usize,
    height: usize,
    config: &EncodeConfig,
) -> Result<Vec<u8>, EncodeError> {
    Pipeline::new(config.clone()).encode_rgba(pixels, width, height)
}

/// Encode one RGB frame with a throwaway working set.
pub fn encode_rgb(
    pixels: &[RGB<u8>],
    width: usize,
    height: usize,
    config: &EncodeConfig,
) -> Result<Vec<u8>, EncodeError> {
    Pipeline::new(config.clone()).encode_rgb(pixels, width, height)
}

/// Scratch buffers reused across frames.
#[derive(Debug)]
struct Workspace {
    /// Histogram cells, converted to prefix sums in place.
    cube: Vec<u32>,
    /// Ranked palette candidates, [`palette::LUT_CANDIDATES`] per cell.
    lut: Vec<Candidate>,
    /// Alpha-stripped copy of the current frame.
    rgb: Vec<RGB<u8>>,
    /// Half-resolution histogram source.
    half: Vec<RGB<u8>>,
    /// Quantized output grid.
    out: Vec<RGB<u8>>,
    /// sRGB-to-linear transfer table.
    srgb: SrgbLut,
}

impl Workspace {
    fn new() -> Self {
        Self {
            cube: Vec::new(),
            lut: Vec::new(),
            rgb: Vec::new(),
            half: Vec::new(),
            out: Vec::new(),
            srgb: SrgbLut::new(),
        }
    }
}

/// Reusable encoder holding the working buffers of the quantization stages.
///
/// Each encode borrows the workspace exclusively for its full duration, so a
/// pipeline processes one frame at a time; its buffers are grown on first use
/// and reused for every frame after that.
#[derive(Debug)]
pub struct Pipeline {
    config: EncodeConfig,
    workspace: Workspace,
}

impl Pipeline {
    pub fn new(config: EncodeConfig) -> Self {
        Self {
            config,
            workspace: Workspace::new(),
        }
    }

    pub fn config(&self) -> &EncodeConfig {
        &self.config
    }

    /// Encode one RGBA frame. The alpha channel is ignored.
    pub fn encode_rgba(
        &mut self,
        pixels: &[RGBA<u8>],
        width: usize,
        height: usize,
    ) -> Result<Vec<u8>, EncodeError> {
        validate_inputs(pixels.len(), width, height, &self.config)?;
        let ws = &mut self.workspace;
        reserve_total(&mut ws.rgb, pixels.len())?;
        ws.rgb.extend(pixels.iter().map(|p| RGB {
            r: p.r,
            g: p.g,
            b: p.b,
        }));
        self.run(width, height)
    }

    /// Encode one RGB frame.
    pub fn encode_rgb(
        &mut self,
        pixels: &[RGB<u8>],
        width: usize,
        height: usize,
    ) -> Result<Vec<u8>, EncodeError> {
        validate_inputs(pixels.len(), width, height, &self.config)?;
        let ws = &mut self.workspace;
        reserve_total(&mut ws.rgb, pixels.len())?;
        ws.rgb.extend_from_slice(pixels);
        self.run(width, height)
    }

    /// Quantize, dither, and serialize the frame staged in `workspace.rgb`.
    fn run(&mut self, width: usize, height: usize) -> Result<Vec<u8>, EncodeError> {
        let config = &self.config;
        let ws = &mut self.workspace;
        let exec = config.execution;
        let adaptive =
            config.palette_mode == PaletteMode::Adaptive && config.bit_depth.is_indexed();

        reserve_total(&mut ws.out, ws.rgb.len())?;
        ws.out.resize(ws.rgb.len(), RGB { r: 0, g: 0, b: 0 });

        if adaptive {
            // 1. Histogram the frame, optionally from a half-resolution copy.
            reserve_total(&mut ws.cube, histogram::CUBE_CELLS)?;
            ws.cube.resize(histogram::CUBE_CELLS, 0);
            let sampled: &[RGB<u8>] =
                if config.downsample_histogram && width >= 2 && height >= 2 {
                    reserve_total(&mut ws.half, width.div_ceil(2) * height.div_ceil(2))?;
                    histogram::downsample(&ws.rgb, width, height, &mut ws.half, exec);
                    &ws.half
                } else {
                    &ws.rgb
                };
            histogram::build_cube(&mut ws.cube, sampled, config.saturation_boost, exec);

            // 2. Occupied bounding box, then prefix sums in place.
            // Validated inputs always populate at least one cell; the zero
            // box fallback still encodes cleanly.
            let root = median_cut::occupied_box(&ws.cube, exec).unwrap_or(
                median_cut::ColorBox {
                    lo: [0; 3],
                    hi: [0; 3],
                    count: 0,
                },
            );
            prefix::integrate(&mut ws.cube, exec);
            let prefix = prefix::PrefixCube::new(&ws.cube);

            // 3. Median-cut boxes, palette colors, ranked candidate table.
            let colors = 1usize << config.bit_depth.bits_per_pixel();
            let boxes = median_cut::split_boxes(prefix, root, colors, exec);
            let palette = palette::palette_colors(&boxes, prefix, exec);
            let lut_len = histogram::CUBE_CELLS * palette::LUT_CANDIDATES;
            reserve_total(&mut ws.lut, lut_len)?;
            ws.lut.resize(lut_len, Candidate::SENTINEL);
            palette::build_lut(&mut ws.lut, &palette, &ws.srgb, exec);

            // 4. Remap at full resolution through the candidate table.
            dither::remap_adaptive(
                &mut ws.out,
                &ws.rgb,
                width,
                &ws.lut,
                config.dither,
                config.dither_quality,
                &ws.srgb,
                exec,
            );
        } else {
            // Uniform grids need no frame analysis; the level tables depend
            // only on the bit allocation.
            let tables = dither::UniformTables::new(config.bit_depth.channel_bits(), &ws.srgb);
            dither::remap_uniform(
                &mut ws.out,
                &ws.rgb,
                width,
                &tables,
                config.dither,
                config.dither_quality,
                config.dither_strength,
                exec,
            );
        }

        // 5. Serialize, with the tag riding in the metadata chunk.
        let tag = match &config.tag {
            Some(tag) => tag.clone(),
            None => config.describe(),
        };
        if config.bit_depth.is_indexed() {
            encode::encode_indexed(&ws.out, width, height, &tag)
        } else {
            #[cfg(feature = "truecolor")]
            {
                truecolor::encode_truecolor(&ws.out, width, height, &tag)
            }
            #[cfg(not(feature = "truecolor"))]
            {
                Err(EncodeError::EncoderUnavailable)
            }
        }
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(EncodeConfig::default())
    }
}

/// Single-slot frame mailbox with latest-wins semantics.
///
/// A capture loop `publish`es frames as they arrive while the encoder `take`s
/// them at its own pace; a frame that was never taken is replaced by its
/// successor rather than queued.
#[derive(Debug)]
pub struct FrameSlot<T> {
    slot: Mutex<Option<T>>,
}

impl<T> FrameSlot<T> {
    pub fn new() -> Self {
        Self {
            slot: Mutex::new(None),
        }
    }

    /// Put `frame` in the slot, returning the undelivered frame it replaced.
    pub fn publish(&self, frame: T) -> Option<T> {
        self.lock().replace(frame)
    }

    /// Empty the slot, returning the most recent frame if one is waiting.
    pub fn take(&self) -> Option<T> {
        self.lock().take()
    }

    /// Whether no frame is waiting.
    pub fn is_empty(&self) -> bool {
        self.lock().is_none()
    }

    fn lock(&self) -> MutexGuard<'_, Option<T>> {
        // A panicked publisher cannot corrupt an Option swap; keep going.
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T> Default for FrameSlot<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Clear `vec` and make sure it can hold `total` elements, reporting failure
/// instead of aborting the process.
fn reserve_total<T>(vec: &mut Vec<T>, total: usize) -> Result<(), EncodeError> {
    vec.clear();
    vec.try_reserve_exact(total)
        .map_err(|source| EncodeError::Allocation {
            bytes: total * std::mem::size_of::<T>(),
            source,
        })
}

fn validate_inputs(
    pixel_count: usize,
    width: usize,
    height: usize,
    config: &EncodeConfig,
) -> Result<(), EncodeError> {
    if width == 0 || height == 0 {
        return Err(EncodeError::ZeroDimension);
    }
    if pixel_count != width * height {
        return Err(EncodeError::DimensionMismatch {
            len: pixel_count,
            width,
            height,
        });
    }
    if !(0.0..=1.0).contains(&config.dither_strength) {
        return Err(EncodeError::InvalidStrength(config.dither_strength));
    }
    Ok(())
}

/// Internal entry points exposed for the integration suites; not part of the
/// stable API.
#[doc(hidden)]
pub mod _internals {
    pub use crate::encode::crc32;
    pub use crate::exif::build_exif;
    pub use crate::histogram::cell_center;
    pub use crate::linear::srgb_to_linear;
}
