//! Legacy-format normalization.
//!
//! Phones in the diary's source folders upload HEIF-family images
//! (HEIC/HEIF/AVIF) that browsers cannot be relied on to decode. This module
//! converts them to baseline JPEG so every downstream consumer sees a
//! universally decodable raster format.
//!
//! ## Crate mapping
//!
//! | Step | Crate / function |
//! |---|---|
//! | Container parse (ISO-BMFF) | `avif-parse` |
//! | AV1 primary item decode | `rav1d` (pure Rust port of dav1d) |
//! | YUV → RGB | custom BT.601 conversion |
//! | Re-encode | `image::codecs::jpeg::JpegEncoder` at quality 100 |
//!
//! The re-encode is done at maximum quality: normalization changes the
//! *format*, while all lossy compression belongs to the
//! [`transform`](super::transform) stage.
//!
//! Conversion failure is a hard error. Serving unconverted legacy bytes
//! would hand clients an image their renderer rejects, so the pipeline
//! propagates [`NormalizeError`] instead of degrading.

use super::format::{self, LegacyEncoding};
use super::params::Quality;
use super::transform::encode_jpeg;
use image::DynamicImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NormalizeError {
    #[error("container parse failed: {0}")]
    Container(String),
    #[error("AV1 decode failed: {0}")]
    Decode(String),
    #[error("JPEG re-encode failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Convert a legacy-encoded image to JPEG at maximum encode quality.
///
/// Returns `Ok(None)` when the declared MIME type and filename match no
/// known legacy encoding; the caller serves the original bytes unchanged.
pub fn normalize(
    bytes: &[u8],
    mime_type: &str,
    file_name: Option<&str>,
) -> Result<Option<Vec<u8>>, NormalizeError> {
    let Some(encoding) = format::detect_legacy(mime_type, file_name) else {
        return Ok(None);
    };
    tracing::debug!(?encoding, mime_type, "converting legacy-encoded image");
    let decoded = decode_primary_item(bytes, encoding)?;
    let jpeg = encode_jpeg(&decoded, Quality::MAX)?;
    Ok(Some(jpeg))
}

/// Decode the primary image item of a HEIF-family container.
///
/// `avif-parse` handles the ISO-BMFF container; the coded frame is decoded
/// with `rav1d`. HEVC-coded items (pre-iOS-17 HEIC captures) have no pure
/// Rust decoder and fail at the parse or decode step, which surfaces as the
/// conversion error the caller expects.
fn decode_primary_item(
    bytes: &[u8],
    encoding: LegacyEncoding,
) -> Result<DynamicImage, NormalizeError> {
    use rav1d::include::dav1d::data::Dav1dData;
    use rav1d::include::dav1d::dav1d::Dav1dSettings;
    use rav1d::include::dav1d::headers::{
        DAV1D_PIXEL_LAYOUT_I400, DAV1D_PIXEL_LAYOUT_I420, DAV1D_PIXEL_LAYOUT_I422,
        DAV1D_PIXEL_LAYOUT_I444,
    };
    use rav1d::include::dav1d::picture::Dav1dPicture;
    use std::ptr::NonNull;

    let container = avif_parse::read_avif(&mut std::io::Cursor::new(bytes))
        .map_err(|e| NormalizeError::Container(format!("{encoding:?}: {e:?}")))?;
    let coded: &[u8] = &container.primary_item;

    // Initialize the decoder. Single-threaded with a frame delay of one:
    // the pipeline decodes exactly one still image per request.
    let mut settings = std::mem::MaybeUninit::<Dav1dSettings>::uninit();
    unsafe {
        rav1d::src::lib::dav1d_default_settings(NonNull::new(settings.as_mut_ptr()).unwrap())
    };
    let mut settings = unsafe { settings.assume_init() };
    settings.n_threads = 1;
    settings.max_frame_delay = 1;

    let mut ctx = None;
    let rc =
        unsafe { rav1d::src::lib::dav1d_open(NonNull::new(&mut ctx), NonNull::new(&mut settings)) };
    if rc.0 != 0 {
        return Err(NormalizeError::Decode(format!("decoder open failed ({})", rc.0)));
    }

    // Hand the coded frame to the decoder
    let mut data = Dav1dData::default();
    let buf_ptr =
        unsafe { rav1d::src::lib::dav1d_data_create(NonNull::new(&mut data), coded.len()) };
    if buf_ptr.is_null() {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(NormalizeError::Decode("decoder buffer allocation failed".into()));
    }
    unsafe { std::ptr::copy_nonoverlapping(coded.as_ptr(), buf_ptr, coded.len()) };

    let rc = unsafe { rav1d::src::lib::dav1d_send_data(ctx, NonNull::new(&mut data)) };
    if rc.0 != 0 {
        unsafe {
            rav1d::src::lib::dav1d_data_unref(NonNull::new(&mut data));
            rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx));
        }
        return Err(NormalizeError::Decode(format!("send_data failed ({})", rc.0)));
    }

    let mut pic: Dav1dPicture = unsafe { std::mem::zeroed() };
    let rc = unsafe { rav1d::src::lib::dav1d_get_picture(ctx, NonNull::new(&mut pic)) };
    if rc.0 != 0 {
        unsafe { rav1d::src::lib::dav1d_close(NonNull::new(&mut ctx)) };
        return Err(NormalizeError::Decode(format!("get_picture failed ({})", rc.0)));
    }

    let width = pic.p.w as u32;
    let height = pic.p.h as u32;
    let bpc = pic.p.bpc as u32;
    let layout = pic.p.layout;

    let release = |pic: &mut Dav1dPicture, ctx: &mut _| unsafe {
        rav1d::src::lib::dav1d_picture_unref(NonNull::new(pic));
        rav1d::src::lib::dav1d_close(NonNull::new(ctx));
    };

    let Some(luma_data) = pic.data[0] else {
        release(&mut pic, &mut ctx);
        return Err(NormalizeError::Decode("picture has no luma plane".into()));
    };
    let luma = PlaneView {
        ptr: luma_data.as_ptr() as *const u8,
        stride: pic.stride[0],
    };

    let chroma = if layout == DAV1D_PIXEL_LAYOUT_I400 {
        None
    } else {
        let (subsampled_x, subsampled_y) = match layout {
            DAV1D_PIXEL_LAYOUT_I420 => (true, true),
            DAV1D_PIXEL_LAYOUT_I422 => (true, false),
            DAV1D_PIXEL_LAYOUT_I444 => (false, false),
            _ => {
                release(&mut pic, &mut ctx);
                return Err(NormalizeError::Decode(format!(
                    "unsupported pixel layout: {layout}"
                )));
            }
        };
        let (Some(u_data), Some(v_data)) = (pic.data[1], pic.data[2]) else {
            release(&mut pic, &mut ctx);
            return Err(NormalizeError::Decode("picture is missing chroma planes".into()));
        };
        Some(ChromaPlanes {
            u: PlaneView {
                ptr: u_data.as_ptr() as *const u8,
                stride: pic.stride[1],
            },
            v: PlaneView {
                ptr: v_data.as_ptr() as *const u8,
                stride: pic.stride[1],
            },
            subsampled_x,
            subsampled_y,
        })
    };

    let rgb = planes_to_rgb(&luma, chroma.as_ref(), width, height, bpc);
    release(&mut pic, &mut ctx);

    image::RgbImage::from_raw(width, height, rgb)
        .map(DynamicImage::ImageRgb8)
        .ok_or_else(|| NormalizeError::Decode("decoded plane size mismatch".into()))
}

/// Borrowed view of one decoded plane.
struct PlaneView {
    ptr: *const u8,
    stride: isize,
}

impl PlaneView {
    /// Read one sample, widening 10/12-bit storage (u16) to f32.
    #[inline]
    fn sample(&self, x: u32, y: u32, bpc: u32) -> f32 {
        if bpc <= 8 {
            (unsafe { *self.ptr.offset(y as isize * self.stride + x as isize) }) as f32
        } else {
            let byte_offset = y as isize * self.stride + x as isize * 2;
            (unsafe { *(self.ptr.offset(byte_offset) as *const u16) }) as f32
        }
    }
}

struct ChromaPlanes {
    u: PlaneView,
    v: PlaneView,
    subsampled_x: bool,
    subsampled_y: bool,
}

/// Convert decoded YUV planes to interleaved RGB8 using BT.601
/// coefficients. `chroma` of `None` means a monochrome (I400) picture.
fn planes_to_rgb(
    luma: &PlaneView,
    chroma: Option<&ChromaPlanes>,
    width: u32,
    height: u32,
    bpc: u32,
) -> Vec<u8> {
    let max_val = ((1u32 << bpc) - 1) as f32;
    let center = (1u32 << (bpc - 1)) as f32;
    let scale = 255.0 / max_val;

    let mut rgb = Vec::with_capacity(width as usize * height as usize * 3);

    for row in 0..height {
        for col in 0..width {
            let y = luma.sample(col, row, bpc);

            let (r, g, b) = match chroma {
                None => {
                    let v = (y * scale).clamp(0.0, 255.0);
                    (v, v, v)
                }
                Some(c) => {
                    let cx = if c.subsampled_x { col / 2 } else { col };
                    let cy = if c.subsampled_y { row / 2 } else { row };
                    let cb = c.u.sample(cx, cy, bpc) - center;
                    let cr = c.v.sample(cx, cy, bpc) - center;

                    (
                        ((y + 1.402 * cr) * scale).clamp(0.0, 255.0),
                        ((y - 0.344136 * cb - 0.714136 * cr) * scale).clamp(0.0, 255.0),
                        ((y + 1.772 * cb) * scale).clamp(0.0, 255.0),
                    )
                }
            };

            rgb.extend_from_slice(&[r as u8, g as u8, b as u8]);
        }
    }

    rgb
}
