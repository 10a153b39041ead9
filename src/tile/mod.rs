//! Pixel element types and tile buffers.
//!
//! A tile is one rectangular image region flattened in row-major order. The
//! codec layer sees it as a slice of a single element type: borrowed through
//! [`TileData`] / [`TileDataMut`] at the codec boundary, owned through
//! [`TileBuffer`] by the pipeline and the CLI.

use std::fmt;

use byteorder::{BigEndian, ByteOrder};
use serde::{Deserialize, Serialize};

use crate::error::{Result, TileCompError};

/// Element type of the samples in a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    /// 8-bit samples. FITS stores these unsigned, so they are carried as `u8`.
    Int8,
    /// 16-bit signed integer samples.
    Int16,
    /// 32-bit signed integer samples.
    #[default]
    Int32,
    /// 64-bit signed integer samples.
    Int64,
    /// IEEE single precision samples.
    Float32,
    /// IEEE double precision samples.
    Float64,
}

impl ElementType {
    /// All element types, narrowest integer first.
    pub const ALL: [ElementType; 6] = [
        ElementType::Int8,
        ElementType::Int16,
        ElementType::Int32,
        ElementType::Int64,
        ElementType::Float32,
        ElementType::Float64,
    ];

    /// Width of one sample in bytes.
    pub fn byte_width(&self) -> usize {
        match self {
            ElementType::Int8 => 1,
            ElementType::Int16 => 2,
            ElementType::Int32 | ElementType::Float32 => 4,
            ElementType::Int64 | ElementType::Float64 => 8,
        }
    }

    /// Whether the samples are integers.
    pub fn is_integer(&self) -> bool {
        !matches!(self, ElementType::Float32 | ElementType::Float64)
    }

    /// Prefix used when composing built-in compressor names.
    pub fn class_prefix(&self) -> &'static str {
        match self {
            ElementType::Int8 => "Byte",
            ElementType::Int16 => "Short",
            ElementType::Int32 => "Int",
            ElementType::Int64 => "Long",
            ElementType::Float32 => "Float",
            ElementType::Float64 => "Double",
        }
    }

    /// FITS `BITPIX` value for this element type.
    pub fn bitpix(&self) -> i32 {
        let bits = self.byte_width() as i32 * 8;
        if self.is_integer() {
            bits
        } else {
            -bits
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ElementType::Int8 => "int8",
            ElementType::Int16 => "int16",
            ElementType::Int32 => "int32",
            ElementType::Int64 => "int64",
            ElementType::Float32 => "float32",
            ElementType::Float64 => "float64",
        };
        f.pad(name)
    }
}

/// Read-only view over one tile's samples.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TileData<'a> {
    /// 8-bit samples.
    Int8(&'a [u8]),
    /// 16-bit samples.
    Int16(&'a [i16]),
    /// 32-bit samples.
    Int32(&'a [i32]),
    /// 64-bit samples.
    Int64(&'a [i64]),
    /// Single precision samples.
    Float32(&'a [f32]),
    /// Double precision samples.
    Float64(&'a [f64]),
}

/// Writable view over one tile's destination samples.
#[derive(Debug, PartialEq)]
pub enum TileDataMut<'a> {
    /// 8-bit samples.
    Int8(&'a mut [u8]),
    /// 16-bit samples.
    Int16(&'a mut [i16]),
    /// 32-bit samples.
    Int32(&'a mut [i32]),
    /// 64-bit samples.
    Int64(&'a mut [i64]),
    /// Single precision samples.
    Float32(&'a mut [f32]),
    /// Double precision samples.
    Float64(&'a mut [f64]),
}

/// Owned tile samples.
#[derive(Debug, Clone, PartialEq)]
pub enum TileBuffer {
    /// 8-bit samples.
    Int8(Vec<u8>),
    /// 16-bit samples.
    Int16(Vec<i16>),
    /// 32-bit samples.
    Int32(Vec<i32>),
    /// 64-bit samples.
    Int64(Vec<i64>),
    /// Single precision samples.
    Float32(Vec<f32>),
    /// Double precision samples.
    Float64(Vec<f64>),
}

macro_rules! dispatch {
    ($value:expr, $name:ident => $body:expr) => {
        match $value {
            Self::Int8($name) => $body,
            Self::Int16($name) => $body,
            Self::Int32($name) => $body,
            Self::Int64($name) => $body,
            Self::Float32($name) => $body,
            Self::Float64($name) => $body,
        }
    };
}

impl<'a> TileData<'a> {
    /// Element type of the view.
    pub fn element(&self) -> ElementType {
        match self {
            TileData::Int8(_) => ElementType::Int8,
            TileData::Int16(_) => ElementType::Int16,
            TileData::Int32(_) => ElementType::Int32,
            TileData::Int64(_) => ElementType::Int64,
            TileData::Float32(_) => ElementType::Float32,
            TileData::Float64(_) => ElementType::Float64,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        dispatch!(self, s => s.len())
    }

    /// Whether the view holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<'a> TileDataMut<'a> {
    /// Element type of the view.
    pub fn element(&self) -> ElementType {
        match self {
            TileDataMut::Int8(_) => ElementType::Int8,
            TileDataMut::Int16(_) => ElementType::Int16,
            TileDataMut::Int32(_) => ElementType::Int32,
            TileDataMut::Int64(_) => ElementType::Int64,
            TileDataMut::Float32(_) => ElementType::Float32,
            TileDataMut::Float64(_) => ElementType::Float64,
        }
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        dispatch!(self, s => s.len())
    }

    /// Whether the view holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TileBuffer {
    /// A zero-filled buffer of `len` samples.
    pub fn zeros(element: ElementType, len: usize) -> Self {
        match element {
            ElementType::Int8 => TileBuffer::Int8(vec![0; len]),
            ElementType::Int16 => TileBuffer::Int16(vec![0; len]),
            ElementType::Int32 => TileBuffer::Int32(vec![0; len]),
            ElementType::Int64 => TileBuffer::Int64(vec![0; len]),
            ElementType::Float32 => TileBuffer::Float32(vec![0.0; len]),
            ElementType::Float64 => TileBuffer::Float64(vec![0.0; len]),
        }
    }

    /// Element type of the buffer.
    pub fn element(&self) -> ElementType {
        self.as_data().element()
    }

    /// Number of samples.
    pub fn len(&self) -> usize {
        dispatch!(self, s => s.len())
    }

    /// Whether the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Size of the samples in bytes.
    pub fn byte_len(&self) -> usize {
        self.len() * self.element().byte_width()
    }

    /// Borrow the samples.
    pub fn as_data(&self) -> TileData<'_> {
        match self {
            TileBuffer::Int8(v) => TileData::Int8(v),
            TileBuffer::Int16(v) => TileData::Int16(v),
            TileBuffer::Int32(v) => TileData::Int32(v),
            TileBuffer::Int64(v) => TileData::Int64(v),
            TileBuffer::Float32(v) => TileData::Float32(v),
            TileBuffer::Float64(v) => TileData::Float64(v),
        }
    }

    /// Borrow the samples mutably.
    pub fn as_data_mut(&mut self) -> TileDataMut<'_> {
        match self {
            TileBuffer::Int8(v) => TileDataMut::Int8(v),
            TileBuffer::Int16(v) => TileDataMut::Int16(v),
            TileBuffer::Int32(v) => TileDataMut::Int32(v),
            TileBuffer::Int64(v) => TileDataMut::Int64(v),
            TileBuffer::Float32(v) => TileDataMut::Float32(v),
            TileBuffer::Float64(v) => TileDataMut::Float64(v),
        }
    }

    /// Decode big-endian (FITS order) sample bytes.
    pub fn from_be_bytes(element: ElementType, bytes: &[u8]) -> Result<Self> {
        let width = element.byte_width();
        if bytes.len() % width != 0 {
            return Err(TileCompError::Decode(format!(
                "{} bytes is not a whole number of {} samples",
                bytes.len(),
                element
            )));
        }
        let mut tile = TileBuffer::zeros(element, bytes.len() / width);
        dispatch!(&mut tile, s => PixelSample::read_be(bytes, s.as_mut_slice()));
        Ok(tile)
    }

    /// Encode the samples as big-endian (FITS order) bytes.
    pub fn to_be_bytes(&self) -> Vec<u8> {
        let mut bytes = vec![0u8; self.byte_len()];
        dispatch!(self, s => PixelSample::write_be(s.as_slice(), &mut bytes));
        bytes
    }

    /// Split into consecutive tiles of at most `tile_len` samples.
    pub fn chunks(&self, tile_len: usize) -> Vec<TileBuffer> {
        let tile_len = tile_len.max(1);
        match self {
            TileBuffer::Int8(v) => {
                v.chunks(tile_len).map(|c| TileBuffer::Int8(c.to_vec())).collect()
            }
            TileBuffer::Int16(v) => {
                v.chunks(tile_len).map(|c| TileBuffer::Int16(c.to_vec())).collect()
            }
            TileBuffer::Int32(v) => {
                v.chunks(tile_len).map(|c| TileBuffer::Int32(c.to_vec())).collect()
            }
            TileBuffer::Int64(v) => {
                v.chunks(tile_len).map(|c| TileBuffer::Int64(c.to_vec())).collect()
            }
            TileBuffer::Float32(v) => {
                v.chunks(tile_len).map(|c| TileBuffer::Float32(c.to_vec())).collect()
            }
            TileBuffer::Float64(v) => {
                v.chunks(tile_len).map(|c| TileBuffer::Float64(c.to_vec())).collect()
            }
        }
    }
}

/// A sample type a codec can be instantiated for.
pub trait PixelSample: Copy + Default + PartialEq + fmt::Debug + Send + Sync + 'static {
    /// Element type tag of `Self`.
    const ELEMENT: ElementType;

    /// Borrow the samples if the view holds `Self`.
    fn view<'a>(tile: TileData<'a>) -> Option<&'a [Self]>;

    /// Borrow the samples mutably if the view holds `Self`.
    fn view_mut<'a>(tile: TileDataMut<'a>) -> Option<&'a mut [Self]>;

    /// Write `src` as big-endian bytes. `dst` must be exactly
    /// `src.len() * width` long.
    fn write_be(src: &[Self], dst: &mut [u8]);

    /// Read big-endian bytes into `dst`. `src` must be exactly
    /// `dst.len() * width` long.
    fn read_be(src: &[u8], dst: &mut [Self]);
}

macro_rules! impl_pixel_sample {
    ($ty:ty, $variant:ident, $write:ident, $read:ident) => {
        impl PixelSample for $ty {
            const ELEMENT: ElementType = ElementType::$variant;

            fn view<'a>(tile: TileData<'a>) -> Option<&'a [Self]> {
                match tile {
                    TileData::$variant(s) => Some(s),
                    _ => None,
                }
            }

            fn view_mut<'a>(tile: TileDataMut<'a>) -> Option<&'a mut [Self]> {
                match tile {
                    TileDataMut::$variant(s) => Some(s),
                    _ => None,
                }
            }

            fn write_be(src: &[Self], dst: &mut [u8]) {
                BigEndian::$write(src, dst);
            }

            fn read_be(src: &[u8], dst: &mut [Self]) {
                BigEndian::$read(src, dst);
            }
        }

        impl<'a> From<&'a [$ty]> for TileData<'a> {
            fn from(samples: &'a [$ty]) -> Self {
                TileData::$variant(samples)
            }
        }

        impl<'a> From<&'a mut [$ty]> for TileDataMut<'a> {
            fn from(samples: &'a mut [$ty]) -> Self {
                TileDataMut::$variant(samples)
            }
        }

        impl From<Vec<$ty>> for TileBuffer {
            fn from(samples: Vec<$ty>) -> Self {
                TileBuffer::$variant(samples)
            }
        }
    };
}

impl_pixel_sample!(i16, Int16, write_i16_into, read_i16_into);
impl_pixel_sample!(i32, Int32, write_i32_into, read_i32_into);
impl_pixel_sample!(i64, Int64, write_i64_into, read_i64_into);
impl_pixel_sample!(f32, Float32, write_f32_into, read_f32_into);
impl_pixel_sample!(f64, Float64, write_f64_into, read_f64_into);

impl PixelSample for u8 {
    const ELEMENT: ElementType = ElementType::Int8;

    fn view<'a>(tile: TileData<'a>) -> Option<&'a [Self]> {
        match tile {
            TileData::Int8(s) => Some(s),
            _ => None,
        }
    }

    fn view_mut<'a>(tile: TileDataMut<'a>) -> Option<&'a mut [Self]> {
        match tile {
            TileDataMut::Int8(s) => Some(s),
            _ => None,
        }
    }

    fn write_be(src: &[Self], dst: &mut [u8]) {
        dst.copy_from_slice(src);
    }

    fn read_be(src: &[u8], dst: &mut [Self]) {
        dst.copy_from_slice(src);
    }
}

impl<'a> From<&'a [u8]> for TileData<'a> {
    fn from(samples: &'a [u8]) -> Self {
        TileData::Int8(samples)
    }
}

impl<'a> From<&'a mut [u8]> for TileDataMut<'a> {
    fn from(samples: &'a mut [u8]) -> Self {
        TileDataMut::Int8(samples)
    }
}

impl From<Vec<u8>> for TileBuffer {
    fn from(samples: Vec<u8>) -> Self {
        TileBuffer::Int8(samples)
    }
}

/// Integer samples that can be carried through 32-bit pixel arithmetic.
pub trait IntegerSample: PixelSample {
    /// Widen to `i32`, or `None` if the value does not fit.
    fn to_i32(self) -> Option<i32>;

    /// Narrow from `i32`, or `None` if the value does not fit.
    fn from_i32(value: i32) -> Option<Self>;
}

macro_rules! impl_integer_sample {
    ($($ty:ty),*) => {
        $(
            impl IntegerSample for $ty {
                fn to_i32(self) -> Option<i32> {
                    i32::try_from(self).ok()
                }

                fn from_i32(value: i32) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }
            }
        )*
    };
}

impl_integer_sample!(u8, i16, i32, i64);
