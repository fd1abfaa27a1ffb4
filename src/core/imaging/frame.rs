use super::error::ImagingError;
use chrono::{DateTime, Utc};
use image::{GrayImage, RgbImage};
use std::borrow::Cow;
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelLayout {
    Gray,
    Rgb,
}

impl PixelLayout {
    pub fn channels(self) -> usize {
        match self {
            PixelLayout::Gray => 1,
            PixelLayout::Rgb => 3,
        }
    }
}

/// 帧数据结构
#[derive(Debug, Clone)]
pub struct Frame {
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
    pub sequence: u64,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    pub fn new(
        width: u32,
        height: u32,
        layout: PixelLayout,
        data: Vec<u8>,
        sequence: u64,
    ) -> Result<Self, ImagingError> {
        let expected = width as usize * height as usize * layout.channels();
        if data.len() != expected {
            return Err(ImagingError::DimensionMismatch {
                expected,
                actual: data.len(),
            });
        }

        Ok(Self {
            width,
            height,
            layout,
            data,
            sequence,
            captured_at: Utc::now(),
        })
    }

    pub fn gray(width: u32, height: u32, data: Vec<u8>, sequence: u64) -> Result<Self, ImagingError> {
        Self::new(width, height, PixelLayout::Gray, data, sequence)
    }

    pub fn with_timestamp(mut self, captured_at: DateTime<Utc>) -> Self {
        self.captured_at = captured_at;
        self
    }

    pub fn pixel_count(&self) -> usize {
        self.width as usize * self.height as usize
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// 灰度平面；灰度帧直接借用，彩色帧按 BT.601 权重转换
    pub fn luma(&self) -> Cow<'_, [u8]> {
        match self.layout {
            PixelLayout::Gray => Cow::Borrowed(&self.data),
            PixelLayout::Rgb => Cow::Owned(
                self.data
                    .chunks_exact(3)
                    .map(|rgb| {
                        ((rgb[0] as u32 * 299 + rgb[1] as u32 * 587 + rgb[2] as u32 * 114) / 1000)
                            as u8
                    })
                    .collect(),
            ),
        }
    }

    pub fn to_gray(&self) -> Frame {
        Frame {
            width: self.width,
            height: self.height,
            layout: PixelLayout::Gray,
            data: self.luma().into_owned(),
            sequence: self.sequence,
            captured_at: self.captured_at,
        }
    }

    /// 解码图像文件，单通道保持灰度，其余统一转成 8 位 RGB
    pub fn load(path: &Path, sequence: u64) -> Result<Self, ImagingError> {
        let img = image::open(path)?;
        let (width, height) = (img.width(), img.height());

        if img.color().has_color() {
            Self::new(width, height, PixelLayout::Rgb, img.to_rgb8().into_raw(), sequence)
        } else {
            Self::new(width, height, PixelLayout::Gray, img.to_luma8().into_raw(), sequence)
        }
    }

    /// 编码写入 `path`，格式由扩展名决定
    pub fn save(&self, path: &Path) -> Result<(), ImagingError> {
        let expected = self.pixel_count() * self.layout.channels();
        let mismatch = ImagingError::DimensionMismatch {
            expected,
            actual: self.data.len(),
        };

        match self.layout {
            PixelLayout::Gray => GrayImage::from_raw(self.width, self.height, self.data.clone())
                .ok_or(mismatch)?
                .save(path)?,
            PixelLayout::Rgb => RgbImage::from_raw(self.width, self.height, self.data.clone())
                .ok_or(mismatch)?
                .save(path)?,
        }

        Ok(())
    }
}
