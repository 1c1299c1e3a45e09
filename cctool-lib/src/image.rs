//! 稀疏内存镜像及其合并
//!
//! 镜像由若干 (起始地址, 数据) 段组成。写入 Flash 前先合并成一段连续数据，
//! 段与段之间的空隙按擦除后的 Flash 内容填充为 0xFF。

use crate::{Error, Result};
use std::borrow::Cow;

/// 空隙填充值，与擦除后的 Flash 一致
pub const PAD_BYTE: u8 = 0xFF;

/// 镜像中的一段连续数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    pub address: u32,
    pub data: Vec<u8>,
}

impl Segment {
    pub fn new(address: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            address,
            data: data.into(),
        }
    }

    /// One past the last address covered by this segment.
    pub fn end(&self) -> u64 {
        self.address as u64 + self.data.len() as u64
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryImage {
    segments: Vec<Segment>,
}

/// 合并后的连续数据
///
/// 只有一段时直接借用原数据，不会分配填充缓冲区。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CombinedImage<'a> {
    pub origin: u32,
    pub data: Cow<'a, [u8]>,
}

impl CombinedImage<'_> {
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_segments(segments: Vec<Segment>) -> Self {
        Self { segments }
    }

    pub fn single(address: u32, data: impl Into<Vec<u8>>) -> Self {
        Self {
            segments: vec![Segment::new(address, data)],
        }
    }

    pub fn push(&mut self, address: u32, data: impl Into<Vec<u8>>) {
        self.segments.push(Segment::new(address, data));
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Number of payload bytes, gaps excluded.
    pub fn data_len(&self) -> usize {
        self.segments.iter().map(|s| s.data.len()).sum()
    }

    /// 合并为一段连续数据
    pub fn combine(&self) -> Result<CombinedImage<'_>> {
        combine(&self.segments)
    }
}

/// Merges non-overlapping segments into one contiguous buffer.
///
/// The lowest start address becomes the origin and every byte not covered by
/// a segment is [`PAD_BYTE`]. A single segment is returned as-is. Overlapping
/// segments are rejected.
pub fn combine(segments: &[Segment]) -> Result<CombinedImage<'_>> {
    match segments {
        [] => Err(Error::invalid_input("cannot combine an empty image")),
        [only] => Ok(CombinedImage {
            origin: only.address,
            data: Cow::Borrowed(&only.data),
        }),
        _ => {
            check_overlap(segments)?;

            let origin = segments.iter().map(|s| s.address).min().unwrap_or(0);
            let end = segments.iter().map(Segment::end).max().unwrap_or(0);
            let len = usize::try_from(end - origin as u64)
                .map_err(|_| Error::invalid_input("combined image does not fit in memory"))?;

            let mut data = vec![PAD_BYTE; len];
            for segment in segments {
                let offset = (segment.address - origin) as usize;
                data[offset..offset + segment.data.len()].copy_from_slice(&segment.data);
            }

            tracing::debug!(
                "Combined {} segments into 0x{:X} bytes at 0x{:08X}",
                segments.len(),
                len,
                origin
            );

            Ok(CombinedImage {
                origin,
                data: Cow::Owned(data),
            })
        }
    }
}

fn check_overlap(segments: &[Segment]) -> Result<()> {
    let mut sorted: Vec<&Segment> = segments.iter().filter(|s| !s.data.is_empty()).collect();
    sorted.sort_by_key(|s| s.address);

    for pair in sorted.windows(2) {
        if pair[0].end() > pair[1].address as u64 {
            return Err(Error::OverlappingRegions {
                first: pair[0].address,
                second: pair[1].address,
            });
        }
    }
    Ok(())
}
