//! 无压缩编解码器.
//!
//! 依次拼接各通道平面, 采样以小端字节序存储.
//! 支持任意通道组合、混合采样类型与子采样.

use std::sync::Arc;

use log::trace;
use mox_core::{MoxError, MoxResult};

use crate::codec::{CodecParameters, VideoCodec};
use crate::compression::VideoCompression;
use crate::plane::Plane;

/// 无压缩编解码器
pub struct UncompressedCodec;

impl UncompressedCodec {
    pub fn create() -> MoxResult<Arc<dyn VideoCodec>> {
        Ok(Arc::new(Self))
    }
}

impl VideoCodec for UncompressedCodec {
    fn compression(&self) -> VideoCompression {
        VideoCompression::Uncompressed
    }

    fn name(&self) -> &str {
        "uncompressed"
    }

    fn check(&self, params: &CodecParameters) -> MoxResult<()> {
        for desc in &params.channels {
            desc.pixel_type.ensure_codable()?;
        }
        Ok(())
    }

    fn encode(&self, planes: &[Plane], params: &CodecParameters) -> MoxResult<Vec<u8>> {
        params.validate_planes(planes)?;
        let total: usize = planes.iter().map(|p| p.data.len()).sum();
        let mut out = Vec::with_capacity(total);
        for plane in planes {
            out.extend_from_slice(&plane.to_le_bytes());
        }
        trace!("无压缩编码: {} 个平面, {} 字节", planes.len(), out.len());
        Ok(out)
    }

    fn decode(&self, data: &[u8], params: &CodecParameters) -> MoxResult<Vec<Plane>> {
        let expected: usize = (0..params.channels.len()).map(|i| params.plane_len(i)).sum();
        if data.len() != expected {
            return Err(MoxError::Format(format!(
                "无压缩帧长度不匹配: 期望 {expected}, 实际 {}",
                data.len()
            )));
        }
        let mut planes = Vec::with_capacity(params.channels.len());
        let mut offset = 0;
        for (i, desc) in params.channels.iter().enumerate() {
            let (w, h) = params.plane_dims(i);
            let len = params.plane_len(i);
            planes.push(Plane::from_le_bytes(
                desc.pixel_type,
                w,
                h,
                &data[offset..offset + len],
            )?);
            offset += len;
        }
        Ok(planes)
    }
}
