//! I/O 抽象层.
//!
//! [`IoStream`] 是宿主提供的可定位字节流, [`IoContext`] 在其上提供
//! 带缓冲的读取与大端读写辅助方法.
//!
//! 并非所有流都支持全部操作: 某些宿主的写入流在写入期间既不能读取
//! 也不能查询大小. 因此 `truncate`/`size` 默认返回 `Unsupported`,
//! 且 `IoContext` 自行记录当前位置, 写入路径从不调用 `tell`/`size`/`read`.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use mox_core::{MoxError, MoxResult};

/// 可定位字节流 trait
///
/// 宿主适配层实现此 trait 以接入自己的文件句柄.
pub trait IoStream: Send {
    /// 读取数据, 返回实际读取的字节数 (0 表示流末尾)
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
    /// 写入数据, 返回实际写入的字节数
    fn write(&mut self, buf: &[u8]) -> io::Result<usize>;
    /// 定位到绝对偏移
    fn seek(&mut self, offset: u64) -> io::Result<u64>;
    /// 当前偏移
    fn tell(&mut self) -> io::Result<u64>;
    /// 截断到指定大小
    fn truncate(&mut self, _size: u64) -> io::Result<()> {
        Err(unsupported("truncate"))
    }
    /// 流总大小
    fn size(&mut self) -> io::Result<u64> {
        Err(unsupported("size"))
    }
    /// 刷新缓冲
    fn flush(&mut self) -> io::Result<()>;
}

fn unsupported(op: &str) -> io::Error {
    io::Error::new(io::ErrorKind::Unsupported, format!("流不支持 {op} 操作"))
}

/// 默认读缓冲区大小 (32 KB)
const DEFAULT_BUFFER_SIZE: usize = 32 * 1024;

/// I/O 上下文
///
/// 封装 [`IoStream`], 为容器读写提供统一的数据接口.
pub struct IoContext {
    /// 内部流
    inner: Box<dyn IoStream>,
    /// 读缓冲区
    buffer: Vec<u8>,
    /// 缓冲区中的有效数据长度
    buf_len: usize,
    /// 缓冲区当前读取位置
    buf_pos: usize,
    /// 逻辑位置 (已考虑读缓冲区)
    pos: u64,
}

impl IoContext {
    /// 从流创建上下文, 假定流位于偏移 0
    pub fn new(stream: Box<dyn IoStream>) -> Self {
        Self {
            inner: stream,
            buffer: vec![0u8; DEFAULT_BUFFER_SIZE],
            buf_len: 0,
            buf_pos: 0,
            pos: 0,
        }
    }

    // ========================
    // 读取方法
    // ========================

    /// 读取指定字节数, 流提前结束时返回 [`MoxError::Eof`]
    pub fn read_exact(&mut self, buf: &mut [u8]) -> MoxResult<()> {
        let mut total_read = 0;
        while total_read < buf.len() {
            let buffered = self.buf_len - self.buf_pos;
            if buffered > 0 {
                let to_copy = buffered.min(buf.len() - total_read);
                buf[total_read..total_read + to_copy]
                    .copy_from_slice(&self.buffer[self.buf_pos..self.buf_pos + to_copy]);
                self.buf_pos += to_copy;
                total_read += to_copy;
                self.pos += to_copy as u64;
            } else {
                self.buf_pos = 0;
                self.buf_len = self.inner.read(&mut self.buffer)?;
                if self.buf_len == 0 {
                    return Err(MoxError::Eof);
                }
            }
        }
        Ok(())
    }

    /// 读取 u16 大端
    pub fn read_u16_be(&mut self) -> MoxResult<u16> {
        let mut buf = [0u8; 2];
        self.read_exact(&mut buf)?;
        Ok(u16::from_be_bytes(buf))
    }

    /// 读取 u32 大端
    pub fn read_u32_be(&mut self) -> MoxResult<u32> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(u32::from_be_bytes(buf))
    }

    /// 读取 u64 大端
    pub fn read_u64_be(&mut self) -> MoxResult<u64> {
        let mut buf = [0u8; 8];
        self.read_exact(&mut buf)?;
        Ok(u64::from_be_bytes(buf))
    }

    /// 读取 4 字节标签
    pub fn read_tag(&mut self) -> MoxResult<[u8; 4]> {
        let mut buf = [0u8; 4];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    /// 读取指定数量的字节
    pub fn read_bytes(&mut self, count: usize) -> MoxResult<Vec<u8>> {
        let mut buf = vec![0u8; count];
        self.read_exact(&mut buf)?;
        Ok(buf)
    }

    // ========================
    // 写入方法
    // ========================

    /// 写入全部数据
    pub fn write_all(&mut self, mut buf: &[u8]) -> MoxResult<()> {
        // 写入前丢弃预读数据, 使底层流位置与逻辑位置一致
        if self.buf_len != self.buf_pos {
            self.inner.seek(self.pos)?;
        }
        self.buf_len = 0;
        self.buf_pos = 0;
        while !buf.is_empty() {
            let n = self.inner.write(buf)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::WriteZero, "流拒绝写入").into());
            }
            buf = &buf[n..];
            self.pos += n as u64;
        }
        Ok(())
    }

    /// 写入 u16 大端
    pub fn write_u16_be(&mut self, v: u16) -> MoxResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// 写入 u32 大端
    pub fn write_u32_be(&mut self, v: u32) -> MoxResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// 写入 u64 大端
    pub fn write_u64_be(&mut self, v: u64) -> MoxResult<()> {
        self.write_all(&v.to_be_bytes())
    }

    /// 写入 4 字节标签
    pub fn write_tag(&mut self, tag: &[u8; 4]) -> MoxResult<()> {
        self.write_all(tag)
    }

    // ========================
    // 定位方法
    // ========================

    /// 定位到绝对偏移
    ///
    /// 注意: seek 会清空读缓冲区.
    pub fn seek(&mut self, offset: u64) -> MoxResult<()> {
        self.buf_pos = 0;
        self.buf_len = 0;
        self.pos = self.inner.seek(offset)?;
        Ok(())
    }

    /// 当前逻辑位置 (不访问底层流)
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// 流总大小
    pub fn size(&mut self) -> MoxResult<u64> {
        Ok(self.inner.size()?)
    }

    /// 刷新底层流
    pub fn flush(&mut self) -> MoxResult<()> {
        Ok(self.inner.flush()?)
    }
}

/// 文件流
pub struct FileStream {
    file: File,
}

impl FileStream {
    /// 以只读方式打开文件
    pub fn open(path: impl AsRef<Path>) -> MoxResult<Self> {
        Ok(Self {
            file: File::open(path)?,
        })
    }

    /// 创建 (或清空) 文件用于写入
    pub fn create(path: impl AsRef<Path>) -> MoxResult<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Ok(Self { file })
    }

    /// 包装已打开的文件
    pub fn from_file(file: File) -> Self {
        Self { file }
    }
}

impl IoStream for FileStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.file.read(buf)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.write(buf)
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        self.file.seek(SeekFrom::Start(offset))
    }

    fn tell(&mut self) -> io::Result<u64> {
        self.file.stream_position()
    }

    fn truncate(&mut self, size: u64) -> io::Result<()> {
        self.file.set_len(size)
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.file.metadata()?.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.flush()
    }
}

/// 内存流
///
/// 克隆得到的流共享同一块缓冲区但各自维护位置, 便于写入后
/// 重新以读取方式打开同一份数据.
#[derive(Clone, Default)]
pub struct MemoryStream {
    data: Arc<Mutex<Vec<u8>>>,
    pos: usize,
}

impl MemoryStream {
    /// 创建空缓冲区 (用于写入)
    pub fn new() -> Self {
        Self::default()
    }

    /// 从已有数据创建 (用于读取)
    pub fn from_data(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(Mutex::new(data)),
            pos: 0,
        }
    }

    /// 共享同一缓冲区、位置归零的新流
    pub fn reopen(&self) -> Self {
        Self {
            data: Arc::clone(&self.data),
            pos: 0,
        }
    }

    /// 复制当前数据
    pub fn snapshot(&self) -> Vec<u8> {
        self.lock().clone()
    }

    /// 当前数据长度
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// 是否为空
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, Vec<u8>> {
        self.data.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl IoStream for MemoryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let data = self.lock();
        let available = data.len().saturating_sub(self.pos);
        let to_read = buf.len().min(available);
        buf[..to_read].copy_from_slice(&data[self.pos..self.pos + to_read]);
        drop(data);
        self.pos += to_read;
        Ok(to_read)
    }

    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut data = self.lock();
        if self.pos > data.len() {
            data.resize(self.pos, 0);
        }
        // 覆盖已有数据, 超出部分追加
        let overlap = (data.len() - self.pos).min(buf.len());
        data[self.pos..self.pos + overlap].copy_from_slice(&buf[..overlap]);
        data.extend_from_slice(&buf[overlap..]);
        drop(data);
        self.pos += buf.len();
        Ok(buf.len())
    }

    fn seek(&mut self, offset: u64) -> io::Result<u64> {
        self.pos = usize::try_from(offset)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "seek 位置超出范围"))?;
        Ok(offset)
    }

    fn tell(&mut self) -> io::Result<u64> {
        Ok(self.pos as u64)
    }

    fn truncate(&mut self, size: u64) -> io::Result<()> {
        let size = usize::try_from(size)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "截断大小超出范围"))?;
        self.lock().truncate(size);
        Ok(())
    }

    fn size(&mut self) -> io::Result<u64> {
        Ok(self.len() as u64)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_stream_shared_buffer() {
        let writer = MemoryStream::new();
        let mut ctx = IoContext::new(Box::new(writer.clone()));
        ctx.write_tag(b"MOX!").unwrap();
        ctx.write_u32_be(0x0102_0304).unwrap();
        assert_eq!(ctx.position(), 8);
        assert_eq!(writer.snapshot(), b"MOX!\x01\x02\x03\x04");

        let mut reader = IoContext::new(Box::new(writer.reopen()));
        assert_eq!(&reader.read_tag().unwrap(), b"MOX!");
        assert_eq!(reader.read_u32_be().unwrap(), 0x0102_0304);
        assert!(matches!(reader.read_u16_be(), Err(MoxError::Eof)));
    }

    #[test]
    fn test_seek_and_read() {
        let mut ctx = IoContext::new(Box::new(MemoryStream::from_data((0u8..32).collect())));
        ctx.seek(30).unwrap();
        assert_eq!(ctx.read_u16_be().unwrap(), 0x1E1F);
        assert_eq!(ctx.position(), 32);
        assert_eq!(ctx.size().unwrap(), 32);
    }

    #[test]
    fn test_write_after_buffered_read() {
        let stream = MemoryStream::from_data(vec![0u8; 16]);
        let mut ctx = IoContext::new(Box::new(stream.clone()));
        ctx.read_u32_be().unwrap();
        ctx.write_u32_be(0xFFFF_FFFF).unwrap();
        assert_eq!(&stream.snapshot()[4..8], &[0xFF; 4]);
        assert_eq!(ctx.position(), 8);
    }

    #[test]
    fn test_file_stream_truncate_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stream.bin");
        let mut ctx = IoContext::new(Box::new(FileStream::create(&path).unwrap()));
        ctx.write_u64_be(0x0102_0304_0506_0708).unwrap();
        ctx.flush().unwrap();
        assert_eq!(ctx.size().unwrap(), 8);

        let mut file = FileStream::open(&path).unwrap();
        let mut buf = [0u8; 8];
        assert_eq!(file.read(&mut buf).unwrap(), 8);
        assert_eq!(buf, [1, 2, 3, 4, 5, 6, 7, 8]);

        let mut rw = FileStream::create(&path).unwrap();
        rw.write(&[9; 16]).unwrap();
        rw.truncate(4).unwrap();
        assert_eq!(rw.size().unwrap(), 4);
        assert_eq!(rw.tell().unwrap(), 16);
    }

    #[test]
    fn test_default_stream_ops_unsupported() {
        struct Sink;
        impl IoStream for Sink {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::Unsupported, "只写"))
            }
            fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
                Ok(buf.len())
            }
            fn seek(&mut self, offset: u64) -> io::Result<u64> {
                Ok(offset)
            }
            fn tell(&mut self) -> io::Result<u64> {
                Ok(0)
            }
            fn flush(&mut self) -> io::Result<()> {
                Ok(())
            }
        }
        let mut ctx = IoContext::new(Box::new(Sink));
        assert!(ctx.size().is_err());
        ctx.write_u64_be(7).unwrap();
        assert_eq!(ctx.position(), 8);
    }
}
