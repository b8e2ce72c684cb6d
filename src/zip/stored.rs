//! The stored-entry reader (C6): a seekable view of a `stored` (method 0)
//! entry's `[data_offset, data_offset + length)` range.

use std::cell::RefCell;
use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;

use super::pool::HandlePool;

/// Bounds memory per open stream (§4.6); implementations may pick larger.
const BUFSIZE: usize = 128;

pub struct StoredReader {
    pool: Rc<RefCell<HandlePool>>,
    idx: usize,
    data_offset: u64,
    filelength: u64,
    remaining: u64,
    buf: Vec<u8>,
    buf_start: usize,
    buf_len: usize,
}

impl StoredReader {
    pub(crate) fn new(
        pool: Rc<RefCell<HandlePool>>,
        idx: usize,
        data_offset: u64,
        filelength: u64,
    ) -> io::Result<Self> {
        pool.borrow_mut()
            .handle_mut(idx)
            .seek(SeekFrom::Start(data_offset))?;
        Ok(StoredReader {
            pool,
            idx,
            data_offset,
            filelength,
            remaining: filelength,
            buf: vec![0u8; BUFSIZE],
            buf_start: 0,
            buf_len: 0,
        })
    }

    fn refill(&mut self) -> io::Result<()> {
        let want = std::cmp::min(BUFSIZE as u64, self.remaining) as usize;
        if want == 0 {
            self.buf_start = 0;
            self.buf_len = 0;
            return Ok(());
        }
        let n = {
            let mut pool = self.pool.borrow_mut();
            pool.handle_mut(self.idx).read(&mut self.buf[..want])?
        };
        self.remaining -= n as u64;
        self.buf_start = 0;
        self.buf_len = n;
        Ok(())
    }

    fn logical_pos(&self) -> u64 {
        self.filelength - self.remaining - (self.buf_len - self.buf_start) as u64
    }
}

impl Read for StoredReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.buf_start >= self.buf_len {
            self.refill()?;
            if self.buf_len == 0 {
                return Ok(0);
            }
        }
        let avail = self.buf_len - self.buf_start;
        let n = std::cmp::min(avail, out.len());
        out[..n].copy_from_slice(&self.buf[self.buf_start..self.buf_start + n]);
        self.buf_start += n;
        Ok(n)
    }
}

impl Seek for StoredReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let current = self.logical_pos() as i64;
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(p) => self.filelength as i64 + p,
            SeekFrom::Current(p) => current + p,
        };
        let clamped = target.clamp(0, self.filelength as i64) as u64;

        {
            let mut pool = self.pool.borrow_mut();
            pool.handle_mut(self.idx)
                .seek(SeekFrom::Start(self.data_offset + clamped))?;
        }
        self.remaining = self.filelength - clamped;
        self.buf_start = 0;
        self.buf_len = 0;

        Ok(clamped)
    }
}

impl Drop for StoredReader {
    fn drop(&mut self) {
        self.pool.borrow_mut().release(self.idx);
    }
}
