/*
   Zip file reader and writer, in pure Rust.
   Copyright (C) 2022 Matheus Xavier <mxavier@neonimp.com>

   This program is free software: you can redistribute it and/or modify
   it under the terms of the GNU Lesser General Public License as published by
   the Free Software Foundation, either version 3 of the License, or
   (at your option) any later version.

   This program is distributed in the hope that it will be useful,
   but WITHOUT ANY WARRANTY; without even the implied warranty of
   MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
   GNU General Public License for more details.

   You should have received a copy of the GNU Lesser General Public License
   along with this program.  If not, see <https://www.gnu.org/licenses/>.
*/

//! The deflate-entry reader (C7): a seekable view over a `deflate`
//! (method 8) entry, driven by a streaming inflater that is reset and
//! replayed from the start on backward seeks (§4.7).

use std::cell::RefCell;
use std::io::{self, Read, Seek, SeekFrom};
use std::rc::Rc;

use flate2::{Decompress, FlushDecompress, Status};

use super::pool::HandlePool;

const INBUF_SIZE: usize = 128;
const OUTBUF_SIZE: usize = 128;

pub struct DeflateReader {
    pool: Rc<RefCell<HandlePool>>,
    idx: usize,
    data_offset: u64,
    filelength: u64,
    compressed_length: u64,

    inflater: Decompress,
    compressed_remaining: u64,

    inbuf: Vec<u8>,
    in_start: usize,
    in_len: usize,

    outbuf: Vec<u8>,
    out_pos: usize,
    out_len: usize,

    /// Total uncompressed bytes produced since the last `reset()`; the
    /// logical start of `outbuf`'s window is `produced_total - out_len`.
    produced_total: u64,
    eof: bool,
    /// Set when the stream truncates mid-entry; reads behave as EOF (§9).
    error: bool,
}

impl DeflateReader {
    pub(crate) fn new(
        pool: Rc<RefCell<HandlePool>>,
        idx: usize,
        data_offset: u64,
        filelength: u64,
        compressed_length: u64,
    ) -> io::Result<Self> {
        pool.borrow_mut()
            .handle_mut(idx)
            .seek(SeekFrom::Start(data_offset))?;
        Ok(DeflateReader {
            pool,
            idx,
            data_offset,
            filelength,
            compressed_length,
            inflater: Decompress::new(false),
            compressed_remaining: compressed_length,
            inbuf: vec![0u8; INBUF_SIZE],
            in_start: 0,
            in_len: 0,
            outbuf: vec![0u8; OUTBUF_SIZE],
            out_pos: 0,
            out_len: 0,
            produced_total: 0,
            eof: false,
            error: false,
        })
    }

    fn reset(&mut self) -> io::Result<()> {
        self.pool
            .borrow_mut()
            .handle_mut(self.idx)
            .seek(SeekFrom::Start(self.data_offset))?;
        self.inflater.reset(false);
        self.compressed_remaining = self.compressed_length;
        self.in_start = 0;
        self.in_len = 0;
        self.out_pos = 0;
        self.out_len = 0;
        self.produced_total = 0;
        self.eof = false;
        self.error = false;
        Ok(())
    }

    fn window_start(&self) -> u64 {
        self.produced_total - self.out_len as u64
    }

    /// Top up the input buffer and run the inflater once, materializing
    /// more of `outbuf` (§4.7).
    fn refill(&mut self) -> io::Result<()> {
        if self.eof || self.error {
            self.out_pos = 0;
            self.out_len = 0;
            return Ok(());
        }

        if self.in_start >= self.in_len && self.compressed_remaining > 0 {
            let want = std::cmp::min(INBUF_SIZE as u64, self.compressed_remaining) as usize;
            let n = {
                let mut pool = self.pool.borrow_mut();
                pool.handle_mut(self.idx).read(&mut self.inbuf[..want])?
            };
            self.compressed_remaining -= n as u64;
            self.in_start = 0;
            self.in_len = n;
        }

        let before_in = self.inflater.total_in();
        let before_out = self.inflater.total_out();

        let flush = if self.compressed_remaining == 0 && self.in_start >= self.in_len {
            FlushDecompress::Finish
        } else {
            FlushDecompress::None
        };

        let status = self
            .inflater
            .decompress(
                &self.inbuf[self.in_start..self.in_len],
                &mut self.outbuf[..],
                flush,
            )
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let consumed = (self.inflater.total_in() - before_in) as usize;
        let produced = (self.inflater.total_out() - before_out) as usize;

        self.in_start += consumed;
        self.out_pos = 0;
        self.out_len = produced;
        self.produced_total += produced as u64;

        match status {
            Status::StreamEnd => self.eof = true,
            Status::Ok | Status::BufError => {
                if consumed == 0
                    && produced == 0
                    && self.in_start >= self.in_len
                    && self.compressed_remaining == 0
                {
                    self.error = true;
                }
            }
        }

        Ok(())
    }
}

impl Read for DeflateReader {
    fn read(&mut self, out: &mut [u8]) -> io::Result<usize> {
        if self.out_pos >= self.out_len {
            self.refill()?;
            if self.out_pos >= self.out_len {
                return Ok(0);
            }
        }
        let avail = self.out_len - self.out_pos;
        let n = std::cmp::min(avail, out.len());
        out[..n].copy_from_slice(&self.outbuf[self.out_pos..self.out_pos + n]);
        self.out_pos += n;
        Ok(n)
    }
}

impl Seek for DeflateReader {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let current = (self.window_start() as i64) + self.out_pos as i64;
        let target = match pos {
            SeekFrom::Start(p) => p as i64,
            SeekFrom::End(p) => self.filelength as i64 + p,
            SeekFrom::Current(p) => current + p,
        };
        let clamped = target.clamp(0, self.filelength as i64) as u64;

        let window_start = self.window_start();
        if !self.error && clamped >= window_start && clamped < window_start + self.out_len as u64
        {
            self.out_pos = (clamped - window_start) as usize;
            return Ok(clamped);
        }

        if !self.error && clamped >= window_start + self.out_len as u64 {
            // Forward past the window: keep draining from where the
            // decompressor already is instead of rewinding (§4.7).
            while self.produced_total < clamped && !self.eof {
                self.refill()?;
            }
        } else {
            // Behind the window, or the stream is broken: DEFLATE isn't
            // randomly seekable backward, so replay from the entry start.
            self.reset()?;
            while self.produced_total < clamped && !self.eof {
                self.refill()?;
            }
        }

        let window_start = self.window_start();
        self.out_pos = (clamped - window_start).min(self.out_len as u64) as usize;

        Ok(clamped)
    }
}

impl Drop for DeflateReader {
    fn drop(&mut self) {
        self.pool.borrow_mut().release(self.idx);
    }
}
