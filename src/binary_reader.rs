use debug_print::*;
use std::fs::File;
use std::io::{self, BufRead, Read};

/// Reads raw planar samples from stdin, a file or memory.
pub struct BinaryReader<'a> {
    input: Box<dyn BufRead + 'a>,
}

impl<'a> BinaryReader<'a> {
    pub fn standard(stdin: &'a io::Stdin) -> BinaryReader<'a> {
        BinaryReader {
            input: Box::new(stdin.lock()),
        }
    }

    pub fn file(path: String) -> io::Result<BinaryReader<'a>> {
        File::open(path).map(|file| BinaryReader {
            input: Box::new(io::BufReader::new(file)),
        })
    }

    pub fn vec(v: &'a [u8]) -> io::Result<BinaryReader<'a>> {
        Ok(BinaryReader { input: Box::new(v) })
    }

    pub fn read_to_vec(&mut self, v: &mut [u8]) -> io::Result<usize> {
        let len = v.len();
        debug_eprintln!("len = {}", len);
        let mut read_bytes = 0;
        while read_bytes < len {
            match self.input.read(&mut v[read_bytes..]) {
                Ok(0) => return Err(io::Error::from(io::ErrorKind::UnexpectedEof)),
                Ok(s) => read_bytes += s,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(len)
    }

    /// Reads `num_samples` samples, one byte each for 8-bit content and two
    /// little-endian bytes otherwise.
    pub fn read_samples(&mut self, num_samples: usize, bit_depth: usize) -> io::Result<Vec<u16>> {
        if bit_depth <= 8 {
            let mut buf = vec![0u8; num_samples];
            self.read_to_vec(&mut buf)?;
            Ok(buf.into_iter().map(u16::from).collect())
        } else {
            let mut buf = vec![0u8; num_samples * 2];
            self.read_to_vec(&mut buf)?;
            let mask = (1u16 << bit_depth) - 1;
            Ok(buf
                .chunks_exact(2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]) & mask)
                .collect())
        }
    }
}

impl<'a> Read for BinaryReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}
