use serde::Serialize;
use std::io::{self, Read, Write};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    Zstd,
}

impl Compression {
    /// Suffix only; file contents are never sniffed.
    pub fn from_file_name(name: &str) -> Self {
        if name.ends_with(".gz") {
            Compression::Gzip
        } else if name.ends_with(".zst") {
            Compression::Zstd
        } else {
            Compression::None
        }
    }

    pub fn extension(self) -> Option<&'static str> {
        match self {
            Compression::None => None,
            Compression::Gzip => Some(".gz"),
            Compression::Zstd => Some(".zst"),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Compression::None => "plain",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
        }
    }

    pub fn strip_extension(self, name: &str) -> &str {
        match self.extension() {
            Some(ext) => name.strip_suffix(ext).unwrap_or(name),
            None => name,
        }
    }

    /// Executable that `remote_reader_command` depends on.
    pub fn remote_tool(self) -> &'static str {
        match self {
            Compression::None => "cat",
            Compression::Gzip => "gzip",
            Compression::Zstd => "zstd",
        }
    }

    /// Remote command that writes the decompressed bytes of a file to stdout.
    pub fn remote_reader_command(self) -> &'static str {
        match self {
            Compression::None => "cat",
            Compression::Gzip => "gzip -dc",
            Compression::Zstd => "zstd -dcq",
        }
    }

    pub fn decompress_to<R: Read, W: Write>(self, reader: R, writer: &mut W) -> io::Result<u64> {
        match self {
            Compression::None => {
                let mut reader = reader;
                io::copy(&mut reader, writer)
            }
            Compression::Gzip => {
                let mut decoder = flate2::read::MultiGzDecoder::new(reader);
                io::copy(&mut decoder, writer)
            }
            Compression::Zstd => {
                let mut decoder = zstd::stream::read::Decoder::new(reader)?;
                io::copy(&mut decoder, writer)
            }
        }
    }
}

/// Write sink that only remembers whether a byte needle went past.
pub struct NeedleSink {
    needle: Vec<u8>,
    tail: Vec<u8>,
    found: bool,
}

impl NeedleSink {
    pub fn new(needle: &str) -> Self {
        Self {
            needle: needle.as_bytes().to_vec(),
            tail: Vec::new(),
            found: needle.is_empty(),
        }
    }

    pub fn found(&self) -> bool {
        self.found
    }
}

impl Write for NeedleSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.found {
            return Ok(buf.len());
        }
        // Needles can straddle two writes, so search the carried tail plus the new chunk.
        let mut window = std::mem::take(&mut self.tail);
        window.extend_from_slice(buf);
        if contains_bytes(&window, &self.needle) {
            self.found = true;
            return Ok(buf.len());
        }
        let keep = self.needle.len().saturating_sub(1).min(window.len());
        self.tail = window.split_off(window.len() - keep);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn contains_bytes(haystack: &[u8], needle: &[u8]) -> bool {
    if needle.is_empty() {
        return true;
    }
    haystack.windows(needle.len()).any(|window| window == needle)
}

/// UTF-8 when valid, otherwise Latin-1 so every byte still maps to a char.
pub fn decode_text(bytes: Vec<u8>) -> String {
    match String::from_utf8(bytes) {
        Ok(text) => text,
        Err(err) => err.into_bytes().iter().map(|&b| b as char).collect(),
    }
}
