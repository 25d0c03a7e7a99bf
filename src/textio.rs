use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

fn is_gz(path: &Path) -> bool {
    path.extension().map(|ext| ext == "gz").unwrap_or(false)
}

/// Open a text file for streaming, transparently decompressing `.gz`.
pub fn open_text_reader<P: AsRef<Path>>(path: P) -> io::Result<Box<dyn BufRead>> {
    let path = path.as_ref();
    let f = File::open(path)?;

    // Concatenated gzip members are common for split-then-joined outputs
    let reader: Box<dyn BufRead> = if is_gz(path) {
        Box::new(BufReader::new(MultiGzDecoder::new(f)))
    } else {
        Box::new(BufReader::new(f))
    };
    Ok(reader)
}

/// Output sink for per-job and summary files, gzip-compressed when the path ends in `.gz`.
pub enum TextWriter {
    Plain(BufWriter<File>),
    Gz(BufWriter<GzEncoder<File>>),
}

impl TextWriter {
    /// Create `path`; `.gz` paths are compressed at `level` (0-9).
    pub fn create<P: AsRef<Path>>(path: P, level: u32) -> io::Result<Self> {
        let path = path.as_ref();
        let f = File::create(path)?;
        if is_gz(path) {
            Ok(TextWriter::Gz(BufWriter::new(GzEncoder::new(f, Compression::new(level)))))
        } else {
            Ok(TextWriter::Plain(BufWriter::new(f)))
        }
    }

    /// Flush everything and write the gzip trailer. Dropping without calling
    /// this silently swallows the trailer write error.
    pub fn finish(self) -> io::Result<()> {
        match self {
            TextWriter::Plain(mut w) => w.flush(),
            TextWriter::Gz(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?.flush()
            }
        }
    }
}

impl Write for TextWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            TextWriter::Plain(w) => w.write(buf),
            TextWriter::Gz(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            TextWriter::Plain(w) => w.flush(),
            TextWriter::Gz(w) => w.flush(),
        }
    }
}
