use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::MultiGzDecoder;
use tempfile::Builder;

use crate::error::KronaError;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Wraps `reader` in a gzip decoder when the stream starts with the gzip magic bytes.
pub fn decode_reader(mut reader: Box<dyn BufRead>) -> io::Result<Box<dyn BufRead>> {
    let is_gzip = reader.fill_buf()?.starts_with(&GZIP_MAGIC);
    if is_gzip {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(reader)
    }
}

pub fn open_text(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    decode_reader(Box::new(BufReader::new(file)))
}

pub fn md5_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        context.consume(&buffer[..read]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Writes through a temporary file in the destination directory, then renames it into place.
pub fn write_atomic<F>(destination: &Path, write: F) -> Result<(), KronaError>
where
    F: FnOnce(&mut dyn Write) -> io::Result<()>,
{
    let dir = destination
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let mut temp = Builder::new()
        .prefix(".sylph2krona-")
        .tempfile_in(dir)
        .map_err(|err| KronaError::Filesystem(format!("create temp file in {}: {err}", dir.display())))?;
    {
        let mut writer = BufWriter::new(temp.as_file_mut());
        write(&mut writer).map_err(|err| KronaError::Filesystem(err.to_string()))?;
        writer
            .flush()
            .map_err(|err| KronaError::Filesystem(err.to_string()))?;
    }
    temp.persist(destination).map_err(|err| {
        KronaError::Filesystem(format!("persist {}: {}", destination.display(), err.error))
    })?;
    Ok(())
}
