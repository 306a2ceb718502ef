use std::{
    fs::{self, File, OpenOptions},
    io::{self, BufRead, BufReader, Write},
    path::{Path, PathBuf},
    sync::Arc,
};

use parking_lot::Mutex;

/// Append-only log file that is trimmed back to its newest `max_lines`
/// lines whenever it grows past the cap by a tenth (at least 50 lines).
#[derive(Clone)]
pub struct CappedFileWriter {
    path: Arc<PathBuf>,
    max_lines: usize,
    lines: Arc<Mutex<usize>>,
}

impl CappedFileWriter {
    pub fn new(path: impl AsRef<Path>, max_lines: usize) -> Self {
        let path = path.as_ref().to_path_buf();
        let existing = count_lines(&path).unwrap_or(0);
        Self {
            path: Arc::new(path),
            max_lines: max_lines.max(1),
            lines: Arc::new(Mutex::new(existing)),
        }
    }

    fn slack(&self) -> usize {
        (self.max_lines / 10).max(50)
    }

    fn trim(&self) -> io::Result<usize> {
        let file = File::open(self.path.as_path())?;
        let lines: Vec<String> = BufReader::new(file).lines().collect::<Result<_, _>>()?;
        if lines.len() <= self.max_lines {
            return Ok(lines.len());
        }

        let keep = &lines[lines.len() - self.max_lines..];
        let tmp = self.path.with_extension("tmp");
        {
            let mut out = File::create(&tmp)?;
            for line in keep {
                writeln!(out, "{}", line)?;
            }
        }
        fs::rename(&tmp, self.path.as_path())?;
        Ok(keep.len())
    }
}

fn count_lines(path: &Path) -> io::Result<usize> {
    let file = File::open(path)?;
    Ok(BufReader::new(file).lines().count())
}

impl io::Write for CappedFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut lines = self.lines.lock();

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.path.as_path())?;
        file.write_all(buf)?;

        *lines += buf.iter().filter(|&&b| b == b'\n').count();
        if *lines >= self.max_lines + self.slack() {
            match self.trim() {
                Ok(remaining) => *lines = remaining,
                Err(e) => eprintln!("Failed to trim log file: {}", e),
            }
        }

        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for CappedFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
