//! Archive producer
//!
//! The closure is handed to an external producer as newline-terminated
//! records on its standard input, one `.`-prefixed path per line, in closure
//! order. The producer runs with the root as its working directory, so the
//! records name entries relative to the root.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use crate::core::closure::{Closure, ClosureBuilder};
use crate::error::{ArchiveError, InitramfsError};

/// Consumer of closure records
pub trait ArchiveSink {
    /// Append one record for the root-relative `path`
    fn write_record(&mut self, path: &Path) -> Result<(), ArchiveError>;

    /// Close the input and wait for the producer to finish
    fn close(&mut self) -> Result<(), ArchiveError>;
}

/// Encode `path` as a producer record
pub fn record(path: &Path) -> Result<Vec<u8>, ArchiveError> {
    let bytes = path.as_os_str().as_bytes();
    if bytes.contains(&b'\n') {
        return Err(ArchiveError::UnrepresentablePath {
            path: path.to_path_buf(),
        });
    }
    let mut record = Vec::with_capacity(bytes.len() + 2);
    record.push(b'.');
    record.extend_from_slice(bytes);
    record.push(b'\n');
    Ok(record)
}

/// Stream every path of `closure` into `sink`.
///
/// The sink is always closed. A producer failure is reported in preference
/// to the write error it usually causes.
pub fn write_archive<S: ArchiveSink + ?Sized>(
    sink: &mut S,
    closure: &Closure,
) -> Result<usize, ArchiveError> {
    let mut written = 0;
    let mut result = Ok(());
    for path in closure.iter() {
        if let Err(e) = sink.write_record(path) {
            result = Err(e);
            break;
        }
        written += 1;
    }

    sink.close()?;
    result?;

    tracing::info!("Wrote {written} records");
    Ok(written)
}

/// Build the closure of `entries` and stream it into the sink `open` returns.
///
/// The sink is opened only once the closure is complete. Returns the closed
/// sink and the number of records written.
pub fn archive_closure<P, S, F>(
    builder: &ClosureBuilder,
    entries: &[P],
    open: F,
) -> Result<(S, usize), InitramfsError>
where
    P: AsRef<Path>,
    S: ArchiveSink,
    F: FnOnce() -> Result<S, ArchiveError>,
{
    let closure = builder.build(entries)?;
    let mut sink = open()?;
    let written = write_archive(&mut sink, &closure)?;
    Ok((sink, written))
}

/// Producer running as a child process
#[derive(Debug)]
pub struct CommandSink {
    program: String,
    child: Option<Child>,
    stdin: Option<BufWriter<ChildStdin>>,
    records: usize,
}

impl CommandSink {
    /// Spawn `argv` in `root` with its output going to `output`
    pub fn spawn(argv: &[String], root: &Path, output: &Path) -> Result<Self, ArchiveError> {
        let (program, args) = argv.split_first().ok_or_else(|| ArchiveError::Spawn {
            program: String::new(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command"),
        })?;

        let output_error = |source| ArchiveError::Output {
            path: output.to_path_buf(),
            source,
        };
        if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(output_error)?;
        }
        let file = File::create(output).map_err(output_error)?;

        tracing::debug!("Spawning {argv:?} in {}", root.display());
        let mut child = Command::new(program)
            .args(args)
            .current_dir(root)
            .stdin(Stdio::piped())
            .stdout(Stdio::from(file))
            .spawn()
            .map_err(|source| ArchiveError::Spawn {
                program: program.clone(),
                source,
            })?;

        let stdin = child.stdin.take().map(BufWriter::new);
        Ok(Self {
            program: program.clone(),
            child: Some(child),
            stdin,
            records: 0,
        })
    }

    fn write_error(&self, source: std::io::Error) -> ArchiveError {
        ArchiveError::Write {
            program: self.program.clone(),
            source,
        }
    }
}

impl ArchiveSink for CommandSink {
    fn write_record(&mut self, path: &Path) -> Result<(), ArchiveError> {
        let record = record(path)?;
        let Some(stdin) = self.stdin.as_mut() else {
            return Err(self.write_error(std::io::ErrorKind::BrokenPipe.into()));
        };
        if let Err(e) = stdin.write_all(&record) {
            return Err(self.write_error(e));
        }
        self.records += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ArchiveError> {
        let flushed = match self.stdin.take() {
            // Dropping the writer closes the pipe
            Some(mut stdin) => stdin.flush().map_err(|e| self.write_error(e)),
            None => Ok(()),
        };

        let Some(mut child) = self.child.take() else {
            return flushed;
        };
        let status = child.wait().map_err(|source| ArchiveError::Wait {
            program: self.program.clone(),
            source,
        })?;

        if !status.success() {
            return Err(ArchiveError::ProducerFailed {
                program: self.program.clone(),
                status: status.to_string(),
                records: self.records,
            });
        }
        tracing::debug!("{} finished after {} records", self.program, self.records);
        flushed
    }
}

impl Drop for CommandSink {
    fn drop(&mut self) {
        self.stdin.take();
        if let Some(mut child) = self.child.take() {
            let _ = child.wait();
        }
    }
}

/// Sink collecting records in memory
#[derive(Debug, Default)]
pub struct MemorySink {
    buffer: Vec<u8>,
    exit_code: i32,
    closed: bool,
}

impl MemorySink {
    /// A sink that succeeds
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose producer exits with `exit_code`
    pub fn with_exit_code(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    /// The raw record stream
    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Records without their trailing newline
    pub fn records(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.buffer)
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Whether `close` has been called
    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl ArchiveSink for MemorySink {
    fn write_record(&mut self, path: &Path) -> Result<(), ArchiveError> {
        let record = record(path)?;
        self.buffer.extend_from_slice(&record);
        Ok(())
    }

    fn close(&mut self) -> Result<(), ArchiveError> {
        self.closed = true;
        if self.exit_code != 0 {
            return Err(ArchiveError::ProducerFailed {
                program: "memory".to_string(),
                status: format!("exit status: {}", self.exit_code),
                records: self.records().len(),
            });
        }
        Ok(())
    }
}

/// Default location of the archive when none is configured
pub fn default_output(configured: Option<&Path>) -> PathBuf {
    configured.map_or_else(
        || crate::infra::dirs::AppDirs::new().default_archive_path(),
        Path::to_path_buf,
    )
}
