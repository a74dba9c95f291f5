//! High-level conversion API — the surface the CLI calls.
//!
//! ```no_run
//! use giacc::convert::{convert, query, ConvertOptions, Destination};
//!
//! let mode = query("level.gia")?;
//! let outcome = convert("level.gia", mode.other(), Destination::path("level_out.gia"),
//!                       &ConvertOptions::default())?;
//! assert!(outcome.changed);
//! # Ok::<(), giacc::GiaError>(())
//! ```
//!
//! Every call walks the same stages: open → validate → detect → plan →
//! apply.  Nothing is written until validation, detection and planning have
//! all succeeded, and nothing learned about a file is kept between calls.

use std::fs::{File, OpenOptions, Permissions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::detect::{detect, AssetMode, Detection};
use crate::edit::{apply_in_place, MappedFile};
use crate::error::{FormatError, GiaError};
use crate::layout::{check_records, Footer, Header, MIN_FILE_SIZE};
use crate::plan::{plan, Plan};
use crate::rewrite::rewrite;

// ── Options ──────────────────────────────────────────────────────────────────

/// How a write-back conversion edits the source file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InPlaceStrategy {
    /// Edit an owned copy in memory, then atomically replace the source.
    /// Costs one file's worth of memory; an I/O failure leaves the source
    /// untouched.
    #[default]
    Buffered,
    /// Resize and shift the memory-mapped source directly.  An I/O failure
    /// mid-edit leaves the file in neither layout.
    Mapped,
}

/// Configuration for [`convert`].
#[derive(Debug, Clone, Default)]
pub struct ConvertOptions {
    pub in_place: InPlaceStrategy,
}

/// Where [`convert`] writes its result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Destination {
    Path(PathBuf),
    /// Overwrite the source file.
    WriteBack,
}

impl Destination {
    pub fn path<P: AsRef<Path>>(p: P) -> Self {
        Destination::Path(p.as_ref().to_owned())
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Outcome {
    pub from:    AssetMode,
    pub to:      AssetMode,
    /// False when the source was already in the target mode.
    pub changed: bool,
}

/// Everything learned about a file without modifying it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Inspection {
    pub header:    Header,
    pub footer:    Footer,
    pub detection: Detection,
    pub total_len: usize,
}

impl Inspection {
    pub fn mode(&self) -> AssetMode {
        self.detection.mode
    }
}

// ── Source access ────────────────────────────────────────────────────────────

/// Read-only mapping of a source file.  Files too small to be valid are
/// rejected before mapping.
struct Source {
    map:   Mmap,
    perms: Permissions,
}

impl Source {
    fn open(path: &Path) -> Result<Self, GiaError> {
        let file = File::open(path).map_err(|e| GiaError::io(path, e))?;
        let meta = file.metadata().map_err(|e| GiaError::io(path, e))?;
        let len = meta.len();
        if len < MIN_FILE_SIZE as u64 {
            return Err(GiaError::invalid(path, FormatError::TooShort(len)));
        }
        // SAFETY: the file is not expected to change while mapped; concurrent
        // external modification is unsupported.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| GiaError::io(path, e))?;
        debug!(path = %path.display(), len, "opened source");
        Ok(Self { map, perms: meta.permissions() })
    }

    fn bytes(&self) -> &[u8] {
        &self.map
    }
}

fn inspect_bytes(path: &Path, bytes: &[u8]) -> Result<Inspection, GiaError> {
    let (header, footer) = check_records(bytes).map_err(|e| GiaError::invalid(path, e))?;
    debug!(path = %path.display(), file_ver = header.file_ver, "records validated");

    let detection = detect(bytes).map_err(|e| GiaError::invalid(path, e))?;
    debug!(
        path = %path.display(),
        mode = %detection.mode,
        terminator = detection.terminator_index,
        anchor = detection.anchor_index,
        "mode detected"
    );

    Ok(Inspection { header, footer, detection, total_len: bytes.len() })
}

fn plan_for(path: &Path, inspection: &Inspection, target: AssetMode) -> Result<Plan, GiaError> {
    let p = plan(&inspection.header, inspection.total_len, &inspection.detection, target)
        .map_err(|e| GiaError::invalid(path, e))?;
    debug!(path = %path.display(), ?p, "planned");
    Ok(p)
}

// ── Operations ───────────────────────────────────────────────────────────────

/// Validate `path` and report its current mode.  Never modifies the file.
pub fn query<P: AsRef<Path>>(path: P) -> Result<AssetMode, GiaError> {
    inspect(path).map(|i| i.mode())
}

/// Validate `path` and return its records and marker positions.
pub fn inspect<P: AsRef<Path>>(path: P) -> Result<Inspection, GiaError> {
    let path = path.as_ref();
    let src = Source::open(path)?;
    inspect_bytes(path, src.bytes())
}

/// Convert `src` to `target` mode, writing to `dst`.
///
/// A distinct destination always receives a full file: either a converted
/// image or a byte-identical copy when no change is needed.  It is written to
/// a temporary sibling and renamed into place, so a rejected source never
/// creates or truncates it.
pub fn convert<P: AsRef<Path>>(
    src:    P,
    target: AssetMode,
    dst:    Destination,
    opts:   &ConvertOptions,
) -> Result<Outcome, GiaError> {
    let src = src.as_ref();
    let from = match dst {
        Destination::Path(ref out) => convert_to_path(src, target, out)?,
        Destination::WriteBack => match opts.in_place {
            InPlaceStrategy::Buffered => convert_buffered(src, target)?,
            InPlaceStrategy::Mapped   => convert_mapped(src, target)?,
        },
    };
    let outcome = Outcome { from, to: target, changed: from != target };
    info!(path = %src.display(), from = %outcome.from, to = %outcome.to, changed = outcome.changed, "conversion finished");
    Ok(outcome)
}

fn convert_to_path(src_path: &Path, target: AssetMode, dst_path: &Path) -> Result<AssetMode, GiaError> {
    let src = Source::open(src_path)?;
    let inspection = inspect_bytes(src_path, src.bytes())?;
    let p = plan_for(src_path, &inspection, target)?;

    let dst = resolve_target(dst_path)?;
    // An existing destination keeps its own permissions; a new one takes the source's.
    let perms = match std::fs::metadata(&dst) {
        Ok(meta) => meta.permissions(),
        Err(_)   => src.perms.clone(),
    };
    let mut tmp = temp_sibling(&dst, &perms)?;
    {
        let mut out = BufWriter::new(tmp.as_file_mut());
        rewrite(src.bytes(), &p, &mut out).map_err(|e| GiaError::io(dst_path, e))?;
        out.flush().map_err(|e| GiaError::io(dst_path, e))?;
    }
    tmp.persist(&dst).map_err(|e| GiaError::io(dst_path, e.error))?;
    debug!(path = %dst.display(), len = p.output_len(inspection.total_len), "destination written");
    Ok(inspection.mode())
}

fn convert_buffered(path: &Path, target: AssetMode) -> Result<AssetMode, GiaError> {
    let real = resolve_target(path)?;
    check_writable(path, &real)?;

    let src = Source::open(path)?;
    let inspection = inspect_bytes(path, src.bytes())?;
    let p = plan_for(path, &inspection, target)?;
    if p.is_noop() {
        return Ok(inspection.mode());
    }

    let mut buf = src.bytes().to_vec();
    let perms = src.perms.clone();
    drop(src);
    apply_in_place(&mut buf, &p).map_err(|e| GiaError::io(path, e))?;

    let mut tmp = temp_sibling(&real, &perms)?;
    tmp.write_all(&buf).map_err(|e| GiaError::io(path, e))?;
    tmp.persist(&real).map_err(|e| GiaError::io(path, e.error))?;
    debug!(path = %real.display(), len = buf.len(), "source replaced");
    Ok(inspection.mode())
}

fn convert_mapped(path: &Path, target: AssetMode) -> Result<AssetMode, GiaError> {
    let len = std::fs::metadata(path).map_err(|e| GiaError::io(path, e))?.len();
    if len < MIN_FILE_SIZE as u64 {
        return Err(GiaError::invalid(path, FormatError::TooShort(len)));
    }
    let mut file = MappedFile::open(path).map_err(|e| GiaError::io(path, e))?;
    let inspection = inspect_bytes(path, file.as_bytes())?;
    let p = plan_for(path, &inspection, target)?;
    if p.is_noop() {
        return Ok(inspection.mode());
    }

    apply_in_place(&mut file, &p).map_err(|e| GiaError::io(path, e))?;
    file.flush().map_err(|e| GiaError::io(path, e))?;
    debug!(path = %path.display(), "source edited in place");
    Ok(inspection.mode())
}

/// The file a rename should land on: symlinks are followed, and a path
/// that does not exist yet is resolved through its parent directory.
fn resolve_target(path: &Path) -> Result<PathBuf, GiaError> {
    match std::fs::canonicalize(path) {
        Ok(real) => Ok(real),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            let name = path.file_name().ok_or_else(|| GiaError::io(path, e))?;
            let parent = match path.parent() {
                Some(d) if !d.as_os_str().is_empty() => d,
                _ => Path::new("."),
            };
            let dir = std::fs::canonicalize(parent).map_err(|e| GiaError::io(path, e))?;
            Ok(dir.join(name))
        }
        Err(e) => Err(GiaError::io(path, e)),
    }
}

/// Write-back replaces the file by rename, which only needs directory
/// access; require write access to the file itself as a direct edit would.
fn check_writable(path: &Path, real: &Path) -> Result<(), GiaError> {
    OpenOptions::new()
        .write(true)
        .open(real)
        .map(drop)
        .map_err(|e| GiaError::io(path, e))
}

/// Temporary file next to `target` (same filesystem, so `persist` is a
/// rename) carrying the given permissions.
fn temp_sibling(target: &Path, perms: &Permissions) -> Result<NamedTempFile, GiaError> {
    let dir = match target.parent() {
        Some(d) if !d.as_os_str().is_empty() => d,
        _ => Path::new("."),
    };
    let tmp = NamedTempFile::new_in(dir).map_err(|e| GiaError::io(target, e))?;
    tmp.as_file()
        .set_permissions(perms.clone())
        .map_err(|e| GiaError::io(target, e))?;
    Ok(tmp)
}
