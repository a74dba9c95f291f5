use giacc::convert::{convert, inspect, query, ConvertOptions, Destination, InPlaceStrategy};
use giacc::layout::{Footer, Header, CLASSIC_MODE_TAG, FILENAME_TERMINATOR, HEADER_SIZE};
use giacc::{AssetMode, FormatError, GiaError};
use proptest::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn build_gia(name: &[u8], classic: bool, trailer: &[u8], file_ver: u32) -> Vec<u8> {
    let mut body = name.to_vec();
    if classic {
        body.extend_from_slice(&CLASSIC_MODE_TAG);
    }
    body.extend_from_slice(&FILENAME_TERMINATOR);
    body.extend_from_slice(trailer);

    let total = (HEADER_SIZE + body.len() + 4) as u32;
    let mut out = Vec::new();
    Header::for_total_len(total, file_ver).unwrap().write(&mut out).unwrap();
    out.extend_from_slice(&body);
    Footer::new().write(&mut out).unwrap();
    out
}

fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, bytes).unwrap();
    path
}

fn mapped() -> ConvertOptions {
    ConvertOptions { in_place: InPlaceStrategy::Mapped }
}

fn assert_consistent(path: &Path) {
    let bytes = std::fs::read(path).unwrap();
    let h = Header::read(bytes.as_slice()).unwrap();
    assert_eq!(h.file_len as usize, bytes.len() - 4);
    assert_eq!(h.content_len as usize, bytes.len() - 24);
    let footer = Footer::read(&bytes[bytes.len() - 4..]).unwrap();
    assert_eq!(footer, Footer::new());
}

#[test]
fn minimal_beyond_to_classic() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_file(&dir, "min.gia", &build_gia(b"", false, b"", 1));
    let dst = dir.path().join("min_classic.gia");

    let out = convert(&src, AssetMode::Classic, Destination::path(&dst), &ConvertOptions::default()).unwrap();
    assert_eq!(out.from, AssetMode::Beyond);
    assert!(out.changed);

    let bytes = std::fs::read(&dst).unwrap();
    let h = Header::parse(&bytes).unwrap();
    assert_eq!(bytes.len(), 28);
    assert_eq!(h.file_len, 24);
    assert_eq!(h.content_len, 4);
    assert_eq!(&bytes[HEADER_SIZE..HEADER_SIZE + 4], &[0x20, 0x01, 0x2A, 0x05]);
    assert_eq!(query(&dst).unwrap(), AssetMode::Classic);
}

#[test]
fn round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    let original = build_gia(b"dungeon_01", true, &[0x2A, 0x00, 0x05, 0x20], 12);
    let src = write_file(&dir, "a.gia", &original);
    let tmp = dir.path().join("b.gia");
    let tmp2 = dir.path().join("c.gia");

    convert(&src, AssetMode::Beyond, Destination::path(&tmp), &ConvertOptions::default()).unwrap();
    assert_eq!(query(&tmp).unwrap(), AssetMode::Beyond);
    assert_consistent(&tmp);

    convert(&tmp, AssetMode::Classic, Destination::path(&tmp2), &ConvertOptions::default()).unwrap();
    assert_eq!(std::fs::read(&tmp2).unwrap(), original);
}

#[test]
fn same_mode_copies_verbatim() {
    let dir = tempfile::tempdir().unwrap();
    let original = build_gia(b"npc", false, b"\x00\x01\x02", 4);
    let src = write_file(&dir, "npc.gia", &original);
    let dst = dir.path().join("copy.gia");

    let out = convert(&src, AssetMode::Beyond, Destination::path(&dst), &ConvertOptions::default()).unwrap();
    assert!(!out.changed);
    assert_eq!(std::fs::read(&dst).unwrap(), original);
}

#[test]
fn existing_destination_is_overwritten() {
    let dir = tempfile::tempdir().unwrap();
    let src = write_file(&dir, "s.gia", &build_gia(b"s", false, b"", 1));
    let dst = write_file(&dir, "d.gia", &[0xEE; 500]);

    convert(&src, AssetMode::Classic, Destination::path(&dst), &ConvertOptions::default()).unwrap();
    assert_consistent(&dst);
    assert_eq!(query(&dst).unwrap(), AssetMode::Classic);
}

#[test]
fn destination_equal_to_source_is_safe() {
    let dir = tempfile::tempdir().unwrap();
    let original = build_gia(b"same_path", false, b"tail", 2);
    let src = write_file(&dir, "x.gia", &original);

    convert(&src, AssetMode::Classic, Destination::path(&src), &ConvertOptions::default()).unwrap();
    assert_eq!(std::fs::read(&src).unwrap(), build_gia(b"same_path", true, b"tail", 2));
}

#[test]
fn bad_footer_is_rejected_without_output() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = build_gia(b"broken", false, b"", 1);
    let n = bytes.len();
    bytes[n - 4..].copy_from_slice(&1658u32.to_be_bytes());
    let src = write_file(&dir, "broken.gia", &bytes);
    let dst = dir.path().join("never.gia");

    let err = convert(&src, AssetMode::Classic, Destination::path(&dst), &ConvertOptions::default()).unwrap_err();
    assert_eq!(err.format_reason(), Some(&FormatError::TailMagic(1658)));
    assert!(err.to_string().contains("broken.gia"));
    assert!(!dst.exists());
    // Only the source remains; no stray temporary file either.
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn bad_footer_rejected_for_write_back() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = build_gia(b"broken", true, b"", 1);
    let n = bytes.len();
    bytes[n - 1] = 0;
    let src = write_file(&dir, "broken.gia", &bytes);

    for opts in [ConvertOptions::default(), mapped()] {
        let err = convert(&src, AssetMode::Beyond, Destination::WriteBack, &opts).unwrap_err();
        assert!(matches!(err, GiaError::InvalidFormat { .. }));
        assert_eq!(std::fs::read(&src).unwrap(), bytes);
    }
}

#[test]
fn header_violations_are_reported() {
    let dir = tempfile::tempdir().unwrap();
    let good = build_gia(b"h", false, b"", 1);

    let mut wrong_type = good.clone();
    wrong_type[12..16].copy_from_slice(&2u32.to_be_bytes());
    let p = write_file(&dir, "type.gia", &wrong_type);
    assert_eq!(query(&p).unwrap_err().format_reason(), Some(&FormatError::FileType(2)));

    let mut wrong_magic = good.clone();
    wrong_magic[8..12].copy_from_slice(&805u32.to_be_bytes());
    let p = write_file(&dir, "magic.gia", &wrong_magic);
    assert_eq!(query(&p).unwrap_err().format_reason(), Some(&FormatError::HeadMagic(805)));

    let mut truncated = good.clone();
    truncated.remove(HEADER_SIZE + 1);
    let p = write_file(&dir, "short.gia", &truncated);
    assert!(matches!(
        query(&p).unwrap_err().format_reason(),
        Some(FormatError::FileLen { .. })
    ));
}

#[test]
fn missing_terminator_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = build_gia(b"abc", false, b"", 1);
    bytes[HEADER_SIZE + 3] = 0x2B;
    let p = write_file(&dir, "noterm.gia", &bytes);
    assert_eq!(query(&p).unwrap_err().format_reason(), Some(&FormatError::NoTerminator));
}

#[test]
fn write_back_strategies_match_copy() {
    let dir = tempfile::tempdir().unwrap();
    for (classic, target) in [(false, AssetMode::Classic), (true, AssetMode::Beyond)] {
        let original = build_gia(b"hall_of_mirrors", classic, &[9u8; 1000], 77);
        let src = write_file(&dir, "src.gia", &original);
        let copy = dir.path().join("copy.gia");
        convert(&src, target, Destination::path(&copy), &ConvertOptions::default()).unwrap();
        let expected = std::fs::read(&copy).unwrap();

        for opts in [ConvertOptions::default(), mapped()] {
            let edited = write_file(&dir, "edited.gia", &original);
            let out = convert(&edited, target, Destination::WriteBack, &opts).unwrap();
            assert!(out.changed);
            assert_eq!(std::fs::read(&edited).unwrap(), expected, "{:?}", opts.in_place);
            assert_consistent(&edited);
        }
    }
}

#[test]
fn inspect_reports_tag_position() {
    let dir = tempfile::tempdir().unwrap();
    let p = write_file(&dir, "i.gia", &build_gia(b"name", true, b"", 3));
    let i = inspect(&p).unwrap();
    assert_eq!(i.mode(), AssetMode::Classic);
    assert_eq!(i.detection.anchor_index, HEADER_SIZE + 4);
    assert_eq!(i.detection.terminator_index, HEADER_SIZE + 6);
    assert_eq!(i.header.file_ver, 3);
}

// ── Symlinks and permissions ────────────────────────────────────────────────

#[cfg(unix)]
mod unix {
    use super::*;
    use std::os::unix::fs::{symlink, PermissionsExt};

    fn is_symlink(path: &Path) -> bool {
        std::fs::symlink_metadata(path).unwrap().file_type().is_symlink()
    }

    fn mode_bits(path: &Path) -> u32 {
        std::fs::metadata(path).unwrap().permissions().mode() & 0o777
    }

    #[test]
    fn write_back_through_symlink_edits_target() {
        for opts in [ConvertOptions::default(), mapped()] {
            let dir = tempfile::tempdir().unwrap();
            let real = write_file(&dir, "real.gia", &build_gia(b"", false, b"", 1));
            let link = dir.path().join("link.gia");
            symlink(&real, &link).unwrap();

            convert(&link, AssetMode::Classic, Destination::WriteBack, &opts).unwrap();

            assert!(is_symlink(&link), "{:?} replaced the link", opts.in_place);
            assert_eq!(std::fs::read(&real).unwrap().len(), 28);
            assert_eq!(query(&real).unwrap(), AssetMode::Classic);
            assert_consistent(&real);
        }
    }

    #[test]
    fn symlinked_destination_writes_target() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_file(&dir, "src.gia", &build_gia(b"hall", false, b"", 1));
        let real = write_file(&dir, "real.gia", b"stale");
        let link = dir.path().join("link.gia");
        symlink(&real, &link).unwrap();

        convert(&src, AssetMode::Classic, Destination::path(&link), &ConvertOptions::default()).unwrap();

        assert!(is_symlink(&link));
        assert_eq!(query(&real).unwrap(), AssetMode::Classic);
        assert_consistent(&real);
    }

    #[test]
    fn existing_destination_keeps_permissions() {
        let dir = tempfile::tempdir().unwrap();
        let src = write_file(&dir, "src.gia", &build_gia(b"x", false, b"", 1));
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o600)).unwrap();
        let dst = write_file(&dir, "dst.gia", b"old");
        std::fs::set_permissions(&dst, std::fs::Permissions::from_mode(0o644)).unwrap();

        convert(&src, AssetMode::Classic, Destination::path(&dst), &ConvertOptions::default()).unwrap();
        assert_eq!(mode_bits(&dst), 0o644);

        let fresh = dir.path().join("fresh.gia");
        convert(&src, AssetMode::Classic, Destination::path(&fresh), &ConvertOptions::default()).unwrap();
        assert_eq!(mode_bits(&fresh), 0o600);
    }

    #[test]
    fn read_only_source_is_not_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let original = build_gia(b"locked", false, b"", 1);
        let src = write_file(&dir, "ro.gia", &original);
        std::fs::set_permissions(&src, std::fs::Permissions::from_mode(0o444)).unwrap();
        if std::fs::OpenOptions::new().write(true).open(&src).is_ok() {
            // Privileged user: file permissions are not enforced.
            return;
        }

        for opts in [ConvertOptions::default(), mapped()] {
            let err = convert(&src, AssetMode::Classic, Destination::WriteBack, &opts).unwrap_err();
            assert!(matches!(err, GiaError::Io { .. }), "{err}");
            assert_eq!(std::fs::read(&src).unwrap(), original);
        }
    }
}

// ── Properties ───────────────────────────────────────────────────────────────

fn arb_gia() -> impl Strategy<Value = (Vec<u8>, bool)> {
    (
        proptest::collection::vec(any::<u8>(), 0..64),
        any::<bool>(),
        proptest::collection::vec(any::<u8>(), 0..64),
        any::<u32>(),
    )
        // Trailer must not contain another terminator, or it would become the anchor.
        .prop_filter("trailer holds no terminator", |(_, _, trailer, _)| {
            !trailer.windows(2).any(|w| w == FILENAME_TERMINATOR)
        })
        .prop_map(|(name, classic, trailer, ver)| (build_gia(&name, classic, &trailer, ver), classic))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_round_trip_and_placement((original, classic) in arb_gia()) {
        let dir = tempfile::tempdir().unwrap();
        let src = write_file(&dir, "p.gia", &original);
        let mid = dir.path().join("mid.gia");
        let back = dir.path().join("back.gia");

        let from = query(&src).unwrap();
        // A Beyond name ending in 20 01 reads as Classic; that is the format.
        prop_assume!(from == if classic { AssetMode::Classic } else { AssetMode::Beyond });

        convert(&src, from.other(), Destination::path(&mid), &ConvertOptions::default()).unwrap();
        let mid_bytes = std::fs::read(&mid).unwrap();
        let h = Header::parse(&mid_bytes).unwrap();
        prop_assert_eq!(h.file_len as usize, mid_bytes.len() - 4);
        prop_assert_eq!(h.content_len as usize, mid_bytes.len() - 24);
        prop_assert_eq!(mid_bytes.len() as isize - original.len() as isize,
                        if from == AssetMode::Classic { -2 } else { 2 });

        let i = inspect(&mid).unwrap();
        let t = i.detection.terminator_index;
        let tagged = t >= HEADER_SIZE + 2 && mid_bytes[t - 2..t] == CLASSIC_MODE_TAG;
        prop_assert_eq!(tagged, i.mode() == AssetMode::Classic);
        prop_assert_eq!(i.mode(), from.other());

        convert(&mid, from, Destination::path(&back), &ConvertOptions::default()).unwrap();
        prop_assert_eq!(std::fs::read(&back).unwrap(), original);
    }

    #[test]
    fn prop_in_place_equals_copy((original, _) in arb_gia(), to_classic in any::<bool>()) {
        let target = if to_classic { AssetMode::Classic } else { AssetMode::Beyond };
        let dir = tempfile::tempdir().unwrap();
        let src = write_file(&dir, "s.gia", &original);
        let copy = dir.path().join("copy.gia");
        convert(&src, target, Destination::path(&copy), &ConvertOptions::default()).unwrap();
        let expected = std::fs::read(&copy).unwrap();

        let buffered = write_file(&dir, "buffered.gia", &original);
        convert(&buffered, target, Destination::WriteBack, &ConvertOptions::default()).unwrap();
        prop_assert_eq!(std::fs::read(&buffered).unwrap(), expected.clone());

        let surgical = write_file(&dir, "surgical.gia", &original);
        convert(&surgical, target, Destination::WriteBack, &mapped()).unwrap();
        prop_assert_eq!(std::fs::read(&surgical).unwrap(), expected);
    }
}
