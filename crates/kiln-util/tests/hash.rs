use kiln_util::hash::{sha256_bytes, sha256_file, Fingerprinter};
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;

#[test]
fn test_sha256_bytes_empty() {
    let hash = sha256_bytes(b"");
    assert_eq!(
        hash,
        "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
    );
}

#[test]
fn test_sha256_bytes_hello() {
    let hash = sha256_bytes(b"hello");
    assert_eq!(
        hash,
        "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
    );
}

#[test]
fn test_sha256_file_matches_bytes() {
    let mut tmp = NamedTempFile::new().unwrap();
    tmp.write_all(b"hello").unwrap();
    tmp.flush().unwrap();
    let file_hash = sha256_file(tmp.path()).unwrap();
    assert_eq!(file_hash, sha256_bytes(b"hello"));
}

#[test]
fn test_sha256_file_not_found() {
    let result = sha256_file(Path::new("/nonexistent/path/file.txt"));
    assert!(result.is_err());
}

#[test]
fn test_fingerprinter_matches_line_encoding() {
    let mut fp = Fingerprinter::new();
    fp.field("name", "zlib").field("version", "1.3");
    assert_eq!(fp.finish(), sha256_bytes(b"name:zlib\nversion:1.3\n"));
}

#[test]
fn test_fingerprinter_field_boundaries_matter() {
    let mut a = Fingerprinter::new();
    a.field("opt", "ab").field("opt", "c");
    let mut b = Fingerprinter::new();
    b.field("opt", "a").field("opt", "bc");
    assert_ne!(a.finish(), b.finish());
}

#[test]
fn test_fingerprinter_is_fixed_length() {
    assert_eq!(Fingerprinter::new().finish().len(), 64);
}
