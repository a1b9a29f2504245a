use anyhow::{Context, Result};
use md5::{Digest, Md5};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Stream a file through MD5 and return the 32-character lowercase hex
/// digest. The hash identifies content; it is not a security measure.
pub fn md5_hex(path: &Path) -> Result<String> {
    let f = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let mut r = BufReader::new(f);

    let mut buf = vec![0u8; 1024 * 1024];

    let mut h = Md5::new();
    loop {
        let n = r
            .read(&mut buf)
            .with_context(|| format!("read {}", path.display()))?;
        if n == 0 {
            break;
        }
        h.update(&buf[..n]);
    }

    Ok(hex::encode(h.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn known_digests() {
        let dir = tempfile::tempdir().unwrap();

        let abc = dir.path().join("abc");
        let mut f = File::create(&abc).unwrap();
        f.write_all(b"abc").unwrap();
        drop(f);
        assert_eq!(md5_hex(&abc).unwrap(), "900150983cd24fb0d6963f7d28e17f72");

        let xdong = dir.path().join("xdong");
        std::fs::write(&xdong, b"xdong").unwrap();
        assert_eq!(md5_hex(&xdong).unwrap(), "ac970faf8b99258047c5a385070e3d64");
    }

    #[test]
    fn empty_file_digest() {
        let dir = tempfile::tempdir().unwrap();
        let empty = dir.path().join("empty");
        std::fs::write(&empty, b"").unwrap();
        assert_eq!(md5_hex(&empty).unwrap(), "d41d8cd98f00b204e9800998ecf8427e");
    }

    #[test]
    fn missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(md5_hex(&dir.path().join("nope")).is_err());
    }
}
