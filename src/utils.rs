use std::cmp::Ordering;
use std::path::PathBuf;
use std::time::Duration;

use serde::Serializer;

/// Resolves a command name the way a shell would: names containing a `/`
/// are taken as paths, anything else is searched for on `PATH`.
pub fn find_path(filename: &str) -> Option<PathBuf> {
    if filename.contains('/') {
        let path = PathBuf::from(filename);
        return path.is_file().then_some(path);
    }
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(filename))
        .find(|candidate| candidate.is_file())
}

/// Orders names the way `sort -V` does for test files: runs of digits
/// compare by numeric value, everything else byte by byte.
///
/// `case2 < case9 < case10`. Names that only differ in leading zeros fall
/// back to plain byte order so the result is still a total order.
pub fn version_cmp(a: &str, b: &str) -> Ordering {
    let mut x = a.as_bytes();
    let mut y = b.as_bytes();

    while let (Some(&cx), Some(&cy)) = (x.first(), y.first()) {
        let ord = if cx.is_ascii_digit() && cy.is_ascii_digit() {
            let (nx, rest_x) = split_digits(x);
            let (ny, rest_y) = split_digits(y);
            x = rest_x;
            y = rest_y;
            cmp_numeric(nx, ny)
        } else {
            x = &x[1..];
            y = &y[1..];
            cx.cmp(&cy)
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }

    x.len().cmp(&y.len()).then_with(|| a.cmp(b))
}

fn split_digits(s: &[u8]) -> (&[u8], &[u8]) {
    let n = s.iter().take_while(|c| c.is_ascii_digit()).count();
    s.split_at(n)
}

fn cmp_numeric(a: &[u8], b: &[u8]) -> Ordering {
    let a = trim_zeros(a);
    let b = trim_zeros(b);
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn trim_zeros(s: &[u8]) -> &[u8] {
    let n = s.iter().take_while(|&&c| c == b'0').count();
    &s[n..]
}

pub(crate) fn serialize_millis<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

pub(crate) fn serialize_opt_millis<S: Serializer>(
    d: &Option<Duration>,
    s: S,
) -> Result<S::Ok, S::Error> {
    match d {
        Some(d) => s.serialize_some(&(d.as_millis() as u64)),
        None => s.serialize_none(),
    }
}
