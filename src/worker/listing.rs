//! Directory listing engine — spec.md §4.7. `LIST` emits Unix-style long
//! lines; `NLST` emits bare filenames.

use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use tokio::io::AsyncWriteExt;

use crate::ipc::SupervisorHandle;
use crate::stream::Channel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ListingFlags {
    pub include_hidden: bool,
    pub human_readable: bool,
    pub recursive: bool,
}

/// Splits `LIST`/`NLST` arguments into `-a`/`-h`/`-R` flags and a single
/// trailing path argument (defaulting to `.`).
pub fn parse_args(args: &[String]) -> (ListingFlags, String) {
    let mut flags = ListingFlags::default();
    let mut path = None;

    for arg in args {
        if let Some(letters) = arg.strip_prefix('-') {
            for ch in letters.chars() {
                match ch {
                    'a' => flags.include_hidden = true,
                    'h' => flags.human_readable = true,
                    'R' => flags.recursive = true,
                    _ => {}
                }
            }
        } else if path.is_none() {
            path = Some(arg.clone());
        }
    }

    (flags, path.unwrap_or_else(|| ".".to_string()))
}

#[derive(Debug)]
pub enum ListingError {
    NotFound(std::io::Error),
    Io(std::io::Error),
}

/// Enumerates `dir` (single level — `-R` is parsed but not honored, per
/// spec.md §4.7) and writes either bare names (`NLST`) or full Unix-style
/// lines (`LIST`) to `data`, one per CRLF-terminated line.
pub async fn emit(
    dir: &Path,
    flags: ListingFlags,
    long_format: bool,
    supervisor: &SupervisorHandle,
    data: &mut Channel,
) -> Result<(), ListingError> {
    let mut read_dir = tokio::fs::read_dir(dir)
        .await
        .map_err(ListingError::NotFound)?;

    let mut entries = Vec::new();
    while let Some(entry) = read_dir.next_entry().await.map_err(ListingError::Io)? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !flags.include_hidden && name.starts_with('.') {
            continue;
        }
        entries.push((name, entry.path()));
    }
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, path) in entries {
        let line = if long_format {
            format_long_line(&path, &name, flags, supervisor).await?
        } else {
            format!("{name}\r\n")
        };

        data.write_all(line.as_bytes())
            .await
            .map_err(ListingError::Io)?;
    }

    data.flush().await.map_err(ListingError::Io)?;
    Ok(())
}

async fn format_long_line(
    path: &PathBuf,
    name: &str,
    flags: ListingFlags,
    supervisor: &SupervisorHandle,
) -> Result<String, ListingError> {
    let metadata = tokio::fs::symlink_metadata(path)
        .await
        .map_err(ListingError::Io)?;

    let perms = format_permissions(metadata.mode(), metadata.is_dir());
    let nlink = metadata.nlink();
    let owner = supervisor.resolve_uid(metadata.uid()).await;
    let group = supervisor.resolve_gid(metadata.gid()).await;
    let size = if flags.human_readable {
        format_human_size(metadata.size())
    } else {
        format!("{:>13}", metadata.size())
    };
    let mtime = format_mtime(metadata.mtime());

    Ok(format!(
        "{perms} {nlink:>3} {owner:<8} {group:<8} {size} {mtime} {name}\r\n"
    ))
}

fn format_permissions(mode: u32, is_dir: bool) -> String {
    let mut out = String::with_capacity(10);
    out.push(if is_dir { 'd' } else { '-' });

    let bits = [
        (libc::S_IRUSR, 'r'),
        (libc::S_IWUSR, 'w'),
        (libc::S_IXUSR, 'x'),
        (libc::S_IRGRP, 'r'),
        (libc::S_IWGRP, 'w'),
        (libc::S_IXGRP, 'x'),
        (libc::S_IROTH, 'r'),
        (libc::S_IWOTH, 'w'),
        (libc::S_IXOTH, 'x'),
    ];

    for (bit, ch) in bits {
        out.push(if mode & bit as u32 != 0 { ch } else { '-' });
    }

    out
}

fn format_human_size(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["K", "M", "G", "T"];
    if bytes < 1024 {
        return format!("{bytes:>7}");
    }

    let mut value = bytes as f64 / 1024.0;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }

    format!("{value:>6.1}{}", UNITS[unit])
}

/// Renders `%b %d %H:%M` in local time via `localtime_r`, matching
/// spec.md §4.7 without pulling in a date/time crate the rest of the
/// ambient stack doesn't otherwise need.
fn format_mtime(epoch_secs: i64) -> String {
    const MONTHS: [&str; 12] = [
        "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
    ];

    let time = epoch_secs as libc::time_t;
    let mut tm: libc::tm = unsafe { std::mem::zeroed() };
    unsafe {
        libc::localtime_r(&time, &mut tm);
    }

    let month = MONTHS.get(tm.tm_mon as usize).copied().unwrap_or("Jan");
    format!(
        "{month} {:>2} {:02}:{:02}",
        tm.tm_mday, tm.tm_hour, tm.tm_min
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_args_recognizes_combined_flags() {
        let (flags, path) = parse_args(&["-ah".to_string(), "sub".to_string()]);
        assert!(flags.include_hidden);
        assert!(flags.human_readable);
        assert!(!flags.recursive);
        assert_eq!(path, "sub");
    }

    #[test]
    fn parse_args_defaults_path_to_dot() {
        let (_, path) = parse_args(&[]);
        assert_eq!(path, ".");
    }

    #[test]
    fn human_size_formats_kilobytes() {
        assert_eq!(format_human_size(1536).trim(), "1.5K");
    }

    #[test]
    fn permissions_string_has_expected_length() {
        assert_eq!(format_permissions(0o755, true).len(), 10);
        assert!(format_permissions(0o755, true).starts_with('d'));
    }
}
