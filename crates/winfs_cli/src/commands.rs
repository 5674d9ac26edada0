//! Subcommands, each a thin shell over one filesystem verb

use crate::error::CliError;
use chrono::DateTime;
use clap::Subcommand;
use std::io::{Read, Write};
use std::time::{Duration, UNIX_EPOCH};
use winfs::{
    Channel, IniSection, IniValue, LineFlags, NativeFs, SortOrder, StreamContext, WinFs, WriteFlags,
};

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List a folder through the name service
    Ls {
        #[arg(value_name = "PATH", default_value = ".")]
        path: String,
    },
    /// List a folder, sorted
    Scandir {
        #[arg(value_name = "PATH", default_value = ".")]
        path: String,

        /// Sort descending
        #[arg(long)]
        desc: bool,

        /// Bypass the name service
        #[arg(long)]
        native: bool,
    },
    /// Print a file
    Cat {
        #[arg(value_name = "PATH")]
        path: String,

        /// Start at this byte offset
        #[arg(long)]
        offset: Option<u64>,

        /// Read at most this many bytes
        #[arg(long)]
        length: Option<usize>,

        /// Print line by line, dropping empty lines
        #[arg(long, conflicts_with_all = ["offset", "length"])]
        lines: bool,
    },
    /// Write stdin (or TEXT) to a file
    Put {
        #[arg(value_name = "PATH")]
        path: String,

        #[arg(value_name = "TEXT")]
        text: Option<String>,

        /// Append instead of truncating
        #[arg(short, long)]
        append: bool,
    },
    /// Copy a file
    Cp {
        from: String,
        to: String,

        /// Bypass the name service
        #[arg(long)]
        native: bool,
    },
    /// Rename a file or folder
    Mv {
        from: String,
        to: String,

        /// Bypass the name service
        #[arg(long)]
        native: bool,
    },
    /// Delete a file
    Rm {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Create a folder
    Mkdir {
        #[arg(value_name = "PATH")]
        path: String,

        /// Create missing parents
        #[arg(short, long)]
        parents: bool,

        /// Permission bits, octal
        #[arg(short, long, default_value = "777", value_parser = parse_octal)]
        mode: u32,
    },
    /// Delete an empty folder
    Rmdir {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Create a file or update its times
    Touch {
        #[arg(value_name = "PATH")]
        path: String,

        /// Modification time, seconds since the Unix epoch
        #[arg(long)]
        mtime: Option<u64>,

        /// Access time, seconds since the Unix epoch
        #[arg(long)]
        atime: Option<u64>,
    },
    /// Show metadata
    Stat {
        #[arg(value_name = "PATH")]
        path: String,

        /// Do not follow symbolic links
        #[arg(short = 'L', long)]
        no_follow: bool,
    },
    /// Does the name service know PATH?
    Exists {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Print the canonical absolute path
    Realpath {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Set the hidden attribute
    Hide {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Show the path the native filesystem would be given
    Resolve {
        #[arg(value_name = "PATH")]
        path: String,
    },
    /// Parse an INI file
    Ini {
        #[arg(value_name = "PATH")]
        path: String,

        /// Keep `[sections]` apart
        #[arg(short, long)]
        sections: bool,
    },
}

fn parse_octal(value: &str) -> std::result::Result<u32, String> {
    u32::from_str_radix(value.trim_start_matches("0o"), 8).map_err(|e| format!("not an octal mode: {}", e))
}

fn channel_name(channel: Channel) -> &'static str {
    match channel {
        Channel::Service => "service",
        Channel::Native => "native",
    }
}

fn context(native: bool) -> Option<StreamContext> {
    native.then(StreamContext::new)
}

fn format_time(seconds: i64) -> String {
    DateTime::from_timestamp(seconds, 0)
        .map(|time| time.to_rfc3339())
        .unwrap_or_else(|| seconds.to_string())
}

/// Execute one subcommand
pub fn run<N, R, W>(fs: &WinFs<N>, command: Command, input: &mut R, out: &mut W) -> Result<()>
where
    N: NativeFs,
    R: Read,
    W: Write,
{
    tracing::debug!("Running {:?}", command);

    match command {
        Command::Ls { path } => {
            let names = fs.ls(&path);
            if names.is_empty() && !fs.exists(&path) {
                return Err(CliError::NotFound(path));
            }
            for name in names {
                writeln!(out, "{}", name)?;
            }
        }

        Command::Scandir { path, desc, native } => {
            let order = if desc { SortOrder::Descending } else { SortOrder::Ascending };
            for name in fs.scandir(&path, order, context(native).as_ref())? {
                writeln!(out, "{}", name)?;
            }
        }

        Command::Cat { path, offset, length, lines } => {
            if lines {
                let flags = LineFlags {
                    ignore_new_lines: true,
                    skip_empty_lines: true,
                };
                for line in fs.lines(&path, flags)? {
                    writeln!(out, "{}", line)?;
                }
            } else if offset.is_some() || length.is_some() {
                let bytes = fs.get_contents_range(&path, offset.unwrap_or(0), length)?;
                out.write_all(&bytes)?;
            } else {
                fs.read_to(&path, out)?;
            }
        }

        Command::Put { path, text, append } => {
            let data = match text {
                Some(text) => text.into_bytes(),
                None => {
                    let mut data = Vec::new();
                    input.read_to_end(&mut data)?;
                    data
                }
            };
            let written = fs.put_contents(&path, data, WriteFlags { append })?;
            tracing::info!("Wrote {} bytes to {}", written, path);
        }

        Command::Cp { from, to, native } => {
            let channel = fs.copy(&from, &to, context(native).as_ref()).into_result()?;
            writeln!(out, "copied via {}", channel_name(channel))?;
        }

        Command::Mv { from, to, native } => {
            let channel = fs.rename(&from, &to, context(native).as_ref()).into_result()?;
            writeln!(out, "renamed via {}", channel_name(channel))?;
        }

        Command::Rm { path } => fs.unlink(&path)?,

        Command::Mkdir { path, parents, mode } => fs.mkdir(&path, mode, parents, None)?,

        Command::Rmdir { path } => fs.rmdir(&path)?,

        Command::Touch { path, mtime, atime } => {
            let to_time = |seconds: u64| UNIX_EPOCH + Duration::from_secs(seconds);
            fs.touch(&path, mtime.map(to_time), atime.map(to_time))?;
        }

        Command::Stat { path, no_follow } => {
            let stat = if no_follow { fs.lstat(&path)? } else { fs.stat(&path)? };
            writeln!(out, "type:  {}", stat.kind.as_str())?;
            writeln!(out, "size:  {}", stat.size)?;
            writeln!(out, "mode:  {:o}", stat.mode)?;
            writeln!(out, "uid:   {}", stat.uid)?;
            writeln!(out, "gid:   {}", stat.gid)?;
            writeln!(out, "inode: {}", stat.inode)?;
            writeln!(out, "atime: {}", format_time(stat.atime))?;
            writeln!(out, "mtime: {}", format_time(stat.mtime))?;
            writeln!(out, "ctime: {}", format_time(stat.ctime))?;
        }

        Command::Exists { path } => writeln!(out, "{}", fs.exists(&path))?,

        Command::Realpath { path } => match fs.realpath(&path) {
            Some(real) => writeln!(out, "{}", real)?,
            None => return Err(CliError::NotFound(path)),
        },

        Command::Hide { path } => fs.hide(&path)?,

        Command::Resolve { path } => {
            let resolved = fs.resolve(&path);
            writeln!(out, "{}\t{}", channel_name(resolved.channel()), resolved.path())?;
        }

        Command::Ini { path, sections } => {
            let doc = fs.parse_ini(&path, sections)?;
            print_section(out, &doc.globals)?;
            for (name, section) in &doc.sections {
                writeln!(out, "[{}]", name)?;
                print_section(out, section)?;
            }
        }
    }

    Ok(())
}

fn print_section<W: Write>(out: &mut W, section: &IniSection) -> Result<()> {
    for (key, value) in section.iter() {
        match value {
            IniValue::Scalar(value) => writeln!(out, "{} = {}", key, value)?,
            IniValue::Array(items) => {
                for (index, value) in items {
                    writeln!(out, "{}[{}] = {}", key, index, value)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::sync::Arc;
    use winfs::{PathNormalizer, ServiceAdapter, ShortNameService, StdNativeFs};

    #[derive(Parser)]
    struct TestCli {
        #[command(subcommand)]
        command: Command,
    }

    struct Fixture {
        _dir: tempfile::TempDir,
        fs: WinFs<StdNativeFs>,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let fs = WinFs::new(
            StdNativeFs::narrow(1252).unwrap(),
            ServiceAdapter::with_service(Arc::new(ShortNameService::new())),
        )
        .with_normalizer(PathNormalizer::new().with_base(dir.path().to_string_lossy().into_owned()));
        Fixture { _dir: dir, fs }
    }

    fn exec(fx: &Fixture, args: &[&str], stdin: &[u8]) -> Result<String> {
        let cli = TestCli::try_parse_from(std::iter::once("winfs").chain(args.iter().copied()))
            .map_err(|e| CliError::Usage(e.to_string()))?;
        let mut input = stdin;
        let mut out = Vec::new();
        run(&fx.fs, cli.command, &mut input, &mut out)?;
        Ok(String::from_utf8(out).unwrap())
    }

    #[test]
    fn test_put_cat_ls() {
        let fx = fixture();
        exec(&fx, &["put", "メモ.txt", "hello"], b"").unwrap();
        exec(&fx, &["put", "-a", "メモ.txt"], b" world").unwrap();

        assert_eq!(exec(&fx, &["cat", "メモ.txt"], b"").unwrap(), "hello world");
        assert_eq!(exec(&fx, &["cat", "メモ.txt", "--offset", "6"], b"").unwrap(), "world");
        assert_eq!(exec(&fx, &["ls"], b"").unwrap(), ".\n..\nメモ.txt\n");
        assert_eq!(exec(&fx, &["exists", "メモ.txt"], b"").unwrap(), "true\n");
        assert!(exec(&fx, &["resolve", "メモ.txt"], b"").unwrap().starts_with("service\t"));
    }

    #[test]
    fn test_cp_mv_rm() {
        let fx = fixture();
        exec(&fx, &["put", "a.txt", "x"], b"").unwrap();

        assert_eq!(exec(&fx, &["cp", "a.txt", "ü.txt"], b"").unwrap(), "copied via service\n");
        assert_eq!(exec(&fx, &["mv", "ü.txt", "b.txt"], b"").unwrap(), "renamed via service\n");
        assert_eq!(exec(&fx, &["cp", "--native", "a.txt", "c.txt"], b"").unwrap(), "copied via native\n");

        exec(&fx, &["mkdir", "dir"], b"").unwrap();
        assert!(matches!(
            exec(&fx, &["mv", "a.txt", "dir"], b""),
            Err(CliError::AlreadyExists(_))
        ));
        assert!(matches!(exec(&fx, &["mv", "ghost", "z"], b""), Err(CliError::NotFound(_))));

        exec(&fx, &["rm", "b.txt"], b"").unwrap();
        assert_eq!(exec(&fx, &["exists", "b.txt"], b"").unwrap(), "false\n");
    }

    #[test]
    fn test_scandir_and_stat() {
        let fx = fixture();
        for name in ["b", "a"] {
            exec(&fx, &["touch", name, "--mtime", "86400"], b"").unwrap();
        }

        assert_eq!(exec(&fx, &["scandir", "--desc"], b"").unwrap(), "b\na\n..\n.\n");

        let stat = exec(&fx, &["stat", "a"], b"").unwrap();
        assert!(stat.contains("type:  file"));
        assert!(stat.contains("mtime: 1970-01-02T00:00:00+00:00"));

        assert!(matches!(exec(&fx, &["stat", "none"], b""), Err(CliError::Io(_))));
    }

    #[test]
    fn test_mkdir_mode_and_rmdir() {
        let fx = fixture();
        exec(&fx, &["mkdir", "-p", "-m", "755", "x/y"], b"").unwrap();
        assert_eq!(exec(&fx, &["exists", "x/y"], b"").unwrap(), "true\n");
        exec(&fx, &["rmdir", "x/y"], b"").unwrap();
        assert_eq!(exec(&fx, &["exists", "x/y"], b"").unwrap(), "false\n");

        assert!(matches!(exec(&fx, &["mkdir", "-m", "9", "z"], b""), Err(CliError::Usage(_))));
    }

    #[test]
    fn test_realpath_hide_ini() {
        let fx = fixture();
        exec(&fx, &["put", "設定.ini", "top = 1\n[main]\nlist[] = a\nlist[] = b\n"], b"").unwrap();

        assert_eq!(
            exec(&fx, &["realpath", "./設定.ini"], b"").unwrap(),
            format!("{}\n", fx.fs.normalize("設定.ini"))
        );
        assert!(matches!(exec(&fx, &["realpath", "ghost"], b""), Err(CliError::NotFound(_))));

        exec(&fx, &["hide", "設定.ini"], b"").unwrap();
        assert!(fx.fs.is_hidden("設定.ini").unwrap());

        assert_eq!(
            exec(&fx, &["ini", "-s", "設定.ini"], b"").unwrap(),
            "top = 1\n[main]\nlist[0] = a\nlist[1] = b\n"
        );
    }

    #[test]
    fn test_cat_lines() {
        let fx = fixture();
        exec(&fx, &["put", "行.txt"], b"one\r\n\r\ntwo").unwrap();
        assert_eq!(exec(&fx, &["cat", "--lines", "行.txt"], b"").unwrap(), "one\ntwo\n");
    }
}
