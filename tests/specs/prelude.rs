//! Shared helpers for daemon specs
//!
//! Specs run the `kld` binary from the target directory, so build the
//! workspace (`cargo build --workspace`) before `cargo test --test specs`.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::PathBuf;
use std::process::{Child, ExitStatus, Stdio};
use std::time::Duration;

pub use predicates::prelude::*;
pub use tempfile::TempDir;

/// How long a client waits for a reply before the spec fails
pub const REPLY_TIMEOUT: Duration = Duration::from_secs(5);

/// `kld` as a one-shot command
pub fn kld() -> assert_cmd::Command {
    let mut cmd = assert_cmd::Command::cargo_bin("kld").unwrap();
    clear_env(&mut cmd);
    cmd
}

fn clear_env(cmd: &mut assert_cmd::Command) {
    for name in [
        "KEYLOCK_LISTEN",
        "KEYLOCK_DEFAULT_EXPIRE_MS",
        "KEYLOCK_LOG_FILE",
        "KEYLOCK_PID_FILE",
    ] {
        cmd.env_remove(name);
    }
}

/// A running daemon on an ephemeral port, killed on drop
pub struct Daemon {
    child: Child,
    pub addr: SocketAddr,
    pub dir: TempDir,
}

impl Daemon {
    pub fn start() -> Self {
        Self::start_with(&[])
    }

    pub fn start_with(args: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        Self::start_in(dir, args)
    }

    pub fn start_in(dir: TempDir, args: &[&str]) -> Self {
        let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("kld"))
            .args(["--listen", "127.0.0.1:0"])
            .arg("--pid-file")
            .arg(dir.path().join("kld.pid"))
            .arg("--log-file")
            .arg(dir.path().join("kld.log"))
            .args(args)
            .env_remove("KEYLOCK_LISTEN")
            .env_remove("KEYLOCK_DEFAULT_EXPIRE_MS")
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .unwrap();

        let stdout = child.stdout.take().unwrap();
        let mut line = String::new();
        BufReader::new(stdout).read_line(&mut line).unwrap();
        let addr = line
            .trim()
            .strip_prefix("READY ")
            .unwrap_or_else(|| panic!("daemon did not report ready: {line:?}"))
            .parse()
            .unwrap();

        Self { child, addr, dir }
    }

    pub fn pid_file(&self) -> PathBuf {
        self.dir.path().join("kld.pid")
    }

    pub fn log(&self) -> String {
        std::fs::read_to_string(self.dir.path().join("kld.log")).unwrap_or_default()
    }

    pub fn pid(&self) -> u32 {
        self.child.id()
    }

    pub fn client(&self) -> Client {
        Client::connect(self.addr)
    }

    /// Send SIGTERM and wait for the process to exit
    pub fn terminate(&mut self) -> ExitStatus {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        let pid = i32::try_from(self.child.id()).unwrap();
        kill(Pid::from_raw(pid), Signal::SIGTERM).unwrap();
        self.child.wait().unwrap()
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// A line-protocol client
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl Client {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).unwrap();
        stream.set_read_timeout(Some(REPLY_TIMEOUT)).unwrap();
        Self {
            reader: BufReader::new(stream.try_clone().unwrap()),
            writer: stream,
        }
    }

    pub fn send(&mut self, line: &str) {
        writeln!(self.writer, "{line}").unwrap();
    }

    /// Next reply line, without the newline
    pub fn recv(&mut self) -> String {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).unwrap();
        assert!(n > 0, "connection closed while waiting for a reply");
        line.trim_end().to_string()
    }

    /// Send a line and return the reply it provokes
    pub fn request(&mut self, line: &str) -> String {
        self.send(line);
        self.recv()
    }

    /// True when nothing arrives within `period`
    pub fn is_silent_for(&mut self, period: Duration) -> bool {
        self.writer.set_read_timeout(Some(period)).unwrap();
        let mut line = String::new();
        let silent = match self.reader.read_line(&mut line) {
            Err(e) => matches!(e.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut),
            Ok(_) => false,
        };
        self.writer.set_read_timeout(Some(REPLY_TIMEOUT)).unwrap();
        silent
    }

    /// True when the daemon has closed the connection
    pub fn is_closed(&mut self) -> bool {
        let mut line = String::new();
        matches!(self.reader.read_line(&mut line), Ok(0))
    }
}

/// Poll until `check` holds or the reply timeout passes
pub fn wait_for(mut check: impl FnMut() -> bool) -> bool {
    let deadline = std::time::Instant::now() + REPLY_TIMEOUT;
    while std::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}
