//! Common test utilities and helpers

#![allow(dead_code)]

use ssh_actor::{CancellationToken, CommandResult, KeyMaterial, RemoteSession, SshActorError, SshResult};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

/// Get the fixtures directory path
pub fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

/// Get a specific fixture file path
pub fn fixture_path(relative_path: &str) -> PathBuf {
    fixtures_dir().join(relative_path)
}

/// Read fixture file content
pub fn read_fixture(relative_path: &str) -> String {
    std::fs::read_to_string(fixture_path(relative_path)).expect("Failed to read fixture file")
}

pub fn key_a(name: &str) -> KeyMaterial {
    KeyMaterial::new(name, read_fixture("rsa_2048_a.pem")).expect("fixture key A")
}

pub fn key_b(name: &str) -> KeyMaterial {
    KeyMaterial::new(name, read_fixture("rsa_2048_b.pem")).expect("fixture key B")
}

/// Recorded `ssh-keygen -y` output for `rsa_2048_a.pem`
pub const KEY_A_BLOB: &str = "AAAAB3NzaC1yc2EAAAADAQABAAABAQDtQk/Rjc3u5VDgsdGw3U8aqY4D7bhcjizC3aQnadadGzBywq7nUBwBfHD0kTq4BawQ6T/fuM805Bz2x3IcBOBVubzMEn0YCuD3s4PRubECH42aMdBEa60gXHWEjChsCthFp608JMhhzRKBF1AxwltSerDSTGkz1Peo+uHoQRUb/0rLcYLTr9kVuNbfPAKBLPiY1c/SEW0lyRajz4ZIe2Lri1lLqTRkoRWk5dozOxm0kgySFyTgGMKnvVbecQUPPZOFyrG50ezJaFyDM6Y8HjHVfQgSQiY8oGtGzhgspPdXCuYqvXND4UhRXQagnrl/FDVYU/hmIp4SO1mEPybF8VQP";

/// Recorded `ssh-keygen -y` output for `rsa_2048_b.pem`
pub const KEY_B_BLOB: &str = "AAAAB3NzaC1yc2EAAAADAQABAAABAQDFP0vKmyZwxdBxNRCIVCe5bRlv9Lo/z/+gh5qhzEQMU7BD/8LXV+zXlpMIkzaJhvjIdZsTOdLOf86BRYFn9l7s6fXYT/nMzDYH0s80RG4iFIRZXSb3APNSTJDmAqazmJC2plKL6ViNPkHQpScnwM1SBptlxFA0x9ApSInyEaViYWu9CHalas7QmJq/xTWtolm3JXVcvg1Sf8+Z3D8yRIj9ewaESi1reTf/qn49VlNWq1tYYtmU344OFumTDlRC4vAeCY97XReqA+z14xFS9HifzbJLnimr1K+Z247Q/+NAu6YX8FgQwuYzKB/IOEN+MvObL7ob/6cF6sioM3iCUGxP";

const APPEND_PREFIX: &str = "echo \"";
const APPEND_SUFFIX: &str = "\" >> ~/.ssh/authorized_keys";

/// Shared view into a [`FakeSession`], kept by the test after the session has
/// moved onto the actor's worker.
#[derive(Clone, Default)]
pub struct SessionProbe {
    commands: Arc<Mutex<Vec<String>>>,
    connects: Arc<AtomicUsize>,
    disconnects: Arc<AtomicUsize>,
    overlaps: Arc<AtomicUsize>,
    busy: Arc<AtomicBool>,
    dropped: Arc<AtomicBool>,
    released: Arc<AtomicBool>,
    fail_reads: Arc<AtomicBool>,
    /// `None` means the file does not exist
    authorized_keys: Arc<Mutex<Option<String>>>,
    fail_append_for: Arc<Mutex<Option<String>>>,
}

impl SessionProbe {
    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    pub fn appends(&self) -> Vec<String> {
        self.commands()
            .into_iter()
            .filter(|c| c.starts_with(APPEND_PREFIX))
            .collect()
    }

    pub fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }

    /// Number of times a call started while another was still running
    pub fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    pub fn session_dropped(&self) -> bool {
        self.dropped.load(Ordering::SeqCst)
    }

    /// Let every `block` command return
    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
    }

    pub fn fail_reads(&self) {
        self.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_append_for(&self, name: &str) {
        *self.fail_append_for.lock().unwrap() = Some(name.to_string());
    }

    pub fn set_authorized_keys(&self, content: Option<&str>) {
        *self.authorized_keys.lock().unwrap() = content.map(str::to_string);
    }

    pub fn authorized_keys(&self) -> Option<String> {
        self.authorized_keys.lock().unwrap().clone()
    }

    /// Poll until `command` has been started by the session
    pub async fn wait_for_command(&self, command: &str) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !self.commands().iter().any(|c| c == command) {
            assert!(Instant::now() < deadline, "command {:?} never started", command);
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    }
}

struct BusyGuard<'a>(&'a AtomicBool);

impl Drop for BusyGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Scripted session. Commands understood:
///
/// - `cat ~/.ssh/authorized_keys` / `echo "..." >> ~/.ssh/authorized_keys`
///   operate on the probe's in-memory file
/// - `block` waits until released or canceled
/// - `sleep <ms>`, `exit <code>`, `fail`, `panic`
/// - anything else echoes itself on stdout
pub struct FakeSession {
    probe: SessionProbe,
    fail_connect: bool,
}

impl FakeSession {
    pub fn new() -> (Self, SessionProbe) {
        let probe = SessionProbe::default();
        (
            Self {
                probe: probe.clone(),
                fail_connect: false,
            },
            probe,
        )
    }

    pub fn failing_connect() -> (Self, SessionProbe) {
        let (mut session, probe) = Self::new();
        session.fail_connect = true;
        (session, probe)
    }

    fn dispatch(&self, command: &str, cancel: &CancellationToken) -> SshResult<CommandResult> {
        if command == "cat ~/.ssh/authorized_keys" {
            if self.probe.fail_reads.load(Ordering::SeqCst) {
                return Err(SshActorError::CommandFailed {
                    message: "channel open failed".to_string(),
                });
            }
            return Ok(match self.probe.authorized_keys() {
                Some(content) => CommandResult::new(0, content, ""),
                None => CommandResult::new(
                    1,
                    "",
                    "cat: /home/deploy/.ssh/authorized_keys: No such file or directory",
                ),
            });
        }

        if let Some(line) = command
            .strip_prefix(APPEND_PREFIX)
            .and_then(|rest| rest.strip_suffix(APPEND_SUFFIX))
        {
            let failing = self.probe.fail_append_for.lock().unwrap().clone();
            if let Some(name) = failing {
                if line.ends_with(&format!(" {}", name)) {
                    return Ok(CommandResult::new(1, "", "Permission denied"));
                }
            }
            let mut file = self.probe.authorized_keys.lock().unwrap();
            let content = file.get_or_insert_with(String::new);
            content.push_str(line);
            content.push('\n');
            return Ok(CommandResult::new(0, "", ""));
        }

        if command == "block" {
            let deadline = Instant::now() + Duration::from_secs(10);
            loop {
                if self.probe.released.load(Ordering::SeqCst) {
                    return Ok(CommandResult::new(0, "released", ""));
                }
                if cancel.is_cancelled() {
                    return Err(SshActorError::OperationCanceled);
                }
                if Instant::now() > deadline {
                    return Err(SshActorError::CommandFailed {
                        message: "block was never released".to_string(),
                    });
                }
                thread::sleep(Duration::from_millis(1));
            }
        }

        if let Some(ms) = command.strip_prefix("sleep ") {
            thread::sleep(Duration::from_millis(ms.parse().unwrap_or(1)));
            return Ok(CommandResult::new(0, "", ""));
        }

        if let Some(code) = command.strip_prefix("exit ") {
            return Ok(CommandResult::new(code.parse().unwrap_or(1), "", "exited"));
        }

        match command {
            "fail" => Err(SshActorError::CommandFailed {
                message: "channel closed".to_string(),
            }),
            "panic" => panic!("fake session panicked"),
            other => Ok(CommandResult::new(0, other, "")),
        }
    }
}

impl RemoteSession for FakeSession {
    fn connect(&mut self) -> SshResult<()> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect {
            return Err(SshActorError::ConnectionFailed {
                message: "authentication rejected".to_string(),
            });
        }
        Ok(())
    }

    fn execute(&mut self, command: &str, cancel: &CancellationToken) -> SshResult<CommandResult> {
        if self.probe.busy.swap(true, Ordering::SeqCst) {
            self.probe.overlaps.fetch_add(1, Ordering::SeqCst);
        }
        let _busy = BusyGuard(&self.probe.busy);

        self.probe.commands.lock().unwrap().push(command.to_string());
        self.dispatch(command, cancel)
    }

    fn disconnect(&mut self) -> SshResult<()> {
        self.probe.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn label(&self) -> String {
        "fake".to_string()
    }
}

impl Drop for FakeSession {
    fn drop(&mut self) {
        self.probe.dropped.store(true, Ordering::SeqCst);
    }
}
