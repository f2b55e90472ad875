use std::path::PathBuf;
use std::process::{Child, Command, Output, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use std::time::{Duration, Instant};

const TIMEOUT: Duration = Duration::from_secs(20);

static NEXT: AtomicUsize = AtomicUsize::new(0);

fn unique_channel(tag: &str) -> String {
    let n = NEXT.fetch_add(1, Ordering::Relaxed);
    format!("fbarc_it_{}_{}_{}", tag, std::process::id(), n)
}

fn spawn_supervisor(channel: &str, args: &[&str]) -> Child {
    Command::new(env!("CARGO_BIN_EXE_supervisor"))
        .args(args)
        .arg("--channel")
        .arg(channel)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute supervisor")
}

fn spawn_generator(channel: &str, edges: &[&str], seed: u64) -> Child {
    Command::new(env!("CARGO_BIN_EXE_generator"))
        .arg("--channel")
        .arg(channel)
        .arg("--seed")
        .arg(seed.to_string())
        .arg("--")
        .args(edges)
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to execute generator")
}

/// The lock semaphore is created last, so once it exists generators can attach.
fn wait_for_channel(channel: &str) {
    let path = PathBuf::from(format!("/dev/shm/sem.{}_lock", channel));
    let start = Instant::now();
    while !path.exists() {
        assert!(start.elapsed() < TIMEOUT, "supervisor never created {}", path.display());
        thread::sleep(Duration::from_millis(10));
    }
}

fn wait_with_timeout(mut child: Child, what: &str) -> Output {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return child.wait_with_output().unwrap(),
            Ok(None) if start.elapsed() < TIMEOUT => thread::sleep(Duration::from_millis(20)),
            Ok(None) => {
                let _ = child.kill();
                let output = child.wait_with_output().unwrap();
                panic!(
                    "{} did not exit in time\nstderr: {}",
                    what,
                    String::from_utf8_lossy(&output.stderr)
                );
            }
            Err(e) => panic!("waiting for {} failed: {}", what, e),
        }
    }
}

fn assert_success(output: &Output, what: &str) {
    if !output.status.success() {
        panic!(
            "{} failed with status: {:?}\nstderr: {}\nstdout: {}",
            what,
            output.status,
            String::from_utf8_lossy(&output.stderr),
            String::from_utf8_lossy(&output.stdout)
        );
    }
}

fn assert_channel_removed(channel: &str) {
    for name in ["shm", "free", "used", "lock"] {
        let shm = PathBuf::from(format!("/dev/shm/{}_{}", channel, name));
        let sem = PathBuf::from(format!("/dev/shm/sem.{}_{}", channel, name));
        assert!(!shm.exists(), "{} left behind", shm.display());
        assert!(!sem.exists(), "{} left behind", sem.display());
    }
}

fn run_scenario(channel: &str, supervisor_args: &[&str], edges: &[&str], generators: u64) -> String {
    let supervisor = spawn_supervisor(channel, supervisor_args);
    wait_for_channel(channel);

    let children: Vec<_> = (0..generators)
        .map(|seed| spawn_generator(channel, edges, seed))
        .collect();

    let output = wait_with_timeout(supervisor, "supervisor");
    assert_success(&output, "supervisor");

    for child in children {
        let output = wait_with_timeout(child, "generator");
        assert_success(&output, "generator");
    }

    assert_channel_removed(channel);
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn test_three_cycle_reports_one_edge() {
    let channel = unique_channel("cycle");
    let stdout = run_scenario(&channel, &["-n", "50"], &["0-1", "1-2", "2-0"], 2);

    assert!(
        stdout.contains("The graph might not be acyclic, best solution removes 1 edges."),
        "unexpected report: {}",
        stdout
    );
}

#[test]
fn test_acyclic_graph_is_reported() {
    let channel = unique_channel("acyclic");
    let stdout = run_scenario(&channel, &[], &["0-1", "1-2"], 1);

    assert_eq!(stdout.trim(), "the graph is acyclic!");
}

#[test]
fn test_zero_limit_reports_without_generators() {
    let channel = unique_channel("zero");
    let supervisor = spawn_supervisor(&channel, &["-n", "0"]);
    let output = wait_with_timeout(supervisor, "supervisor");

    assert_success(&output, "supervisor");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "no solution found yet");
    assert_channel_removed(&channel);
}

#[test]
fn test_sigterm_stops_waiting_supervisor() {
    let channel = unique_channel("sigterm");
    let supervisor = spawn_supervisor(&channel, &[]);
    wait_for_channel(&channel);

    // Handlers are installed before the channel exists; give the
    // supervisor time to block on the empty buffer
    thread::sleep(Duration::from_millis(200));
    terminate(&supervisor);

    let output = wait_with_timeout(supervisor, "supervisor");
    assert_success(&output, "supervisor");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "no solution found yet");
    assert_channel_removed(&channel);
}

#[test]
fn test_generator_rejects_malformed_edge() {
    let output = Command::new(env!("CARGO_BIN_EXE_generator"))
        .arg("--channel")
        .arg(unique_channel("malformed"))
        .args(["0-1", "1x2"])
        .output()
        .expect("Failed to execute generator");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("generator"), "missing program name: {}", stderr);
    assert!(stderr.contains("1x2"), "missing offending token: {}", stderr);
}

#[test]
fn test_generator_requires_edges() {
    let output = Command::new(env!("CARGO_BIN_EXE_generator"))
        .arg("--channel")
        .arg(unique_channel("noedges"))
        .output()
        .expect("Failed to execute generator");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("requires list of edges"));
}

#[test]
fn test_generator_without_supervisor_fails() {
    let output = Command::new(env!("CARGO_BIN_EXE_generator"))
        .arg("--channel")
        .arg(unique_channel("absent"))
        .args(["0-1", "1-0"])
        .output()
        .expect("Failed to execute generator");

    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("shm_open"));
}

#[test]
fn test_supervisor_rejects_duplicate_limit() {
    let output = Command::new(env!("CARGO_BIN_EXE_supervisor"))
        .args(["-n", "5", "-n", "6", "--channel"])
        .arg(unique_channel("dup"))
        .output()
        .expect("Failed to execute supervisor");

    assert!(!output.status.success());
    assert!(!output.stderr.is_empty());
}

fn terminate(child: &Child) {
    let rc = unsafe { libc::kill(child.id() as libc::pid_t, libc::SIGTERM) };
    assert_eq!(rc, 0);
}

#[test]
fn test_sigterm_releases_blocked_generators() {
    let channel = unique_channel("blocked");
    // The delay keeps the supervisor from consuming, so the two-slot
    // buffer fills and every generator blocks on admission
    let supervisor = spawn_supervisor(&channel, &["-w", "60", "--capacity", "2"]);
    wait_for_channel(&channel);

    let children: Vec<_> = (0..3)
        .map(|seed| spawn_generator(&channel, &["0-1", "1-2", "2-0"], seed))
        .collect();
    thread::sleep(Duration::from_millis(300));
    terminate(&supervisor);

    let output = wait_with_timeout(supervisor, "supervisor");
    assert_success(&output, "supervisor");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "no solution found yet");

    for child in children {
        let output = wait_with_timeout(child, "generator");
        assert_success(&output, "generator");
    }
    assert_channel_removed(&channel);
}

#[test]
fn test_largest_delay_is_accepted() {
    let channel = unique_channel("maxdelay");
    let supervisor = spawn_supervisor(&channel, &["-w", "18446744073709551615"]);
    wait_for_channel(&channel);
    thread::sleep(Duration::from_millis(200));
    terminate(&supervisor);

    let output = wait_with_timeout(supervisor, "supervisor");
    assert_success(&output, "supervisor");
    assert_eq!(String::from_utf8_lossy(&output.stdout).trim(), "no solution found yet");
    assert_channel_removed(&channel);
}
