use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

const ZERO_SHA: &str = "0000000000000000000000000000000000000000";

/// Helper to run git commands in a directory
fn git_command(dir: &Path, args: &[&str]) -> Output {
    Command::new("git")
        .current_dir(dir)
        .args(args)
        .output()
        .expect("Failed to run git command")
}

/// Create a test repository with commits
fn create_test_repo(dir: &Path) -> PathBuf {
    let repo_dir = dir.join("test-repo");
    std::fs::create_dir(&repo_dir).expect("Failed to create repo dir");

    git_command(&repo_dir, &["init", "-q"]);
    git_command(&repo_dir, &["config", "user.name", "Test User"]);
    git_command(&repo_dir, &["config", "user.email", "test@example.com"]);

    std::fs::write(repo_dir.join("file1.txt"), "content 1").unwrap();
    git_command(&repo_dir, &["add", "."]);
    git_command(&repo_dir, &["commit", "-q", "-m", "Initial commit"]);

    std::fs::write(repo_dir.join("file2.txt"), "content 2").unwrap();
    git_command(&repo_dir, &["add", "."]);
    git_command(&repo_dir, &["commit", "-q", "-m", "Second commit"]);

    repo_dir
}

fn head_sha(repo: &Path) -> String {
    let output = git_command(repo, &["rev-parse", "HEAD"]);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Pack every object reachable from `sha`
fn pack_objects(repo: &Path, sha: &str) -> Vec<u8> {
    let mut child = Command::new("git")
        .current_dir(repo)
        .args(["pack-objects", "--revs", "--stdout", "-q"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .expect("Failed to spawn git pack-objects");
    writeln!(child.stdin.as_mut().unwrap(), "{}", sha).unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success(), "git pack-objects failed");
    output.stdout
}

/// Run the helper with `input` on stdin, isolated from the caller's config
fn run_helper(cwd: &Path, home: &Path, args: &[&str], input: &[u8]) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_git-remote-relay"))
        .current_dir(cwd)
        .args(args)
        .env("HOME", home)
        .env_remove("GIT_REMOTE_RELAY_TOKEN")
        .env_remove("RELAY_TOKEN")
        .env_remove("RELAY_ACCESS_TOKEN")
        .env_remove("SUPABASE_URL")
        .env_remove("SUPABASE_SERVICE_ROLE_KEY")
        .env_remove("SUPABASE_SERVICE_KEY")
        .env_remove("RELAY_PUSH_TRANSPORT")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("Failed to spawn git-remote-relay");
    child.stdin.take().unwrap().write_all(input).unwrap();
    child.wait_with_output().unwrap()
}

#[test]
fn test_capabilities_and_unresolved_list() {
    let temp = TempDir::new().unwrap();
    let output = run_helper(
        temp.path(),
        temp.path(),
        &["origin"],
        b"capabilities\nlist\n\n",
    );

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        format!("fetch\npush\noption\nlist\n\n{} refs/heads/main\n\n", ZERO_SHA)
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_list_from_remote() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/functions/v1/git/orgs/acme/repos/infra/refs"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "refs": [{"name": "refs/heads/main", "target_sha": "deadbeef", "updated_at": "2024-01-01T00:00:00Z"}],
            "head": {"target": "refs/heads/main"}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let url = format!("relay::{}/functions/v1/git/orgs/acme/repos/infra", server.uri());
    let output = run_helper(temp.path(), temp.path(), &["origin", &url], b"list\n\n");

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "@refs/heads/main HEAD\ndeadbeef refs/heads/main\n\n"
    );
}

#[tokio::test(flavor = "multi_thread")]
async fn test_fetch_indexes_pack_into_repo() {
    let temp = TempDir::new().unwrap();
    let source = create_test_repo(temp.path());
    let sha = head_sha(&source);
    let pack = pack_objects(&source, &sha);

    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orgs/acme/repos/infra/git/fetch"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "application/x-git-packfile")
                .set_body_bytes(pack),
        )
        .expect(1)
        .mount(&server)
        .await;

    let target = temp.path().join("target-repo");
    std::fs::create_dir(&target).unwrap();
    git_command(&target, &["init", "-q"]);

    let url = format!("relay::{}/orgs/acme/repos/infra", server.uri());
    let input = format!("fetch {} refs/heads/main\nfetch {} HEAD\n\n\n", sha, sha);
    let output = run_helper(&target, temp.path(), &["origin", &url], input.as_bytes());

    if !output.status.success() {
        eprintln!("helper stderr: {}", String::from_utf8_lossy(&output.stderr));
    }
    assert!(output.status.success());
    assert_eq!(String::from_utf8_lossy(&output.stdout), "\n");

    let cat = git_command(&target, &["cat-file", "-t", &sha]);
    assert_eq!(String::from_utf8_lossy(&cat.stdout).trim(), "commit");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_push_uploads_trailing_pack() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orgs/acme/repos/infra/git/push"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "ok": true,
            "results": {"refs/heads/main": {"status": "ok"}}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let temp = TempDir::new().unwrap();
    let url = format!("relay::{}/orgs/acme/repos/infra", server.uri());
    let mut input = b"push +refs/heads/main:refs/heads/main\n\n".to_vec();
    input.extend_from_slice(b"PACK\x00\x00\x00\x02");
    let output = run_helper(temp.path(), temp.path(), &["origin", &url], &input);

    assert!(output.status.success());
    assert_eq!(
        String::from_utf8_lossy(&output.stdout),
        "ok refs/heads/main\n\n"
    );

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let body = &requests[0].body;
    assert!(body
        .windows(8)
        .any(|w| w == b"PACK\x00\x00\x00\x02"));
    assert!(String::from_utf8_lossy(body).contains("\"force\":true"));
}
