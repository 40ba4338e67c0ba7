//! Integration tests for nix-cachefs

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use tempfile::TempDir;

    pub fn nix_cachefs(config_dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("nix-cachefs");
        cmd.env("NIX_CACHEFS_CONFIG", config_dir.path().join("config.toml"))
            .env_remove("RUST_LOG");
        cmd
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("Read-only virtual filesystem"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("nix-cachefs"));
    }

    #[test]
    fn config_path() {
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("config.toml"));
    }

    #[test]
    fn config_show() {
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[cache]"))
            .stdout(predicate::str::contains("https://cache.nixos.org"));
    }

    #[test]
    fn config_init_writes_file() {
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir).args(["config", "init"]).assert().success();
        assert!(dir.path().join("config.toml").is_file());

        nix_cachefs(&dir)
            .args(["config", "init"])
            .assert()
            .success()
            .stderr(predicate::str::contains("already exists"));
    }

    #[test]
    fn invalid_config_fails() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("config.toml"), "[cache\n").unwrap();
        nix_cachefs(&dir)
            .args(["config", "show"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn rust_log_overrides_verbosity() {
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Loaded configuration").not());

        nix_cachefs(&dir)
            .env("RUST_LOG", "nix_cachefs=debug")
            .args(["config", "path"])
            .assert()
            .success()
            .stderr(predicate::str::contains("Loaded configuration"));
    }

    #[test]
    fn mirror_after_subcommand_is_rejected() {
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["store-dir", "--mirror", "https://cache.example.org"])
            .assert()
            .failure();
    }

    #[test]
    fn invalid_mirror_fails() {
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["--mirror", "not a url", "store-dir"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("invalid mirror URL"));
    }
}

/// Binary cache served from a loopback socket
mod server {
    use std::collections::HashMap;
    use std::io::{BufRead, BufReader, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::Arc;
    use std::thread;

    pub struct CacheServer {
        pub url: String,
    }

    impl CacheServer {
        pub fn start(routes: HashMap<String, Vec<u8>>) -> Self {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            let url = format!("http://{}", listener.local_addr().unwrap());
            let routes = Arc::new(routes);

            thread::spawn(move || {
                for stream in listener.incoming().flatten() {
                    let routes = Arc::clone(&routes);
                    thread::spawn(move || serve(stream, &routes));
                }
            });

            Self { url }
        }
    }

    fn serve(mut stream: TcpStream, routes: &HashMap<String, Vec<u8>>) {
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        if reader.read_line(&mut request_line).is_err() {
            return;
        }
        // drain headers
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) if line == "\r\n" || line == "\n" => break,
                Ok(_) => {}
            }
        }

        let path = request_line.split_whitespace().nth(1).unwrap_or("/");
        let response = match routes.get(path) {
            Some(body) => {
                let mut out = format!(
                    "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                )
                .into_bytes();
                out.extend_from_slice(body);
                out
            }
            None => b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
                .to_vec(),
        };
        let _ = stream.write_all(&response);
    }

    /// A port nothing listens on
    pub fn dead_url() -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{}", addr)
    }
}

/// Minimal NAR writer
mod nar {
    pub enum Node<'a> {
        File(&'a [u8], bool),
        Dir(Vec<(&'a str, Node<'a>)>),
    }

    fn string(out: &mut Vec<u8>, s: &[u8]) {
        out.extend_from_slice(&(s.len() as u64).to_le_bytes());
        out.extend_from_slice(s);
        out.resize(out.len() + (8 - s.len() % 8) % 8, 0);
    }

    fn node(out: &mut Vec<u8>, n: &Node) {
        string(out, b"(");
        string(out, b"type");
        match n {
            Node::File(contents, executable) => {
                string(out, b"regular");
                if *executable {
                    string(out, b"executable");
                    string(out, b"");
                }
                string(out, b"contents");
                string(out, contents);
            }
            Node::Dir(entries) => {
                string(out, b"directory");
                // entries must be given sorted by name
                for (name, child) in entries {
                    string(out, b"entry");
                    string(out, b"(");
                    string(out, b"name");
                    string(out, name.as_bytes());
                    string(out, b"node");
                    node(out, child);
                    string(out, b")");
                }
            }
        }
        string(out, b")");
    }

    pub fn encode(root: &Node) -> Vec<u8> {
        let mut out = Vec::new();
        string(&mut out, b"nix-archive-1");
        node(&mut out, root);
        out
    }
}

mod end_to_end {
    use super::cli_tests::nix_cachefs;
    use super::nar::{self, Node};
    use super::server::{dead_url, CacheServer};
    use flate2::write::GzEncoder;
    use predicates::prelude::*;
    use sha2::{Digest, Sha256};
    use std::collections::HashMap;
    use std::io::Write;
    use tempfile::TempDir;

    const README: &[u8] = b"GNU Hello: the friendliest greeting program.\n";
    const HELLO: &[u8] = b"#!/bin/sh\necho 'Hello, world!'\n";
    const STORE_PATH: &str = "/nix/store/0c2d4fa1hello-2.12";

    fn routes() -> HashMap<String, Vec<u8>> {
        let tree = Node::Dir(vec![
            ("bin", Node::Dir(vec![("hello", Node::File(HELLO, true))])),
            (
                "share",
                Node::Dir(vec![("doc", Node::Dir(vec![("README", Node::File(README, false))]))]),
            ),
        ]);
        let mut gz = GzEncoder::new(Vec::new(), flate2::Compression::default());
        gz.write_all(&nar::encode(&tree)).unwrap();
        let blob = gz.finish().unwrap();

        let narinfo = format!(
            "StorePath: {}\nURL: nar/hello.nar.gz\nCompression: gzip\nFileSize: {}\nNarHash: sha256:0000\nNarSize: 512\nReferences: \nSig: test-1:AAAA\n",
            STORE_PATH,
            blob.len()
        );

        HashMap::from([
            ("/nix-cache-info".to_string(), b"StoreDir: /nix/store\nWantMassQuery: 1\n".to_vec()),
            ("/0c2d4fa1hello.narinfo".to_string(), narinfo.into_bytes()),
            ("/nar/hello.nar.gz".to_string(), blob),
        ])
    }

    #[test]
    fn store_dir_is_discovered() {
        let server = CacheServer::start(routes());
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["--mirror", &server.url, "store-dir"])
            .assert()
            .success()
            .stdout("/nix/store\n");
    }

    #[test]
    fn cat_streams_file_contents() {
        let server = CacheServer::start(routes());
        let dir = TempDir::new().unwrap();
        let output = nix_cachefs(&dir)
            .args(["--mirror", &server.url, "cat"])
            .arg(format!("{}/share/doc/README", STORE_PATH))
            .output()
            .unwrap();

        assert!(output.status.success());
        assert_eq!(Sha256::digest(&output.stdout), Sha256::digest(README));
    }

    #[test]
    fn hash_matches_local_digest() {
        let server = CacheServer::start(routes());
        let dir = TempDir::new().unwrap();
        let expected = hex::encode(Sha256::digest(HELLO));
        nix_cachefs(&dir)
            .args(["--mirror", &server.url, "hash"])
            .arg(format!("{}/bin/hello", STORE_PATH))
            .assert()
            .success()
            .stdout(predicate::str::starts_with(expected));
    }

    #[test]
    fn dead_first_mirror_falls_back() {
        let server = CacheServer::start(routes());
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["--mirror", &dead_url(), "--mirror", &server.url, "cat"])
            .arg(format!("{}/bin/hello", STORE_PATH))
            .assert()
            .success()
            .stdout(HELLO);
    }

    #[test]
    fn ls_long_lists_entries() {
        let server = CacheServer::start(routes());
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["--mirror", &server.url, "ls", "--long", STORE_PATH])
            .assert()
            .success()
            .stdout(predicate::str::contains("dr-xr-xr-x"))
            .stdout(predicate::str::contains("bin"))
            .stdout(predicate::str::contains("share"));
    }

    #[test]
    fn stat_json() {
        let server = CacheServer::start(routes());
        let dir = TempDir::new().unwrap();
        let output = nix_cachefs(&dir)
            .args(["--mirror", &server.url, "stat", "--json"])
            .arg(format!("{}/bin/hello", STORE_PATH))
            .output()
            .unwrap();
        assert!(output.status.success());

        let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(info["name"], "hello");
        assert_eq!(info["kind"], "file");
        assert_eq!(info["size"], HELLO.len());
        assert_eq!(info["mode"], 0o555);
    }

    #[test]
    fn narinfo_json_names_origin() {
        let server = CacheServer::start(routes());
        let dir = TempDir::new().unwrap();
        let output = nix_cachefs(&dir)
            .args(["--mirror", &server.url, "narinfo", "--json", STORE_PATH])
            .output()
            .unwrap();
        assert!(output.status.success());

        let info: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(info["store_path"], STORE_PATH);
        assert_eq!(info["compression"], "gzip");
        assert_eq!(info["mirror"], format!("{}/", server.url));
    }

    #[test]
    fn readdir_on_file_fails() {
        let server = CacheServer::start(routes());
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["--mirror", &server.url, "ls"])
            .arg(format!("{}/bin/hello", STORE_PATH))
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not a directory"));
    }

    #[test]
    fn unknown_store_path_fails() {
        let server = CacheServer::start(routes());
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["--mirror", &server.url, "cat", "/nix/store/zzzz-missing/file"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("No mirror provided metadata"));
    }

    #[test]
    fn short_path_is_invalid() {
        let server = CacheServer::start(routes());
        let dir = TempDir::new().unwrap();
        nix_cachefs(&dir)
            .args(["--mirror", &server.url, "stat", "/nix/store"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid path"));
    }
}
