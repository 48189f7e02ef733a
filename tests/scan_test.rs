mod common;

use common::MockRunner;
use rummage::image::{FindOptions, Globs, ImageFs, DEFAULT_IGNORED_ERRORS};
use rummage::Error;

fn strings(v: &[&str]) -> Vec<String> {
    v.iter().map(|s| s.to_string()).collect()
}

fn node_globs() -> Globs {
    Globs {
        manifest_globs: strings(&["**/package.json", "**/package-lock.json"]),
        binary_globs: strings(&["**/bin/node", "**/lib/*.so*"]),
    }
}

const ROOT_LISTING: &str = "\
total 64
drwxr-xr-x    1 0        0             4096 Mar  4 10:20 .
drwxr-xr-x    1 0        0             4096 Mar  4 10:20 ..
drwxr-xr-x    2 0        0             4096 Mar  4 10:20 app
lrwxrwxrwx    1 0        0                7 Jan 26  2024 bin -> usr/bin
drwxr-xr-x    5 0        0              340 Mar  4 10:20 dev
-rwxr-xr-x    1 0        0                0 Mar  4 10:20 .dockerenv
dr-xr-xr-x  180 0        0                0 Mar  4 10:20 proc
dr-xr-xr-x   13 0        0                0 Mar  4 10:20 sys
drwxr-xr-x    1 0        0             4096 Jan 26  2024 usr
";

const APP_LISTING: &str = "\
/app:
total 16
drwxr-xr-x 2 0 0 4096 .
drwxr-xr-x 1 0 0 4096 ..
-rw-r--r-- 1 0 0  120 package.json
-rw-r--r-- 1 0 0 9000 package-lock.json
-rw-r--r-- 1 0 0  310 index.js
";

const USR_LISTING: &str = "\
/usr:
drwxr-xr-x 1 0 0 4096 .
drwxr-xr-x 1 0 0 4096 ..
drwxr-xr-x 2 0 0 4096 bin
drwxr-xr-x 3 0 0 4096 lib

/usr/bin:
drwxr-xr-x 2 0 0 4096 .
drwxr-xr-x 1 0 0 4096 ..
-rwxr-xr-x 1 0 0 90000000 node
-rwxr-xr-x 1 0 0 1000 env

/usr/lib:
drwxr-xr-x 3 0 0 4096 .
drwxr-xr-x 1 0 0 4096 ..
-rwxr-xr-x 1 0 0 2000000 libc.so.6
drwxr-xr-x 3 0 0 4096 node_modules

/usr/lib/node_modules:
drwxr-xr-x 3 0 0 4096 npm

/usr/lib/node_modules/npm:
-rw-r--r-- 1 0 0 4000 package.json
";

fn alpine_node() -> MockRunner {
    MockRunner::new()
        .on("ls -lan /", ROOT_LISTING)
        .on("ls -lanR /app", APP_LISTING)
        .on("ls -lanR /usr", USR_LISTING)
}

#[tokio::test]
async fn finds_manifest_in_scoped_path() {
    let runner = MockRunner::new().on(
        "ls -lanR /app/",
        "drwxr-xr-x 2 0 0 4096 . \n-rw-r--r-- 1 0 0 120 package.json",
    );
    let fs = ImageFs::new(runner);
    let globs = Globs {
        manifest_globs: strings(&["**/package.json"]),
        binary_globs: Vec::new(),
    };
    let options = FindOptions {
        path: "/app".into(),
        ..Default::default()
    };

    let result = fs.find_globs(&globs, &options).await.unwrap();
    assert_eq!(result.manifest_files, vec!["/app/package.json"]);
    assert!(result.binary_files.is_empty());
    assert_eq!(fs.runner().calls(), vec!["ls -lanR /app/"]);
}

#[tokio::test]
async fn non_recursive_scan_lists_once() {
    let runner = MockRunner::new().on("ls -lan /app/", APP_LISTING);
    let fs = ImageFs::new(runner);
    let options = FindOptions {
        path: "/app".into(),
        recursive: false,
        ..Default::default()
    };

    let result = fs.find_globs(&node_globs(), &options).await.unwrap();
    assert_eq!(
        result.manifest_files,
        vec!["/app/package.json", "/app/package-lock.json"]
    );
    assert_eq!(fs.runner().calls(), vec!["ls -lan /app/"]);
}

#[tokio::test]
async fn scoped_scan_follows_symlinked_directory() {
    let runner = MockRunner::new().on(
        "ls -lanR /bin/",
        "\
/bin/:
drwxr-xr-x 2 0 0 4096 .
drwxr-xr-x 1 0 0 4096 ..
-rwxr-xr-x 1 0 0 90000000 node
drwxr-xr-x 2 0 0 4096 lib

/bin/lib:
-rwxr-xr-x 1 0 0 1000 libz.so.1
",
    );
    let fs = ImageFs::new(runner);
    let options = FindOptions {
        path: "/bin".into(),
        ..Default::default()
    };

    let result = fs.find_globs(&node_globs(), &options).await.unwrap();
    assert_eq!(result.binary_files, vec!["/bin/node", "/bin/lib/libz.so.1"]);
    assert_eq!(fs.runner().calls(), vec!["ls -lanR /bin/"]);
}

/// `/app` with `dirs` sub-directories of `per_dir` json files each, plus one
/// non-matching file per directory.
fn large_listing(dirs: usize, per_dir: usize) -> String {
    let mut out = String::from("/app:\n");
    for d in 0..dirs {
        out.push_str(&format!("drwxr-xr-x 2 0 0 4096 d{d}\n"));
    }
    for d in 0..dirs {
        out.push_str(&format!("\n/app/d{d}:\n"));
        for f in 0..per_dir {
            out.push_str(&format!("-rw-r--r-- 1 0 0 10 f{f}.json\n"));
        }
        out.push_str("-rw-r--r-- 1 0 0 10 README\n");
    }
    out
}

#[tokio::test]
async fn large_listing_classifies_every_file_once() {
    let (dirs, per_dir) = (5, 600);
    let fs = ImageFs::new(MockRunner::new().on("ls -lanR /app/", &large_listing(dirs, per_dir)));
    let globs = Globs {
        manifest_globs: strings(&["**/*.json"]),
        binary_globs: Vec::new(),
    };
    let options = FindOptions {
        path: "/app".into(),
        ..Default::default()
    };

    let result = fs.find_globs(&globs, &options).await.unwrap();
    assert_eq!(result.manifest_files.len(), dirs * per_dir);
    assert!(result.binary_files.is_empty());

    let mut unique = result.manifest_files.clone();
    unique.sort();
    unique.dedup();
    assert_eq!(unique.len(), dirs * per_dir);

    assert_eq!(result.manifest_files[0], "/app/d0/f0.json");
    assert_eq!(result.manifest_files[per_dir], "/app/d1/f0.json");
    assert_eq!(
        result.manifest_files.last().map(String::as_str),
        Some("/app/d4/f599.json")
    );
}

#[tokio::test]
async fn root_scan_stitches_top_level_directories() {
    let fs = ImageFs::new(alpine_node());
    let result = fs
        .find_globs(&node_globs(), &FindOptions::default())
        .await
        .unwrap();

    assert_eq!(
        result.manifest_files,
        vec![
            "/app/package.json",
            "/app/package-lock.json",
            "/usr/lib/node_modules/npm/package.json"
        ]
    );
    assert_eq!(result.binary_files, vec!["/usr/bin/node", "/usr/lib/libc.so.6"]);
}

#[tokio::test]
async fn root_scan_never_lists_excluded_directories() {
    let fs = ImageFs::new(alpine_node());
    fs.find_globs(&node_globs(), &FindOptions::default())
        .await
        .unwrap();

    let calls = fs.runner().calls();
    assert_eq!(calls[0], "ls -lan /");
    for dir in ["/proc", "/sys", "/dev"] {
        assert!(
            !calls.iter().any(|c| c.ends_with(dir)),
            "{dir} was listed: {calls:?}"
        );
    }
    // symlinked /bin is not followed
    assert!(!calls.iter().any(|c| c.ends_with("/bin")));
    assert_eq!(calls.len(), 3);
}

#[tokio::test]
async fn custom_excluded_root_dirs_replace_defaults() {
    let fs = ImageFs::new(alpine_node());
    let options = FindOptions {
        excluded_root_dirs: strings(&["usr", "proc", "sys", "dev"]),
        ..Default::default()
    };
    let result = fs.find_globs(&node_globs(), &options).await.unwrap();

    assert!(result.binary_files.is_empty());
    assert!(!fs.runner().calls().contains(&"ls -lanR /usr".to_string()));
}

#[tokio::test]
async fn exclusion_wins_over_inclusion() {
    let fs = ImageFs::new(alpine_node());
    let options = FindOptions {
        exclusion_globs: strings(&["**/node_modules/**", "/usr/bin/*"]),
        ..Default::default()
    };
    let result = fs.find_globs(&node_globs(), &options).await.unwrap();

    assert_eq!(
        result.manifest_files,
        vec!["/app/package.json", "/app/package-lock.json"]
    );
    assert_eq!(result.binary_files, vec!["/usr/lib/libc.so.6"]);
}

#[tokio::test]
async fn a_path_lands_in_one_list_only() {
    let fs = ImageFs::new(alpine_node());
    let globs = Globs {
        manifest_globs: strings(&["**/node", "**/*.json"]),
        binary_globs: strings(&["**/node", "**/*.json", "**/env"]),
    };
    let result = fs.find_globs(&globs, &FindOptions::default()).await.unwrap();

    assert!(result.manifest_files.contains(&"/usr/bin/node".to_string()));
    assert_eq!(result.binary_files, vec!["/usr/bin/env"]);
    for path in &result.manifest_files {
        assert!(!result.binary_files.contains(path));
    }
}

#[tokio::test]
async fn repeated_scans_are_identical() {
    let fs = ImageFs::new(alpine_node());
    let first = fs
        .find_globs(&node_globs(), &FindOptions::default())
        .await
        .unwrap();
    let second = fs
        .find_globs(&node_globs(), &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn empty_image_gives_empty_result() {
    let fs = ImageFs::new(MockRunner::new().on("ls -lan /", ""));
    let result = fs
        .find_globs(&node_globs(), &FindOptions::default())
        .await
        .unwrap();
    assert!(result.manifest_files.is_empty());
    assert!(result.binary_files.is_empty());
}

#[tokio::test]
async fn missing_scan_path_is_not_an_error() {
    // unknown commands answer "No such file or directory"
    let fs = ImageFs::new(MockRunner::new());
    let options = FindOptions {
        path: "/does/not/exist".into(),
        ..Default::default()
    };
    let result = fs.find_globs(&node_globs(), &options).await.unwrap();
    assert!(result.manifest_files.is_empty());
}

#[tokio::test]
async fn unreadable_subtree_keeps_partial_listing() {
    let runner = MockRunner::new().on("ls -lan /", ROOT_LISTING).fail(
        "ls -lanR /app",
        1,
        APP_LISTING,
        "ls: /app/secret: Permission denied",
    );
    let fs = ImageFs::new(runner);
    let result = fs
        .find_globs(&node_globs(), &FindOptions::default())
        .await
        .unwrap();
    assert_eq!(
        result.manifest_files,
        vec!["/app/package.json", "/app/package-lock.json"]
    );
}

#[tokio::test]
async fn failing_top_level_directory_does_not_abort_scan() {
    let runner = MockRunner::new()
        .on("ls -lan /", ROOT_LISTING)
        .fail("ls -lanR /app", 125, "", "Error response from daemon: oci runtime error")
        .on("ls -lanR /usr", USR_LISTING);
    let fs = ImageFs::new(runner);
    let result = fs
        .find_globs(&node_globs(), &FindOptions::default())
        .await
        .unwrap();

    assert_eq!(
        result.manifest_files,
        vec!["/usr/lib/node_modules/npm/package.json"]
    );
    assert_eq!(result.binary_files.len(), 2);
}

#[tokio::test]
async fn failing_root_listing_is_an_error() {
    let runner = MockRunner::new().fail("ls -lan /", 125, "", "Unable to find image 'nope:latest'");
    let fs = ImageFs::new(runner);
    let err = fs
        .find_globs(&node_globs(), &FindOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::CommandFailed { exit_code: 125, .. }));
}

#[tokio::test]
async fn ls_safe_tolerates_permission_denied() {
    let runner = MockRunner::new().fail(
        "ls -lanR /proc/1",
        1,
        "-r--r--r-- 1 0 0 0 cmdline\n",
        "ls: /proc/1/fd: Permission denied",
    );
    let fs = ImageFs::new(runner);

    let out = fs.ls_safe("/proc/1", true).await.unwrap();
    assert_eq!(out.stdout, "-r--r--r-- 1 0 0 0 cmdline\n");
    assert_eq!(out.stderr, "ls: /proc/1/fd: Permission denied");

    assert!(fs.ls("/proc/1", true).await.is_err());
    let strict = fs
        .exec_safe(
            "ls",
            &strings(&["-lanR", "/proc/1"]),
            DEFAULT_IGNORED_ERRORS,
        )
        .await;
    assert!(strict.is_err());
}

#[tokio::test]
async fn exec_safe_only_downgrades_listed_errors() {
    let runner = MockRunner::new().fail("stat /x", 1, "", "stat: can't stat '/x': File not found");
    let fs = ImageFs::new(runner);

    let out = fs
        .exec_safe("stat", &strings(&["/x"]), DEFAULT_IGNORED_ERRORS)
        .await
        .unwrap();
    assert!(out.stdout.is_empty());

    let err = fs
        .exec_safe("stat", &strings(&["/x"]), &["permission denied"])
        .await
        .unwrap_err();
    assert_eq!(err.stderr(), Some("stat: can't stat '/x': File not found"));
}

#[tokio::test]
async fn cat_safe_reads_or_returns_empty() {
    let runner = MockRunner::new().on("cat /etc/os-release", "ID=alpine\n");
    let fs = ImageFs::new(runner);

    assert_eq!(fs.cat_safe("/etc/os-release").await.unwrap(), "ID=alpine\n");
    assert_eq!(fs.cat_safe("/etc/missing").await.unwrap(), "");
}
