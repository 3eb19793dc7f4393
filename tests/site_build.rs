//! End-to-end builds against a temporary site root.

use crunch::alias::AliasResolver;
use crunch::config::SiteConfig;
use crunch::imaging::RustBackend;
use crunch::site::Site;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use walkdir::WalkDir;

fn config() -> SiteConfig {
    let mut config = SiteConfig::default();
    config.site.title = "Blog".into();
    config.site.base_url = "https://blog.example/".into();
    config
}

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

fn post(root: &Path, rel: &str, title: &str, epoch: i64) {
    write(
        root,
        &format!("posts/{rel}"),
        &format!("title: \"{title}\"\ndate: {epoch}\n\nAbout {title}."),
    );
}

fn snapshot(dir: &Path) -> BTreeMap<PathBuf, Vec<u8>> {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            let rel = e.path().strip_prefix(dir).unwrap().to_path_buf();
            (rel, fs::read(e.path()).unwrap())
        })
        .collect()
}

fn occurrences(haystack: &str, needle: &str) -> usize {
    haystack.matches(needle).count()
}

#[test]
fn hello_and_world() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let mut config = config();
    config.build.home_count = 5;
    for (i, epoch) in [1_690_000_000, 1_692_000_000, 1_695_000_000, 1_699_000_000]
        .into_iter()
        .enumerate()
    {
        let ts = chrono::DateTime::from_timestamp(epoch, 0).unwrap();
        let rel = format!("{}/older-{i}.md", ts.format("%Y/%m"));
        post(root, &rel, &format!("Older {i}"), epoch);
    }
    post(root, "2023/11/hello.md", "Hello & World", 1_700_000_000);

    let site = Site::new(&config, root, Arc::new(AliasResolver::disabled()));
    let report = site.build_all(&RustBackend::new()).unwrap();
    assert!(report.is_clean());

    let build = root.join("build");
    assert!(build.join("2023/11/hello-and-world.htm").is_file());

    let month = fs::read_to_string(build.join("2023/11/index.htm")).unwrap();
    assert_eq!(occurrences(&month, "href=\"/2023/11/hello-and-world\""), 1);

    let home = fs::read_to_string(build.join("index.htm")).unwrap();
    let hello = home.find("/2023/11/hello-and-world").unwrap();
    for i in 0..4 {
        let older = home.find(&format!("Older {i}")).unwrap();
        assert!(hello < older, "Hello & World must lead the home page");
    }

    let feed = fs::read_to_string(build.join("index.xml")).unwrap();
    assert!(feed.contains("<link>https://blog.example/2023/11/hello-and-world</link>"));
}

#[test]
fn incremental_publish_equals_full_build() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let config = config();
    post(root, "2024/01/a.md", "A", 1_704_200_000);
    post(root, "2024/03/b.md", "B", 1_709_300_000);
    post(root, "2023/12/c.md", "C", 1_702_000_000);
    let site = Site::new(&config, root, Arc::new(AliasResolver::disabled()));
    site.build_all(&RustBackend::new()).unwrap();

    // A new post in an existing month with the same timestamp as B.
    post(root, "2024/03/d.md", "D", 1_709_300_000);
    let doc = site
        .store()
        .load_path(&root.join("posts/2024/03/d.md"))
        .unwrap();
    let report = site.publish(&doc);
    assert!(report.is_clean());
    let incremental = snapshot(&root.join("build"));

    site.clean().unwrap();
    site.build_all(&RustBackend::new()).unwrap();
    let full = snapshot(&root.join("build"));

    assert_eq!(incremental.keys().collect::<Vec<_>>(), full.keys().collect::<Vec<_>>());
    for (path, bytes) in &full {
        if path == Path::new("archives.htm") {
            continue;
        }
        assert_eq!(&incremental[path], bytes, "{} differs", path.display());
    }
}

#[test]
fn broken_document_is_isolated() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let config = config();
    post(root, "2024/03/one.md", "One", 1_709_300_000);
    post(root, "2024/03/two.md", "Two", 1_709_400_000);
    write(root, "posts/2024/03/broken.md", "title: Broken\n\nno date here");

    let site = Site::new(&config, root, Arc::new(AliasResolver::disabled()));
    let report = site.build_all(&RustBackend::new()).unwrap();

    assert_eq!(report.failures.len(), 1);
    assert!(report.failures[0].path.ends_with("broken.md"));
    assert!(report.write_failures.is_empty());

    let build = root.join("build");
    for rel in ["index.htm", "2024/index.htm", "2024/03/index.htm"] {
        let html = fs::read_to_string(build.join(rel)).unwrap();
        assert!(html.contains("/2024/03/one"), "{rel}");
        assert!(html.contains("/2024/03/two"), "{rel}");
        assert!(!html.contains("Broken"), "{rel}");
    }
    let feed = fs::read_to_string(build.join("index.xml")).unwrap();
    assert_eq!(occurrences(&feed, "<item>"), 2);
}

#[test]
fn stray_files_and_folders_are_ignored() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let config = config();
    post(root, "2024/03/real.md", "Real", 1_709_300_000);
    write(root, "posts/2024/03/notes.txt", "title: x\ndate: 1\n\nx");
    write(root, "posts/drafts/03/draft.md", "title: Draft\ndate: 1\n\nx");
    write(root, "posts/2024/3/short.md", "title: Short\ndate: 1\n\nx");

    let site = Site::new(&config, root, Arc::new(AliasResolver::disabled()));
    let report = site.build_all(&RustBackend::new()).unwrap();
    assert!(report.is_clean());

    let home = fs::read_to_string(root.join("build/index.htm")).unwrap();
    assert!(home.contains("Real"));
    assert!(!home.contains("Draft"));
    assert!(!home.contains("Short"));
}

#[test]
fn feed_holds_only_feed_count_posts() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let mut config = config();
    config.build.home_count = 3;
    config.build.feed_count = 2;
    post(root, "2024/03/first.md", "First", 1_709_300_000);
    post(root, "2024/03/second.md", "Second", 1_709_400_000);
    post(root, "2024/03/third.md", "Third", 1_709_500_000);

    let site = Site::new(&config, root, Arc::new(AliasResolver::disabled()));
    assert!(site.build_all(&RustBackend::new()).unwrap().is_clean());

    let home = fs::read_to_string(root.join("build/index.htm")).unwrap();
    for title in ["First", "Second", "Third"] {
        assert!(home.contains(title), "{title}");
    }
    let feed = fs::read_to_string(root.join("build/index.xml")).unwrap();
    assert_eq!(occurrences(&feed, "<item>"), 2);
    assert!(feed.contains("/2024/03/third"));
    assert!(feed.contains("/2024/03/second"));
    assert!(!feed.contains("/2024/03/first"));
}

#[test]
fn older_post_leaves_home_and_feed_untouched() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let mut config = config();
    config.build.home_count = 3;
    config.build.feed_count = 2;
    post(root, "2024/03/first.md", "First", 1_709_300_000);
    post(root, "2024/03/second.md", "Second", 1_709_400_000);
    post(root, "2024/03/third.md", "Third", 1_709_500_000);
    let site = Site::new(&config, root, Arc::new(AliasResolver::disabled()));
    site.build_all(&RustBackend::new()).unwrap();
    let home = fs::read(root.join("build/index.htm")).unwrap();
    let feed = fs::read(root.join("build/index.xml")).unwrap();

    post(root, "2023/06/ancient.md", "Ancient", 1_686_000_000);
    let doc = site
        .store()
        .load_path(&root.join("posts/2023/06/ancient.md"))
        .unwrap();
    assert!(site.publish(&doc).is_clean());

    assert_eq!(fs::read(root.join("build/index.htm")).unwrap(), home);
    assert_eq!(fs::read(root.join("build/index.xml")).unwrap(), feed);
    assert!(root.join("build/2023/06/ancient.htm").is_file());
    let month = fs::read_to_string(root.join("build/2023/06/index.htm")).unwrap();
    assert!(month.contains("/2023/06/ancient"));
}

#[test]
fn post_from_outside_the_store_is_stored_then_published() {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    let config = config();
    post(root, "2024/03/a.md", "A", 1_709_300_000);
    let site = Site::new(&config, root, Arc::new(AliasResolver::disabled()));
    site.build_all(&RustBackend::new()).unwrap();

    write(root, "drafts/late.md", "title: Late Entry\ndate: 1709400000\n\nWritten elsewhere.");
    let published = site.publish_file(&root.join("drafts/late.md")).unwrap();
    assert!(published.report.is_clean());
    assert_eq!(published.path, root.join("posts/2024/03/late-entry.md"));
    let incremental = snapshot(&root.join("build"));

    // A full build over the same store agrees with the incremental one.
    site.clean().unwrap();
    site.build_all(&RustBackend::new()).unwrap();
    let full = snapshot(&root.join("build"));
    for rel in ["index.htm", "index.xml", "2024/index.htm", "2024/03/index.htm"] {
        let path = PathBuf::from(rel);
        assert_eq!(incremental[&path], full[&path], "{rel}");
        let html = String::from_utf8(full[&path].clone()).unwrap();
        assert!(html.contains("/2024/03/late-entry"), "{rel}");
    }
}
