// ABOUTME: Integration tests for the dir storage driver.
// ABOUTME: Exercises snapshots, restore, image unpacking, rename and delete on a temp root.

use flate2::Compression;
use flate2::write::GzEncoder;
use quayd::error::ErrorKind;
use quayd::storage::{self, Storage, StorageType};
use quayd::types::{ContainerName, ImageId};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

struct Fixture {
    storage: Arc<dyn Storage>,
    dir: TempDir,
}

impl Fixture {
    async fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = storage::init(
            StorageType::Dir,
            dir.path().join("storage"),
            dir.path().join("images"),
        )
        .await
        .unwrap();
        Self { storage, dir }
    }

    fn rootfs(&self, name: &ContainerName) -> std::path::PathBuf {
        self.storage.container_path(name).join("rootfs")
    }
}

fn name(value: &str) -> ContainerName {
    ContainerName::new(value).unwrap()
}

/// Write `<fingerprint>.tar.gz` containing `rootfs/etc/hostname`.
fn write_image(images: &Path, fingerprint: &str) {
    fs::create_dir_all(images).unwrap();
    let file = fs::File::create(images.join(format!("{}.tar.gz", fingerprint))).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    let content = b"image-host\n";
    let mut header = tar::Header::new_gnu();
    header.set_size(content.len() as u64);
    header.set_mode(0o644);
    header.set_cksum();
    builder
        .append_data(&mut header, "rootfs/etc/hostname", &content[..])
        .unwrap();
    builder.into_inner().unwrap().finish().unwrap();
}

#[tokio::test]
async fn create_allocates_an_empty_rootfs() {
    let f = Fixture::new().await;
    let web = name("web");

    f.storage.container_create(&web).await.unwrap();

    assert!(f.rootfs(&web).is_dir());
    let err = f.storage.container_create(&web).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[tokio::test]
async fn snapshot_then_restore_brings_back_old_contents() {
    let f = Fixture::new().await;
    let web = name("web");
    f.storage.container_create(&web).await.unwrap();
    fs::write(f.rootfs(&web).join("motd"), "before").unwrap();

    let snap = web.snapshot("snap0").unwrap();
    f.storage.container_snapshot_create(&snap, &web).await.unwrap();
    fs::write(f.rootfs(&web).join("motd"), "after").unwrap();
    fs::write(f.rootfs(&web).join("extra"), "new file").unwrap();

    f.storage.container_restore(&web, &snap).await.unwrap();

    assert_eq!(fs::read_to_string(f.rootfs(&web).join("motd")).unwrap(), "before");
    assert!(!f.rootfs(&web).join("extra").exists());
    assert!(f.rootfs(&snap).join("motd").exists(), "restore keeps the snapshot");
}

#[tokio::test]
async fn restore_from_missing_snapshot_is_not_found() {
    let f = Fixture::new().await;
    let web = name("web");
    f.storage.container_create(&web).await.unwrap();

    let err = f
        .storage
        .container_restore(&web, &web.snapshot("nope").unwrap())
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn create_from_image_unpacks_and_caches() {
    let f = Fixture::new().await;
    let images = f.dir.path().join("images");
    write_image(&images, "abc123");
    let fingerprint = ImageId::fingerprint("abc123").unwrap();
    let web = name("web");

    f.storage
        .container_create_from_image(&web, &fingerprint)
        .await
        .unwrap();

    assert_eq!(
        fs::read_to_string(f.rootfs(&web).join("etc/hostname")).unwrap(),
        "image-host\n"
    );

    // The cached copy is used even once the tarball is gone.
    fs::remove_file(images.join("abc123.tar.gz")).unwrap();
    let db = name("db");
    f.storage
        .container_create_from_image(&db, &fingerprint)
        .await
        .unwrap();
    assert!(f.rootfs(&db).join("etc/hostname").is_file());
}

#[tokio::test]
async fn missing_image_is_not_found_and_leaves_nothing_behind() {
    let f = Fixture::new().await;
    let web = name("web");
    let fingerprint = ImageId::fingerprint("deadbeef").unwrap();

    let err = f
        .storage
        .container_create_from_image(&web, &fingerprint)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(!f.storage.container_path(&web).exists());
}

#[tokio::test]
async fn delete_is_idempotent_and_removes_snapshots() {
    let f = Fixture::new().await;
    let web = name("web");
    f.storage.container_create(&web).await.unwrap();
    let snap = web.snapshot("snap0").unwrap();
    f.storage.container_snapshot_create(&snap, &web).await.unwrap();

    f.storage.container_delete(&web).await.unwrap();
    assert!(!f.storage.container_path(&web).exists());
    assert!(!f.storage.container_path(&snap).exists());

    f.storage.container_delete(&web).await.unwrap();
}

#[tokio::test]
async fn rename_moves_snapshots_and_refuses_to_clobber() {
    let f = Fixture::new().await;
    let web = name("web");
    let api = name("api");
    f.storage.container_create(&web).await.unwrap();
    f.storage.container_create(&api).await.unwrap();

    let err = f.storage.container_rename(&web, &api).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    f.storage
        .container_snapshot_create(&web.snapshot("snap0").unwrap(), &web)
        .await
        .unwrap();
    let next = name("next");
    f.storage.container_rename(&web, &next).await.unwrap();

    assert!(!f.storage.container_path(&web).exists());
    assert!(f.rootfs(&next).is_dir());
    assert!(f.rootfs(&next.snapshot("snap0").unwrap()).is_dir());
}

#[tokio::test]
async fn snapshot_rename_within_parent() {
    let f = Fixture::new().await;
    let web = name("web");
    f.storage.container_create(&web).await.unwrap();
    let snap0 = web.snapshot("snap0").unwrap();
    let snap1 = web.snapshot("snap1").unwrap();
    f.storage.container_snapshot_create(&snap0, &web).await.unwrap();

    f.storage.container_snapshot_rename(&snap0, &snap1).await.unwrap();

    assert!(!f.storage.container_path(&snap0).exists());
    assert!(f.rootfs(&snap1).is_dir());
}

#[tokio::test]
async fn copy_duplicates_the_tree() {
    let f = Fixture::new().await;
    let web = name("web");
    f.storage.container_create(&web).await.unwrap();
    fs::write(f.rootfs(&web).join("motd"), "hi").unwrap();

    let clone = name("clone");
    f.storage.container_copy(&clone, &web).await.unwrap();
    fs::write(f.rootfs(&web).join("motd"), "changed").unwrap();

    assert_eq!(fs::read_to_string(f.rootfs(&clone).join("motd")).unwrap(), "hi");
}

#[tokio::test]
async fn snapshot_delete_only_touches_its_own_parent() {
    let f = Fixture::new().await;
    let web = name("web");
    let db = name("db");
    f.storage.container_create(&web).await.unwrap();
    f.storage.container_create(&db).await.unwrap();
    let db_snap = db.snapshot("snap0").unwrap();
    f.storage.container_snapshot_create(&db_snap, &db).await.unwrap();

    assert!(ContainerName::new("web/..").is_err());
    assert!(web.snapshot(".").is_err());

    let web_snap = web.snapshot("snap0").unwrap();
    f.storage.container_snapshot_create(&web_snap, &web).await.unwrap();
    f.storage.container_snapshot_delete(&web_snap).await.unwrap();

    assert!(!f.storage.container_path(&web_snap).exists());
    assert!(f.rootfs(&db_snap).is_dir());
}

#[tokio::test]
async fn image_create_is_idempotent_and_delete_removes_the_cache() {
    let f = Fixture::new().await;
    write_image(&f.dir.path().join("images"), "abc123");
    let fingerprint = ImageId::fingerprint("abc123").unwrap();
    let cached = f.dir.path().join("storage/images/abc123");

    f.storage.image_create(&fingerprint).await.unwrap();
    assert!(cached.join("rootfs/etc/hostname").is_file());
    f.storage.image_create(&fingerprint).await.unwrap();

    f.storage.image_delete(&fingerprint).await.unwrap();
    assert!(!cached.exists());
    f.storage.image_delete(&fingerprint).await.unwrap();
}

#[tokio::test]
async fn image_create_without_tarball_is_not_found() {
    let f = Fixture::new().await;
    let fingerprint = ImageId::fingerprint("deadbeef").unwrap();

    let err = f.storage.image_create(&fingerprint).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn mock_storage_reports_its_type() {
    let dir = tempfile::tempdir().unwrap();
    let mock = storage::init(StorageType::Mock, dir.path().into(), dir.path().into())
        .await
        .unwrap();
    assert_eq!(mock.storage_type_name(), "mock");
    mock.container_create(&name("web")).await.unwrap();
}
