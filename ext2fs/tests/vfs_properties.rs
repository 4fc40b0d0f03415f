//! End-to-end exercises of the testable properties in spec.md §8, built
//! against a freshly `format`-ted in-memory device.

use std::sync::{Arc, Mutex};

use ext2fs::block::ram::RamDisk;
use ext2fs::ext2::format::{format, FormatOptions};
use ext2fs::vfs::{OpenOptions, Vfs};

fn fresh_vfs(sectors: u32) -> Vfs {
    let device: Arc<Mutex<dyn ext2fs::block::BlockDevice>> = Arc::new(Mutex::new(RamDisk::new(sectors)));
    let fs = format(device, FormatOptions::default()).expect("format should succeed on a fresh device");
    Vfs::new(fs)
}

#[test]
fn root_exists_and_is_a_directory() {
    let vfs = fresh_vfs(4096);
    assert!(vfs.exists("/"));
    let stat = vfs.stat("/").unwrap();
    assert_eq!(stat.file_type, ext2fs::ext2::FileType::Directory);
}

#[test]
fn create_write_read_round_trips() {
    let vfs = fresh_vfs(4096);
    let fd = vfs.open("/hello.txt", OpenOptions::write_create()).unwrap();
    let n = vfs.write(fd, b"hello, world").unwrap();
    assert_eq!(n, 12);
    vfs.close(fd).unwrap();

    let fd = vfs.open("/hello.txt", OpenOptions::read_only()).unwrap();
    let mut buf = [0u8; 12];
    let n = vfs.read(fd, &mut buf).unwrap();
    assert_eq!(n, 12);
    assert_eq!(&buf, b"hello, world");
    vfs.close(fd).unwrap();
}

#[test]
fn seek_changes_next_read_position() {
    let vfs = fresh_vfs(4096);
    let fd = vfs.open("/a.bin", OpenOptions::write_create()).unwrap();
    vfs.write(fd, b"0123456789").unwrap();
    vfs.close(fd).unwrap();

    let fd = vfs.open("/a.bin", OpenOptions::read_only()).unwrap();
    vfs.seek(fd, 5).unwrap();
    let mut buf = [0u8; 5];
    vfs.read(fd, &mut buf).unwrap();
    assert_eq!(&buf, b"56789");
}

#[test]
fn write_spanning_many_blocks_reads_back() {
    let vfs = fresh_vfs(8192);
    let payload = vec![0x5Au8; 1024 * 11 + 37]; // spans most of the direct-block range
    let fd = vfs.open("/big.bin", OpenOptions::write_create()).unwrap();
    vfs.write(fd, &payload).unwrap();
    vfs.close(fd).unwrap();

    let fd = vfs.open("/big.bin", OpenOptions::read_only()).unwrap();
    let mut out = vec![0u8; payload.len()];
    let mut done = 0;
    while done < out.len() {
        let n = vfs.read(fd, &mut out[done..]).unwrap();
        assert!(n > 0);
        done += n;
    }
    assert_eq!(out, payload);
}

#[test]
fn write_past_direct_block_range_is_rejected() {
    let vfs = fresh_vfs(8192);
    // 12 direct blocks * 1024 bytes = 12288; this reaches logical block 12.
    let payload = vec![0x5Au8; 1024 * 12 + 1];
    let fd = vfs.open("/toobig.bin", OpenOptions::write_create()).unwrap();
    let err = vfs.write(fd, &payload).unwrap_err();
    assert!(matches!(
        err,
        ext2fs::vfs::VfsError::Ext2(ext2fs::ext2::Ext2Error::TooLarge)
    ));
}

#[test]
fn mkdir_and_list_directory() {
    let vfs = fresh_vfs(4096);
    vfs.mkdir("/dir", 0o755).unwrap();
    vfs.create("/dir/one", 0o644).unwrap();
    vfs.create("/dir/two", 0o644).unwrap();

    let mut names: Vec<_> = vfs
        .list_directory("/dir")
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect();
    names.sort();
    assert_eq!(names, vec![".", "..", "one", "two"]);
}

#[test]
fn unlink_removes_entry_and_frees_inode() {
    let vfs = fresh_vfs(4096);
    vfs.create("/gone.txt", 0o644).unwrap();
    assert!(vfs.exists("/gone.txt"));
    vfs.unlink("/gone.txt").unwrap();
    assert!(!vfs.exists("/gone.txt"));
}

#[test]
fn unlink_nonempty_directory_fails() {
    let vfs = fresh_vfs(4096);
    vfs.mkdir("/full", 0o755).unwrap();
    vfs.create("/full/child", 0o644).unwrap();
    let err = vfs.unlink("/full").unwrap_err();
    assert!(matches!(
        err,
        ext2fs::vfs::VfsError::Ext2(ext2fs::ext2::Ext2Error::NotEmpty)
    ));
}

#[test]
fn directory_entries_reuse_slack_after_removal() {
    let vfs = fresh_vfs(4096);
    vfs.create("/a", 0o644).unwrap();
    vfs.create("/bbbbbbbbbbbbbbbbbbbb", 0o644).unwrap();
    vfs.unlink("/a").unwrap();
    vfs.create("/c", 0o644).unwrap();
    assert!(vfs.exists("/c"));
    assert!(vfs.exists("/bbbbbbbbbbbbbbbbbbbb"));
}

#[test]
fn absolute_symlink_resolves_to_target() {
    let vfs = fresh_vfs(4096);
    vfs.create("/target.txt", 0o644).unwrap();
    let fd = vfs.open("/target.txt", OpenOptions::write_create()).unwrap();
    vfs.write(fd, b"payload").unwrap();
    vfs.close(fd).unwrap();

    vfs.create_symlink("/link", "/target.txt").unwrap();
    let fd = vfs.open("/link", OpenOptions::read_only()).unwrap();
    let mut buf = [0u8; 7];
    vfs.read(fd, &mut buf).unwrap();
    assert_eq!(&buf, b"payload");
}

#[test]
fn relative_symlink_resolves_against_its_own_parent() {
    let vfs = fresh_vfs(4096);
    vfs.mkdir("/dir", 0o755).unwrap();
    vfs.create("/dir/target.txt", 0o644).unwrap();
    let fd = vfs.open("/dir/target.txt", OpenOptions::write_create()).unwrap();
    vfs.write(fd, b"here").unwrap();
    vfs.close(fd).unwrap();

    // A relative target inside /dir must resolve relative to /dir, not to
    // whatever directory the caller happens to be resolving from.
    vfs.create_symlink("/dir/link", "target.txt").unwrap();
    let fd = vfs.open("/dir/link", OpenOptions::read_only()).unwrap();
    let mut buf = [0u8; 4];
    vfs.read(fd, &mut buf).unwrap();
    assert_eq!(&buf, b"here");
}

#[test]
fn symlink_cycle_is_rejected() {
    let vfs = fresh_vfs(4096);
    vfs.create_symlink("/loop_a", "/loop_b").unwrap();
    vfs.create_symlink("/loop_b", "/loop_a").unwrap();
    let err = vfs.open("/loop_a", OpenOptions::read_only()).unwrap_err();
    assert!(matches!(err, ext2fs::vfs::VfsError::TooManySymlinks));
}

#[test]
fn truncate_shrinks_and_frees_blocks() {
    let vfs = fresh_vfs(4096);
    let fd = vfs.open("/shrink.bin", OpenOptions::write_create()).unwrap();
    vfs.write(fd, &vec![1u8; 4096]).unwrap();
    vfs.close(fd).unwrap();

    vfs.truncate("/shrink.bin", 10).unwrap();
    let stat = vfs.stat("/shrink.bin").unwrap();
    assert_eq!(stat.size, 10);
}

#[test]
fn chmod_and_chown_update_stat() {
    let vfs = fresh_vfs(4096);
    vfs.create("/perms.txt", 0o644).unwrap();
    vfs.chmod("/perms.txt", 0o600).unwrap();
    vfs.chown("/perms.txt", 42, 7).unwrap();
    let stat = vfs.stat("/perms.txt").unwrap();
    assert_eq!(stat.permissions, 0o600);
    assert_eq!(stat.uid, 42);
    assert_eq!(stat.gid, 7);
}

#[test]
fn opendir_readdir_closedir_cycle() {
    let vfs = fresh_vfs(4096);
    vfs.create("/x", 0o644).unwrap();
    let dir = vfs.opendir("/").unwrap();
    let mut names = Vec::new();
    while let Some(entry) = vfs.readdir(dir).unwrap() {
        names.push(entry.name);
    }
    vfs.closedir(dir).unwrap();
    assert!(names.contains(&"x".to_string()));
    assert!(vfs.readdir(dir).is_err());
}
