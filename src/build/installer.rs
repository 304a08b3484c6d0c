//! Build installation
//!
//! Installs application builds from installer packages and removes them again.
//! Zip and tar.bz2 packages are unpacked in-process; disk images and NSIS
//! installers go through the platform tools.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::application::ApplicationLayout;

/// Installs and uninstalls application builds
#[async_trait]
pub trait Installer: Send + Sync {
    /// Install `archive` into `dest` and return the application folder
    async fn install(&self, archive: &Path, dest: &Path) -> Result<PathBuf>;

    /// Run any uninstall steps the build needs before its folder is removed
    async fn uninstall(&self, app_folder: &Path) -> Result<()>;
}

/// Installer for `.zip`, `.bz2`, `.dmg` and `.exe` packages
#[derive(Clone, Debug, Default)]
pub struct ArchiveInstaller {
    layout: ApplicationLayout,
}

impl ArchiveInstaller {
    pub fn new(layout: ApplicationLayout) -> Self {
        Self { layout }
    }

    async fn install_dmg(&self, archive: &Path, dest: &Path) -> Result<()> {
        let mount_point = tempfile::Builder::new()
            .prefix("mozmill-dmg.")
            .tempdir()
            .context("Failed to create mount point")?;
        let mount = path_str(mount_point.path())?;

        run(
            "hdiutil",
            &[
                "attach".into(),
                "-quiet".into(),
                "-nobrowse".into(),
                "-noautoopen".into(),
                "-mountpoint".into(),
                mount.clone(),
                path_str(archive)?,
            ],
        )
        .await?;

        let copied = self.copy_app_bundles(mount_point.path(), dest).await;

        if let Err(e) = run("hdiutil", &["detach".into(), mount, "-quiet".into()]).await {
            warn!("Failed to detach disk image: {:#}", e);
        }

        copied
    }

    async fn copy_app_bundles(&self, volume: &Path, dest: &Path) -> Result<()> {
        let mut entries = tokio::fs::read_dir(volume)
            .await
            .with_context(|| format!("Failed to read volume {}", volume.display()))?;

        let mut found = false;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().map(|e| e == "app").unwrap_or(false) {
                run("cp", &["-R".into(), path_str(&path)?, path_str(dest)?]).await?;
                found = true;
            }
        }

        if !found {
            anyhow::bail!("No application bundle found in {}", volume.display());
        }
        Ok(())
    }

    async fn install_exe(&self, archive: &Path, dest: &Path) -> Result<()> {
        // NSIS installers take the target folder as the last, unquoted argument
        let output = Command::new(archive)
            .arg("/S")
            .arg(format!("/D={}", dest.display()))
            .kill_on_drop(true)
            .output()
            .await
            .with_context(|| format!("Failed to run installer {}", archive.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Installer exited with {}: {stderr}", output.status);
        }
        Ok(())
    }
}

#[async_trait]
impl Installer for ArchiveInstaller {
    async fn install(&self, archive: &Path, dest: &Path) -> Result<PathBuf> {
        info!("Installing {} to {}", archive.display(), dest.display());

        let extension = archive
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match extension.as_str() {
            "zip" => extract_blocking(archive, dest, extract_zip).await?,
            "bz2" => extract_blocking(archive, dest, extract_tar_bz2).await?,
            "dmg" => self.install_dmg(archive, dest).await?,
            "exe" => self.install_exe(archive, dest).await?,
            other => anyhow::bail!("Unsupported installer type: .{other}"),
        }

        self.layout.find_app_folder(dest).with_context(|| {
            format!(
                "No application found after installing {}",
                archive.display()
            )
        })
    }

    async fn uninstall(&self, app_folder: &Path) -> Result<()> {
        let helper = app_folder.join("uninstall").join("helper.exe");
        if !helper.is_file() {
            return Ok(());
        }

        info!("Running uninstaller for {}", app_folder.display());
        let output = Command::new(&helper)
            .arg("/S")
            .kill_on_drop(true)
            .output()
            .await
            .context("Failed to run uninstall helper")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Uninstall helper exited with {}: {stderr}", output.status);
        }
        Ok(())
    }
}

/// Stop signal for an extraction running on the blocking pool
#[derive(Clone, Debug, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Guard that cancels when dropped
    pub fn cancel_on_drop(&self) -> CancelOnDrop {
        CancelOnDrop(self.clone())
    }

    /// Fails once cancelled or once the destination is gone.
    /// Checked before each archive entry; the entry in flight is finished.
    fn check(&self, dest_dir: &Path) -> Result<()> {
        if self.is_cancelled() {
            anyhow::bail!("Extraction into {} was cancelled", dest_dir.display());
        }
        if !dest_dir.is_dir() {
            anyhow::bail!("Destination {} no longer exists", dest_dir.display());
        }
        Ok(())
    }
}

pub struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// Run an extractor on the blocking pool. Dropping the returned future
/// (for example on timeout) stops the extractor at its next entry.
async fn extract_blocking(
    archive: &Path,
    dest: &Path,
    extract: fn(&Path, &Path, &CancelFlag) -> Result<()>,
) -> Result<()> {
    let cancel = CancelFlag::default();
    let _guard = cancel.cancel_on_drop();
    let (archive, dest) = (archive.to_path_buf(), dest.to_path_buf());

    tokio::task::spawn_blocking(move || extract(&archive, &dest, &cancel))
        .await
        .context("Extraction task failed")?
}

/// Extract a zip archive
pub fn extract_zip(archive_path: &Path, dest_dir: &Path, cancel: &CancelFlag) -> Result<()> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open {}", archive_path.display()))?;
    let mut archive = zip::ZipArchive::new(file).context("Failed to open zip")?;

    for i in 0..archive.len() {
        cancel.check(dest_dir)?;
        let mut file = archive.by_index(i).context("Failed to read zip entry")?;

        let outpath = match file.enclosed_name() {
            Some(path) => dest_dir.join(path),
            None => continue,
        };

        if file.is_dir() {
            std::fs::create_dir_all(&outpath)?;
        } else {
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let mut outfile = std::fs::File::create(&outpath)?;
            std::io::copy(&mut file, &mut outfile)?;
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = file.unix_mode() {
                std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
            }
        }
    }

    Ok(())
}

/// Extract a bzip2-compressed tar archive
pub fn extract_tar_bz2(archive_path: &Path, dest_dir: &Path, cancel: &CancelFlag) -> Result<()> {
    let file = std::fs::File::open(archive_path)
        .with_context(|| format!("Failed to open {}", archive_path.display()))?;
    let decoder = bzip2::read::BzDecoder::new(file);
    let mut archive = tar::Archive::new(decoder);

    for entry in archive.entries().context("Failed to read tar.bz2")? {
        cancel.check(dest_dir)?;
        let mut entry = entry.context("Failed to read tar entry")?;
        let path = entry.path()?.into_owned();
        if !entry.unpack_in(dest_dir)? {
            warn!("Skipping entry outside the destination: {}", path.display());
        }
    }

    Ok(())
}

async fn run(program: &str, args: &[String]) -> Result<()> {
    debug!("Running {} {:?}", program, args);

    let output = Command::new(program)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .with_context(|| format!("Failed to run {program}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{program} failed: {stderr}");
    }
    Ok(())
}

fn path_str(path: &Path) -> Result<String> {
    path.to_str()
        .map(str::to_string)
        .with_context(|| format!("Path is not valid UTF-8: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::super::application::fixtures::linux_layout;
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_zip_build(path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        let mut zip = zip::ZipWriter::new(file);
        let options = zip::write::SimpleFileOptions::default();

        zip.add_directory("firefox/", options).unwrap();
        zip.start_file("firefox/application.ini", options).unwrap();
        zip.write_all(b"[App]\nSourceRepository=http://hg.mozilla.org/mozilla-central\n")
            .unwrap();
        zip.start_file("firefox/firefox", options).unwrap();
        zip.write_all(b"#!/bin/sh\n").unwrap();
        zip.finish().unwrap();
    }

    fn write_tar_bz2_build(path: &Path) {
        let file = std::fs::File::create(path).unwrap();
        let encoder = bzip2::write::BzEncoder::new(file, bzip2::Compression::default());
        let mut builder = tar::Builder::new(encoder);

        let files: [(&str, &[u8], u32); 2] = [
            (
                "firefox/application.ini",
                b"[App]\nSourceRepository=http://hg.mozilla.org/releases/mozilla-2.0\n",
                0o644,
            ),
            ("firefox/firefox", b"#!/bin/sh\n", 0o755),
        ];
        for (name, data, mode) in files {
            let mut header = tar::Header::new_gnu();
            header.set_entry_type(tar::EntryType::Regular);
            header.set_size(data.len() as u64);
            header.set_mode(mode);
            builder.append_data(&mut header, name, data).unwrap();
        }

        builder.into_inner().unwrap().finish().unwrap();
    }

    #[tokio::test]
    async fn test_install_zip() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("firefox-4.0.zip");
        write_zip_build(&archive);

        let dest = dir.path().join("install");
        std::fs::create_dir(&dest).unwrap();

        let installer = ArchiveInstaller::new(linux_layout());
        let folder = installer.install(&archive, &dest).await.unwrap();

        assert_eq!(folder, dest.join("firefox"));
        assert!(folder.join("firefox").is_file());
    }

    #[tokio::test]
    async fn test_install_tar_bz2() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("firefox-4.0.tar.bz2");
        write_tar_bz2_build(&archive);

        let dest = dir.path().join("install");
        std::fs::create_dir(&dest).unwrap();

        let installer = ArchiveInstaller::new(linux_layout());
        let folder = installer.install(&archive, &dest).await.unwrap();

        assert_eq!(folder, dest.join("firefox"));
        let ini = std::fs::read_to_string(folder.join("application.ini")).unwrap();
        assert!(ini.contains("mozilla-2.0"));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(folder.join("firefox"))
                .unwrap()
                .permissions()
                .mode();
            assert_ne!(mode & 0o111, 0);
        }
    }

    #[test]
    fn test_cancelled_extraction_writes_nothing() {
        let dir = tempdir().unwrap();
        let zip = dir.path().join("firefox.zip");
        let tarball = dir.path().join("firefox.tar.bz2");
        write_zip_build(&zip);
        write_tar_bz2_build(&tarball);

        let dest = dir.path().join("install");
        std::fs::create_dir(&dest).unwrap();

        let cancel = CancelFlag::default();
        drop(cancel.cancel_on_drop());
        assert!(cancel.is_cancelled());

        let err = extract_zip(&zip, &dest, &cancel).unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        let err = extract_tar_bz2(&tarball, &dest, &cancel).unwrap_err();
        assert!(err.to_string().contains("cancelled"));
        assert!(std::fs::read_dir(&dest).unwrap().next().is_none());
    }

    #[test]
    fn test_extraction_stops_when_destination_is_removed() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("firefox.zip");
        write_zip_build(&archive);

        let dest = dir.path().join("install");
        let err = extract_zip(&archive, &dest, &CancelFlag::default()).unwrap_err();

        assert!(err.to_string().contains("no longer exists"));
        assert!(!dest.exists());
    }

    #[tokio::test]
    async fn test_install_unsupported_type() {
        let dir = tempdir().unwrap();
        let archive = dir.path().join("firefox.tar.gz");
        std::fs::write(&archive, b"").unwrap();

        let installer = ArchiveInstaller::new(linux_layout());
        let err = installer.install(&archive, dir.path()).await.unwrap_err();
        assert!(err.to_string().contains("Unsupported installer type"));
    }

    #[tokio::test]
    async fn test_uninstall_without_helper_is_noop() {
        let dir = tempdir().unwrap();
        let installer = ArchiveInstaller::default();
        assert!(installer.uninstall(dir.path()).await.is_ok());
    }
}
