use crate::check_fragment_id;
use crate::check_range;
use crate::BackendError;
use crate::BackendLimits;
use crate::BackendResult;
use crate::CommitFragmentsInput;
use crate::CreateFromBytesInput;
use crate::CreateObjectInput;
use crate::FragmentInfo;
use crate::ObjectPath;
use crate::ReadRangeInput;
use crate::StorageBackend;
use crate::WriteFragmentInput;
use crate::WriteRangeInput;
use crate::MIB;
use async_trait::async_trait;
use off64::u64;
use off64::usz;
use std::ffi::OsString;
use std::io;
use std::io::SeekFrom;
use std::path::Path;
use std::path::PathBuf;
use tokio::fs::create_dir_all;
use tokio::fs::metadata;
use tokio::fs::read_dir;
use tokio::fs::remove_dir_all;
use tokio::fs::rename;
use tokio::fs::File;
use tokio::fs::OpenOptions;
use tokio::io::AsyncReadExt;
use tokio::io::AsyncSeekExt;
use tokio::io::AsyncWriteExt;
use tracing::debug;

/// POSIX-like shared filesystem (e.g. a Lustre or NFS mount). Containers are directories under `prefix`. Uncommitted fragments are staged as individual files in a hidden sibling directory of the object, and a commit concatenates them into a temporary file that is then renamed over the object.
pub struct FileSystemStore {
  prefix: PathBuf,
  limits: BackendLimits,
  /// Call fsync after every write.
  sync: bool,
}

impl FileSystemStore {
  pub fn new(prefix: PathBuf, limits: BackendLimits, sync: bool) -> Self {
    Self {
      prefix,
      limits,
      sync,
    }
  }

  pub fn default_limits() -> BackendLimits {
    BackendLimits {
      fragment_limit: 100 * MIB,
      section_limit: 1024 * MIB,
      precision: 3,
    }
  }

  fn get_path(&self, target: &ObjectPath) -> PathBuf {
    let mut path = self.prefix.clone();
    path.push(&target.container);
    path.push(&target.path);
    path
  }

  fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(".");
    name.push(path.file_name().unwrap_or_default());
    name.push(suffix);
    path.with_file_name(name)
  }

  fn get_fragments_dir(&self, target: &ObjectPath) -> PathBuf {
    Self::sibling(&self.get_path(target), ".fragments")
  }

  async fn ensure_parent(path: &Path) -> BackendResult<()> {
    if let Some(parent) = path.parent() {
      create_dir_all(parent).await?;
    };
    Ok(())
  }

  async fn finish_write(&self, mut f: File) -> BackendResult<()> {
    f.flush().await?;
    if self.sync {
      f.sync_data().await?;
    };
    Ok(())
  }
}

#[async_trait]
impl StorageBackend for FileSystemStore {
  fn name(&self) -> &'static str {
    "fs"
  }

  fn limits(&self) -> BackendLimits {
    self.limits
  }

  fn metrics(&self) -> Vec<(&'static str, u64)> {
    vec![]
  }

  async fn get_size(&self, target: &ObjectPath) -> BackendResult<u64> {
    Ok(metadata(self.get_path(target)).await?.len())
  }

  async fn read_range<'a>(&'a self, input: ReadRangeInput<'a>) -> BackendResult<Vec<u8>> {
    let path = self.get_path(input.target);
    let mut f = File::open(&path).await?;
    let size = f.metadata().await?.len();
    check_range(size, input.start, input.end, None)?;
    f.seek(SeekFrom::Start(input.start)).await?;
    let mut buf = vec![0u8; usz!(input.end - input.start + 1)];
    f.read_exact(&mut buf).await?;
    Ok(buf)
  }

  async fn read_all(&self, target: &ObjectPath) -> BackendResult<Vec<u8>> {
    Ok(tokio::fs::read(self.get_path(target)).await?)
  }

  async fn write_fragment<'a>(&'a self, input: WriteFragmentInput<'a>) -> BackendResult<()> {
    check_fragment_id(input.fragment_id)?;
    if u64!(input.data.len()) > self.limits.fragment_limit {
      return Err(BackendError::FragmentTooLarge);
    };
    let dir = self.get_fragments_dir(input.target);
    create_dir_all(&dir).await?;
    let mut f = File::create(dir.join(input.fragment_id)).await?;
    f.write_all(input.data).await?;
    self.finish_write(f).await
  }

  async fn list_uncommitted_fragments(&self, target: &ObjectPath) -> BackendResult<Vec<FragmentInfo>> {
    let dir = self.get_fragments_dir(target);
    let mut entries = match read_dir(&dir).await {
      Ok(entries) => entries,
      Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
      Err(err) => return Err(err.into()),
    };
    let mut out = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
      // Anything that isn't valid UTF-8 wasn't written by us.
      let Ok(id) = entry.file_name().into_string() else {
        continue;
      };
      out.push(FragmentInfo {
        id,
        size: entry.metadata().await?.len(),
      });
    }
    Ok(out)
  }

  async fn commit_fragments<'a>(&'a self, input: CommitFragmentsInput<'a>) -> BackendResult<()> {
    let path = self.get_path(input.target);
    let dir = self.get_fragments_dir(input.target);
    let tmp = Self::sibling(&path, ".commit");
    Self::ensure_parent(&path).await?;
    let mut out = File::create(&tmp).await?;
    for id in input.ordered_ids.iter() {
      check_fragment_id(id)?;
      let mut frag = match File::open(dir.join(id)).await {
        Ok(f) => f,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
          return Err(BackendError::FragmentNotFound(id.clone()));
        }
        Err(err) => return Err(err.into()),
      };
      tokio::io::copy(&mut frag, &mut out).await?;
    }
    out.flush().await?;
    // Always sync before the rename, otherwise a crash could expose a renamed but empty object.
    out.sync_all().await?;
    drop(out);
    rename(&tmp, &path).await?;
    match remove_dir_all(&dir).await {
      Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err.into()),
      _ => {}
    };
    debug!(object = %input.target, fragments = input.ordered_ids.len(), "committed fragments");
    Ok(())
  }

  async fn create_object<'a>(&'a self, input: CreateObjectInput<'a>) -> BackendResult<()> {
    let path = self.get_path(input.target);
    Self::ensure_parent(&path).await?;
    let f = File::create(&path).await?;
    f.set_len(input.size).await?;
    self.finish_write(f).await
  }

  async fn write_range<'a>(&'a self, input: WriteRangeInput<'a>) -> BackendResult<()> {
    if u64!(input.data.len()) > self.limits.fragment_limit {
      return Err(BackendError::FragmentTooLarge);
    };
    let path = self.get_path(input.target);
    // Ranges may only be written within the pre-allocated size, like a file share.
    let mut f = OpenOptions::new().write(true).open(&path).await?;
    let size = f.metadata().await?.len();
    check_range(size, input.start, input.end, Some(u64!(input.data.len())))?;
    f.seek(SeekFrom::Start(input.start)).await?;
    f.write_all(input.data).await?;
    self.finish_write(f).await
  }

  async fn create_from_bytes<'a>(&'a self, input: CreateFromBytesInput<'a>) -> BackendResult<()> {
    if u64!(input.data.len()) > self.limits.section_limit {
      return Err(BackendError::ObjectTooLarge);
    };
    let path = self.get_path(input.target);
    Self::ensure_parent(&path).await?;
    let mut f = File::create(&path).await?;
    f.write_all(input.data).await?;
    self.finish_write(f).await
  }
}
