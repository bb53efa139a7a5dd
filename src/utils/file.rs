use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;


/// Creates `dir` and any missing parents.
///
/// # Returns
/// true if the directory did not exist before the call.
pub fn ensure_dir(dir: &Path) -> io::Result<bool> {
    if dir.is_dir() {
        return Ok(false);
    }
    fs::create_dir_all(dir)?;
    Ok(true)
}


/// Opens `path` for writing, truncating any previous content.
/// `File` is unbuffered, so each write reaches the OS before the child shares the descriptor.
pub fn create_log(path: &Path) -> io::Result<File> {
    File::create(path)
}


pub fn write_log_line(file: &mut File, line: &str) -> io::Result<()> {
    writeln!(file, "{}", line)?;
    file.flush()
}


/// Moves `from` to `to`, copying across filesystems when a plain rename is refused.
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::CrossesDevices => {
            fs::copy(from, to)?;
            fs::remove_file(from)
        }
        Err(e) => Err(e),
    }
}
