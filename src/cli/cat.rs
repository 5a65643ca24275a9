use anyhow::Result;
use relfs::config::RelfsConfig;
use relfs::vfs::ReadView;
use std::io::Write;

/// Print a virtual file. `info` forces the properties view.
pub fn cat(config: &RelfsConfig, path: &str, info: bool) -> Result<()> {
    let engine = super::open_engine(config)?;
    let view = if info { ReadView::Info } else { ReadView::Auto };

    let Some(result) = engine.read(path, view)? else {
        println!("{path}: no such file");
        return Ok(());
    };

    let mut stdout = std::io::stdout().lock();
    stdout.write_all(&result.bytes)?;
    if !result.bytes.ends_with(b"\n") {
        writeln!(stdout)?;
    }
    Ok(())
}
