use anyhow::Result;
use relfs::config::RelfsConfig;
use relfs::vfs::EntryKind;

/// List a virtual directory, one entry per line; directories end in `/`.
pub fn ls(config: &RelfsConfig, path: &str, long: bool) -> Result<()> {
    let engine = super::open_engine(config)?;

    let Some(entries) = engine.list(path)? else {
        println!("{path}: no such path");
        return Ok(());
    };

    for entry in entries {
        let suffix = if entry.kind == EntryKind::Directory { "/" } else { "" };
        if long {
            println!(
                "{:<10} {:<28} {}{}",
                entry.relation_type.map(|t| t.as_str()).unwrap_or("-"),
                entry.updated_at.as_deref().unwrap_or("-"),
                entry.name,
                suffix
            );
        } else {
            println!("{}{}", entry.name, suffix);
        }
    }
    Ok(())
}
