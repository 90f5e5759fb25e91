use anyhow::{anyhow, Result};
use std::fs;
use std::path::PathBuf;

pub fn get_clipsync_dir() -> Result<PathBuf> {
    let home = dirs::home_dir().ok_or_else(|| anyhow!("Could not find home directory"))?;
    Ok(home.join(".clipsync"))
}

pub fn get_config_path() -> Result<PathBuf> {
    let dir = get_clipsync_dir()?;
    Ok(dir.join("config.toml"))
}

pub fn ensure_config_dir_exists() -> Result<()> {
    let dir = get_clipsync_dir()?;

    if !dir.exists() {
        fs::create_dir_all(&dir)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_clipsync_dir() {
        let dir = get_clipsync_dir().unwrap();
        assert!(dir.to_string_lossy().ends_with(".clipsync"));
    }

    #[test]
    fn test_get_config_path() {
        let path = get_config_path().unwrap();
        assert!(path.to_string_lossy().contains(".clipsync"));
        assert!(path.to_string_lossy().ends_with("config.toml"));
    }
}
