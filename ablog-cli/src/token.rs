use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Keeps the JWT between CLI invocations in a small file.
pub struct TokenManager {
    token_path: PathBuf,
}

impl TokenManager {
    pub fn new(custom_path: Option<PathBuf>) -> Result<Self> {
        let token_path = match custom_path {
            Some(path) => path,
            None => {
                let home = dirs::home_dir().context("Failed to get home directory")?;
                home.join(".ablog_token")
            }
        };

        Ok(Self { token_path })
    }

    pub fn path(&self) -> &Path {
        &self.token_path
    }

    pub fn save_token(&self, token: &str) -> Result<()> {
        fs::write(&self.token_path, token)
            .with_context(|| format!("Failed to save token to {:?}", self.token_path))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.token_path)?.permissions();
            perms.set_mode(0o600);
            fs::set_permissions(&self.token_path, perms)?;
        }

        Ok(())
    }

    pub fn load_token(&self) -> Result<Option<String>> {
        match fs::read_to_string(&self.token_path) {
            Ok(token) => {
                let token = token.trim().to_string();
                if token.is_empty() {
                    Ok(None)
                } else {
                    Ok(Some(token))
                }
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).context("Failed to read token file"),
        }
    }

    /// Returns whether a token file existed.
    pub fn clear_token(&self) -> Result<bool> {
        if !self.token_path.exists() {
            return Ok(false);
        }
        fs::remove_file(&self.token_path)
            .with_context(|| format!("Failed to remove token file {:?}", self.token_path))?;
        Ok(true)
    }
}
