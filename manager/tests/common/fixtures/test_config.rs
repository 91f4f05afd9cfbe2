//! Test configuration builder for writing `config/main.toml` to a temp dir

use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

pub struct TestConfigBuilder {
    temp_dir: TempDir,
    lines: Vec<String>,
    announce: Vec<String>,
    settings: Vec<String>,
}

pub struct TestConfig {
    // Keeps the directory alive for the test's duration
    _temp_dir: TempDir,
    pub config_dir: PathBuf,
}

impl TestConfig {
    pub fn config_dir_string(&self) -> String {
        self.config_dir.to_string_lossy().to_string()
    }
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp dir"),
            lines: Vec::new(),
            announce: Vec::new(),
            settings: Vec::new(),
        }
    }

    pub fn with_line(mut self, line: &str) -> Self {
        self.lines.push(line.to_string());
        self
    }

    pub fn with_announce_auth(mut self, required: bool, username: Option<&str>, password: Option<&str>) -> Self {
        self.announce.push(format!("auth_required = {}", required));
        if let Some(username) = username {
            self.announce.push(format!("username = \"{}\"", username));
        }
        if let Some(password) = password {
            self.announce.push(format!("password = \"{}\"", password));
        }
        self
    }

    pub fn with_setting(mut self, key: &str, value: i64) -> Self {
        self.settings.push(format!("{} = {}", key, value));
        self
    }

    /// Write main.toml and return the config directory
    pub fn build(self) -> TestConfig {
        let config_dir = self.temp_dir.path().join("config");
        fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        let mut content = self.lines.join("\n");
        if !self.announce.is_empty() {
            content.push_str("\n\n[announce]\n");
            content.push_str(&self.announce.join("\n"));
        }
        if !self.settings.is_empty() {
            content.push_str("\n\n[settings]\n");
            content.push_str(&self.settings.join("\n"));
        }
        content.push('\n');

        fs::write(config_dir.join("main.toml"), content).expect("Failed to write main.toml");

        TestConfig {
            _temp_dir: self.temp_dir,
            config_dir,
        }
    }

    /// Config directory with no main.toml in it
    pub fn empty() -> TestConfig {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_dir = temp_dir.path().join("config");
        fs::create_dir_all(&config_dir).expect("Failed to create config dir");
        TestConfig {
            _temp_dir: temp_dir,
            config_dir,
        }
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
