//! Layered configuration for tgimg.
//!
//! Sources, lowest priority first:
//! 1. built-in defaults,
//! 2. a configuration file (TOML, YAML or JSON, chosen by extension),
//! 3. environment variables prefixed with `TGIMG_`, using `__` to reach into
//!    sections (`TGIMG_HTTP__TIMEOUT_SECS=10`). `IMGBB_API_KEY` is also
//!    accepted for the upload key.
//!
//! The resulting [`Config`] is handed to constructors explicitly; nothing
//! else in the workspace reads the environment.

pub mod error;

use crate::error::{ErrorKind, Result};
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_PREFIX: &str = "TGIMG_";
pub const DEFAULT_UPLOAD_ENDPOINT: &str = "https://api.imgbb.com/1/upload";
const LEGACY_UPLOAD_KEY_VAR: &str = "IMGBB_API_KEY";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub http: HttpConfig,
    pub server: ServerConfig,
    /// Re-publishing to an image host is disabled unless this section exists.
    pub upload: Option<UploadConfig>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Where materialized images are written. Relative paths are resolved
    /// against the working directory.
    pub directory: PathBuf,
}
impl Default for StorageConfig {
    fn default() -> Self {
        Self { directory: PathBuf::from("./images") }
    }
}
impl StorageConfig {
    /// Absolute form of [`directory`](Self::directory).
    pub fn resolved_directory(&self) -> Result<PathBuf> {
        if self.directory.is_absolute() {
            return Ok(self.directory.clone());
        }
        let cwd = std::env::current_dir().or_raise(|| ErrorKind::Invalid("working directory unavailable".into()))?;
        Ok(cwd.join(&self.directory))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Upper bound for a whole request, body included.
    pub timeout_secs: u64,
    pub connect_timeout_secs: u64,
    pub user_agent: String,
}
impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            connect_timeout_secs: 10,
            user_agent: concat!("tgimg/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}
impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind: SocketAddr,
    /// URL path the image store is served under.
    pub static_prefix: String,
}
impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 8080)),
            static_prefix: "/static".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadConfig {
    pub api_key: String,
    #[serde(default = "default_upload_endpoint")]
    pub endpoint: String,
    /// Seconds until the hosted image expires; `None` keeps it forever.
    #[serde(default)]
    pub expiration_secs: Option<u64>,
}

fn default_upload_endpoint() -> String {
    DEFAULT_UPLOAD_ENDPOINT.to_string()
}

impl Config {
    /// Default location of the configuration file for the current user, if
    /// the platform has a notion of one.
    pub fn default_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "tgimg").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Loads configuration from defaults, `path` (or the default location if
    /// it exists) and the environment, then validates it.
    ///
    /// An explicitly given `path` has to exist; the default location is
    /// optional.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let file = match path {
            Some(path) if !path.exists() => exn::bail!(ErrorKind::NotFound(path.to_path_buf())),
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_path().filter(|path| path.exists()),
        };
        tracing::debug!(file = ?file, "Loading configuration");
        let config: Self = Self::figment(file.as_deref())?.extract().or_raise(|| ErrorKind::Load)?;
        config.validate()
    }

    /// The layered [`Figment`] behind [`load()`](Self::load).
    pub fn figment(file: Option<&Path>) -> Result<Figment> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(file) = file {
            figment = match file.extension().and_then(|ext| ext.to_str()) {
                Some("toml") => figment.merge(Toml::file(file)),
                Some("yaml" | "yml") => figment.merge(Yaml::file(file)),
                Some("json") => figment.merge(Json::file(file)),
                _ => exn::bail!(ErrorKind::UnsupportedFormat(file.to_path_buf())),
            };
        }
        Ok(figment
            .merge(Env::raw().only(&[LEGACY_UPLOAD_KEY_VAR]).map(|_| "upload.api_key".into()))
            .merge(Env::prefixed(ENV_PREFIX).split("__")))
    }

    fn validate(self) -> Result<Self> {
        if self.http.timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("http.timeout_secs must be greater than zero".into()));
        }
        if self.http.connect_timeout_secs == 0 {
            exn::bail!(ErrorKind::Invalid("http.connect_timeout_secs must be greater than zero".into()));
        }
        let prefix = &self.server.static_prefix;
        if !prefix.starts_with('/') || prefix.ends_with('/') {
            exn::bail!(ErrorKind::Invalid("server.static_prefix must start and must not end with `/`".into()));
        }
        if let Some(upload) = &self.upload
            && upload.api_key.trim().is_empty()
        {
            exn::bail!(ErrorKind::Invalid("upload.api_key must not be empty".into()));
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    /// Points the per-user configuration directory into the jail, so a real
    /// configuration file on the host can't leak in.
    fn isolate(jail: &mut Jail) {
        let home = jail.directory().to_path_buf();
        jail.set_env("HOME", home.display());
        jail.set_env("XDG_CONFIG_HOME", home.join(".config").display());
    }

    #[test]
    fn test_defaults() {
        Jail::expect_with(|jail| {
            isolate(jail);
            let config = Config::load(None).unwrap();
            assert_eq!(config.storage.directory, PathBuf::from("./images"));
            assert_eq!(config.http.timeout(), Duration::from_secs(30));
            assert_eq!(config.server.bind, "0.0.0.0:8080".parse::<SocketAddr>().unwrap());
            assert_eq!(config.server.static_prefix, "/static");
            assert!(config.upload.is_none());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_environment() {
        Jail::expect_with(|jail| {
            isolate(jail);
            jail.create_file(
                "tgimg.toml",
                r#"
                    [storage]
                    directory = "/srv/images"

                    [http]
                    timeout_secs = 5
                "#,
            )?;
            jail.set_env("TGIMG_HTTP__TIMEOUT_SECS", "7");
            jail.set_env("TGIMG_SERVER__BIND", "127.0.0.1:9000");
            let config = Config::load(Some(Path::new("tgimg.toml"))).unwrap();
            assert_eq!(config.storage.directory, PathBuf::from("/srv/images"));
            assert_eq!(config.http.timeout_secs, 7);
            assert_eq!(config.http.connect_timeout_secs, 10);
            assert_eq!(config.server.bind, "127.0.0.1:9000".parse::<SocketAddr>().unwrap());
            Ok(())
        });
    }

    #[test]
    fn test_yaml_upload_section() {
        Jail::expect_with(|jail| {
            isolate(jail);
            jail.create_file("tgimg.yaml", "upload:\n  api_key: secret\n  expiration_secs: 600\n")?;
            let upload = Config::load(Some(Path::new("tgimg.yaml"))).unwrap().upload.unwrap();
            assert_eq!(upload.api_key, "secret");
            assert_eq!(upload.endpoint, DEFAULT_UPLOAD_ENDPOINT);
            assert_eq!(upload.expiration_secs, Some(600));
            Ok(())
        });
    }

    #[test]
    fn test_legacy_upload_key() {
        Jail::expect_with(|jail| {
            isolate(jail);
            jail.set_env("IMGBB_API_KEY", "from-env");
            let upload = Config::load(None).unwrap().upload.unwrap();
            assert_eq!(upload.api_key, "from-env");
            assert_eq!(upload.endpoint, DEFAULT_UPLOAD_ENDPOINT);
            Ok(())
        });
    }

    #[cfg(unix)]
    #[test]
    fn test_default_location() {
        Jail::expect_with(|jail| {
            isolate(jail);
            let path = Config::default_path().unwrap();
            assert!(path.starts_with(jail.directory()));
            std::fs::create_dir_all(path.parent().unwrap()).unwrap();
            std::fs::write(&path, "[http]\ntimeout_secs = 3\n").unwrap();
            assert_eq!(Config::load(None).unwrap().http.timeout_secs, 3);
            Ok(())
        });
    }

    #[test]
    fn test_missing_explicit_file() {
        Jail::expect_with(|jail| {
            isolate(jail);
            let err = Config::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::NotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn test_unsupported_format() {
        Jail::expect_with(|jail| {
            isolate(jail);
            jail.create_file("tgimg.ini", "storage=images")?;
            let err = Config::load(Some(Path::new("tgimg.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::UnsupportedFormat(_)));
            Ok(())
        });
    }

    #[rstest]
    #[case("TGIMG_HTTP__TIMEOUT_SECS", "0")]
    #[case("TGIMG_HTTP__CONNECT_TIMEOUT_SECS", "0")]
    #[case("TGIMG_SERVER__STATIC_PREFIX", "static")]
    #[case("TGIMG_SERVER__STATIC_PREFIX", "/")]
    #[case("TGIMG_SERVER__STATIC_PREFIX", "/static/")]
    fn test_invalid_values(#[case] var: &str, #[case] value: &str) {
        Jail::expect_with(|jail| {
            isolate(jail);
            jail.set_env(var, value);
            let err = Config::load(None).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid(_)));
            Ok(())
        });
    }

    #[test]
    fn test_resolved_directory() {
        let relative = StorageConfig { directory: PathBuf::from("images") };
        let resolved = relative.resolved_directory().unwrap();
        assert!(resolved.is_absolute());
        assert!(resolved.ends_with("images"));

        let dir = tempfile::tempdir().unwrap();
        let absolute = StorageConfig { directory: dir.path().to_path_buf() };
        assert_eq!(absolute.resolved_directory().unwrap(), dir.path());
    }
}
