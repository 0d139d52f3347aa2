use std::{
    fmt::Debug,
    fs,
    net::IpAddr,
    path::{Path, PathBuf},
    str::FromStr,
    sync::{Arc, LazyLock},
};

use anyhow::Context;

pub static GLOBAL: LazyLock<Arc<Conf>> = LazyLock::new(|| {
    let conf = read_or_create_default().unwrap_or_else(|error| {
        panic!("Failed to initialize global config: {error:?}")
    });
    Arc::new(conf)
});

#[must_use]
pub fn global() -> Arc<Conf> {
    (*GLOBAL).clone()
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct Conf {
    #[serde(
        serialize_with = "serialize_log_level",
        deserialize_with = "deserialize_log_level"
    )]
    pub log_level: tracing::Level,
    pub addr: IpAddr,
    pub port: u16,
    pub analytics: ConfAnalytics,
    pub smtp: ConfSmtp,
    pub tls: Option<Tls>,
}

impl Default for Conf {
    fn default() -> Self {
        Self {
            log_level: tracing::Level::INFO,
            addr: "127.0.0.1".parse().unwrap_or_else(|_| {
                unreachable!("Fat-fingered default IP address!")
            }),
            port: 3001,
            analytics: ConfAnalytics::default(),
            smtp: ConfSmtp::default(),
            tls: None,
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct Tls {
    pub cert_file: PathBuf,
    pub key_file: PathBuf,
}

/// Google Analytics readback: a service account credential and the GA4
/// property it is allowed to read.
#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct ConfAnalytics {
    pub client_email: String,
    pub private_key_pem: String,
    /// Numeric GA4 property ID, not the "G-XXXX" measurement ID.
    pub property_id: String,
    pub token_uri: String,
    pub api_base: String,
}

impl Default for ConfAnalytics {
    fn default() -> Self {
        Self {
            client_email: String::new(),
            private_key_pem: String::new(),
            property_id: String::new(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://analyticsdata.googleapis.com".to_string(),
        }
    }
}

impl Debug for ConfAnalytics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfAnalytics")
            .field("client_email", &self.client_email)
            .field("private_key_pem", &"<XXXXX>")
            .field("property_id", &self.property_id)
            .field("token_uri", &self.token_uri)
            .field("api_base", &self.api_base)
            .finish()
    }
}

#[derive(serde::Serialize, serde::Deserialize, Debug, Clone)]
pub struct ConfSmtp {
    pub host: String,
    pub port: u16,
    pub accounts: Vec<ConfSmtpAccount>,
}

impl Default for ConfSmtp {
    fn default() -> Self {
        Self {
            host: "smtp.gmail.com".to_string(),
            port: 587,
            accounts: vec![ConfSmtpAccount::default()],
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize, Clone)]
pub struct ConfSmtpAccount {
    pub user: String,
    pub pass: String,
}

impl Default for ConfSmtpAccount {
    fn default() -> Self {
        Self {
            user: "noreply@example.com".to_string(),
            pass: String::new(),
        }
    }
}

impl Debug for ConfSmtpAccount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfSmtpAccount")
            .field("user", &self.user)
            .field("pass", &"<XXXXX>")
            .finish()
    }
}

fn serialize_log_level<S>(
    level: &tracing::Level,
    serializer: S,
) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    let s = level.to_string();
    serializer.serialize_str(&s)
}

fn deserialize_log_level<'de, D>(
    deserializer: D,
) -> Result<tracing::Level, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::Deserialize;

    let s = String::deserialize(deserializer)?;
    tracing::Level::from_str(&s).map_err(serde::de::Error::custom)
}

pub fn read_or_create_default() -> anyhow::Result<Conf> {
    let path = "conf/conf.toml";
    read_or_create_default_(path).context(path)
}

pub fn read_or_create_default_<P: AsRef<Path>>(
    path: P,
) -> anyhow::Result<Conf> {
    let path = path.as_ref();
    let conf = if fs::exists(path)? {
        let s = fs::read_to_string(path)?;
        toml::from_str(&s)?
    } else {
        if let Some(parent) = path.parent() {
            let ctx = format!(
                "Failed to create parent directory \
                for conf file: {path:?}"
            );
            fs::create_dir_all(parent).context(ctx)?;
        }
        let conf = Conf::default();
        let s = toml::to_string_pretty(&conf)?;
        fs::write(path, s)?;
        conf
    };
    Ok(conf)
}
