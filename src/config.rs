/*!
Structs to hold configuration data and global variables.
*/
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::{
    auth, auth::AuthResult,
    store::Store,
    user::Role,
};

#[derive(Deserialize)]
struct ConfigFile {
    db_uri: Option<String>,
    db_name: Option<String>,
    admin_uname: Option<String>,
    admin_password: Option<String>,
    host: Option<String>,
    port: Option<u16>,
    static_dir: Option<String>,
}

#[derive(Debug)]
pub struct Cfg {
    pub db_uri: String,
    pub db_name: String,
    pub default_admin_uname: String,
    pub default_admin_password: String,
    pub addr: SocketAddr,
    pub static_dir: PathBuf,
}

impl std::default::Default for Cfg {
    fn default() -> Self {
        Self {
            db_uri: "mongodb://localhost:27017".to_owned(),
            db_name: "rollbook".to_owned(),
            default_admin_uname: "root".to_owned(),
            default_admin_password: "000000".to_owned(),
            addr: SocketAddr::new(
                "0.0.0.0".parse().unwrap(),
                3000
            ),
            static_dir: PathBuf::from("static"),
        }
    }
}

impl Cfg {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, String> {
        let path = path.as_ref();
        let file_contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Unable to read config file: {}", &e))?;
        let cf: ConfigFile = toml::from_str(&file_contents)
            .map_err(|e| format!("Unable to deserialize config file: {}", &e))?;

        let mut c = Self::default();

        if let Some(s) = cf.db_uri {
            c.db_uri = s;
        }
        if let Some(s) = cf.db_name {
            c.db_name = s;
        }
        if let Some(s) = cf.admin_uname {
            c.default_admin_uname = s;
        }
        if let Some(s) = cf.admin_password {
            c.default_admin_password = s;
        }
        if let Some(s) = cf.host {
            c.addr.set_ip(
                s.parse().map_err(|e| format!(
                    "Error parsing {:?} as IP address: {}",
                    &s, &e
                ))?
            );
        }
        if let Some(n) = cf.port {
            c.addr.set_port(n);
        }
        if let Some(s) = cf.static_dir {
            c.static_dir = PathBuf::from(s);
        }

        Ok(c)
    }
}

/**
This guy hauls around the global resources and gets passed in an
`axum::Extension` to the handlers who need him.

The service keeps no per-request state of its own (everything lives in
the record store), so a plain `Arc<Glob>` suffices; there's nothing to
lock.
*/
pub struct Glob {
    pub store: Store,
    pub auth: auth::Db,
    pub addr: SocketAddr,
    pub static_dir: PathBuf,
}

/// Loads system configuration and ensures the record store is reachable
/// and carrying the appropriate indexes.
///
/// Also assures existence of the default admin account.
pub async fn load_configuration<P: AsRef<Path>>(path: P) -> Result<Glob, String> {
    let path = path.as_ref();
    let cfg = if path.exists() {
        Cfg::from_file(path)?
    } else {
        log::warn!(
            "No config file at {}; using default configuration.",
            path.display()
        );
        Cfg::default()
    };
    log::info!("Configuration:\n{:#?}", &cfg);

    log::trace!("Checking state of the record store...");
    let db = Store::connect(&cfg.db_uri, &cfg.db_name).await
        .map_err(|e| format!("Unable to reach record store: {}", e.display()))?;
    let store = Store::new(db.clone());
    if let Err(e) = store.ping().await {
        let estr = format!("Record store did not answer: {}", e.display());
        return Err(estr);
    }
    if let Err(e) = store.ensure_db_schema().await {
        let estr = format!("Unable to ensure record-store indexes: {}", e.display());
        return Err(estr);
    }
    log::trace!("...record store okay.");

    log::trace!("Checking state of the auth records...");
    let auth_db = auth::Db::new(db);
    if let Err(e) = auth_db.ensure_db_schema().await {
        let estr = format!("Unable to ensure auth indexes: {}", e.display());
        return Err(estr);
    }
    log::trace!("...auth records okay.");

    log::trace!("Checking existence of default admin in the record store...");
    match store.get_user_by_uname(&cfg.default_admin_uname).await {
        Err(e) => {
            let estr = format!(
                "Error attempting to check existence of default admin ({}): {}",
                &cfg.default_admin_uname, e.display()
            );
            return Err(estr);
        },
        Ok(None) => {
            log::info!(
                "Default admin ({}) doesn't exist in the record store; inserting.",
                &cfg.default_admin_uname
            );
            if let Err(e) = store.insert_user(
                &cfg.default_admin_uname,
                Role::Admin
            ).await {
                let estr = format!(
                    "Error inserting default admin into the record store: {}",
                    e.display()
                );
                return Err(estr);
            }
        },
        Ok(Some(u)) => {
            if u.role != Role::Admin {
                log::warn!(
                    "User {:?} holds the configured admin uname but has role {}.",
                    &u.uname, &u.role
                );
            }
        },
    }
    log::trace!("Default admin OK in the record store.");

    log::trace!("Checking existence of default admin in the auth records...");
    match auth_db.check_password(
        &cfg.default_admin_uname,
        &cfg.default_admin_password,
    ).await {
        Err(e) => {
            let estr = format!(
                "Error checking existence of default admin in auth records: {}",
                e.display()
            );
            return Err(estr);
        },
        Ok(AuthResult::BadPassword) => {
            log::warn!(
                "Default admin ({}) not using the configured password.",
                &cfg.default_admin_uname
            );
        },
        Ok(AuthResult::NoSuchUser) => {
            log::info!(
                "Default admin ({}) has no auth record; inserting.",
                &cfg.default_admin_uname
            );
            if let Err(e) = auth_db.add_user(
                &cfg.default_admin_uname,
                &cfg.default_admin_password,
            ).await {
                let estr = format!(
                    "Error inserting default admin auth record: {}",
                    e.display()
                );
                return Err(estr);
            };
            log::trace!("Default admin auth record inserted.");
        },
        Ok(AuthResult::Ok) => {
            log::trace!("Default admin password check OK.");
        },
        Ok(x) => {
            let estr = format!(
                "Default admin password check resulted in {:?}, which just doesn't make sense.",
                &x
            );
            return Err(estr);
        },
    }
    log::trace!("Default admin OK in the auth records.");

    let glob = Glob {
        store,
        auth: auth_db,
        addr: cfg.addr,
        static_dir: cfg.static_dir,
    };

    Ok(glob)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_overridden_by_file_values() {
        let toml_text = r#"
            db_name = "rollbook_other"
            port = 8080
            admin_password = "sesame"
        "#;
        let tmp = std::env::temp_dir().join("rollbook_cfg_test.toml");
        std::fs::write(&tmp, toml_text).unwrap();

        let cfg = Cfg::from_file(&tmp).unwrap();
        std::fs::remove_file(&tmp).ok();

        // Overridden values...
        assert_eq!(cfg.db_name, "rollbook_other");
        assert_eq!(cfg.addr.port(), 8080);
        assert_eq!(cfg.default_admin_password, "sesame");
        // ...and untouched defaults.
        assert_eq!(cfg.db_uri, "mongodb://localhost:27017");
        assert_eq!(cfg.default_admin_uname, "root");
        assert_eq!(cfg.static_dir, PathBuf::from("static"));
    }

    #[test]
    fn unreadable_config_is_an_error() {
        assert!(Cfg::from_file("no/such/file.toml").is_err());
    }
}
