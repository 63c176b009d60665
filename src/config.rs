use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{Result, ServerError};

/// Parsed `server.config`. Format is line-based `key=value`; blank lines
/// and lines starting with `#` are skipped.
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub diskpath: PathBuf,
    pub vhosts: Vec<String>,
    pub drop_uid: Option<u32>,
    pub drop_gid: Option<u32>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ServerError::from(format!("unable to open {}: {e}", path.display())))?;
        Self::parse(&contents)
    }

    fn parse(contents: &str) -> Result<Config> {
        let mut fields: BTreeMap<String, String> = BTreeMap::new();
        for line in contents.lines() {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some(eq) = line.find('=') else {
                continue;
            };
            let key = line[..eq].to_string();
            let val = line[eq + 1..].to_string();
            fields.entry(key).or_insert(val);
        }

        for required in ["vhost", "port", "diskpath"] {
            if !fields.contains_key(required) {
                return Err(ServerError::from(format!(
                    "vhost, port, and diskpath must be supplied in the config, at a minimum (missing {required})"
                )));
            }
        }

        let diskpath = PathBuf::from(&fields["diskpath"]);
        if std::fs::metadata(&diskpath).is_err() {
            return Err(ServerError::from(format!(
                "diskpath must exist: {}",
                diskpath.display()
            )));
        }

        let vhosts: Vec<String> = fields["vhost"]
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if vhosts.is_empty() {
            return Err(ServerError::from("vhost must name at least one alias"));
        }

        let port: u16 = fields["port"]
            .parse()
            .map_err(|_| ServerError::from(format!("invalid port: {}", fields["port"])))?;

        let (drop_uid, drop_gid) = match (fields.get("drop_uid"), fields.get("drop_gid")) {
            (Some(u), Some(g)) => {
                let uid: i64 = u.parse().unwrap_or(0);
                let gid: i64 = g.parse().unwrap_or(0);
                if uid > 0 && gid > 0 {
                    (Some(uid as u32), Some(gid as u32))
                } else {
                    (None, None)
                }
            }
            _ => (None, None),
        };

        Ok(Config {
            port,
            diskpath,
            vhosts,
            drop_uid,
            drop_gid,
        })
    }

    /// Colored startup banner, purely operator-facing diagnostics.
    pub fn display(&self) {
        println!("\x1b[1;36m==> httpserver config\x1b[0m");
        println!("    port:      {}", self.port);
        println!("    diskpath:  {}", self.diskpath.display());
        println!("    vhosts:    {}", self.vhosts.join(", "));
        match (self.drop_uid, self.drop_gid) {
            (Some(uid), Some(gid)) => println!("    drop priv: uid={uid} gid={gid}"),
            _ => println!("    drop priv: \x1b[33m<none>\x1b[0m"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_config() {
        let dir = std::env::temp_dir().join("httpserver_config_test_minimal");
        std::fs::create_dir_all(&dir).unwrap();
        let contents = format!(
            "# comment\nvhost=example.com,www.example.com\nport=8080\ndiskpath={}\n",
            dir.display()
        );
        let cfg = Config::parse(&contents).unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.vhosts, vec!["example.com", "www.example.com"]);
        assert_eq!(cfg.diskpath, dir);
        assert!(cfg.drop_uid.is_none());
    }

    #[test]
    fn rejects_missing_required_keys() {
        let err = Config::parse("port=8080\n");
        assert!(err.is_err());
    }

    #[test]
    fn rejects_nonexistent_diskpath() {
        let contents = "vhost=a\nport=80\ndiskpath=/no/such/path/ever\n";
        assert!(Config::parse(contents).is_err());
    }

    #[test]
    fn drop_uid_gid_require_both_positive() {
        let dir = std::env::temp_dir().join("httpserver_config_test_drop");
        std::fs::create_dir_all(&dir).unwrap();
        let contents = format!(
            "vhost=a\nport=80\ndiskpath={}\ndrop_uid=0\ndrop_gid=100\n",
            dir.display()
        );
        let cfg = Config::parse(&contents).unwrap();
        assert!(cfg.drop_uid.is_none());
        assert!(cfg.drop_gid.is_none());

        let contents = format!(
            "vhost=a\nport=80\ndiskpath={}\ndrop_uid=500\ndrop_gid=500\n",
            dir.display()
        );
        let cfg = Config::parse(&contents).unwrap();
        assert_eq!(cfg.drop_uid, Some(500));
        assert_eq!(cfg.drop_gid, Some(500));
    }
}
