use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use log::{debug, info};
use serde::Deserialize;

use crate::constants::SSH_DEFAULT_PORT;
use crate::error::{HarvestError, HarvestResult};
use crate::models::Target;

/// Dial options as they appear at every level of the binding file
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct DialOptions {
    /// `host[:port]`, only meaningful for the per-device ssh block
    pub target: String,
    pub username: String,
    pub password: String,
}

/// One device entry of the binding file
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct BindingDevice {
    pub id: String,
    pub name: String,
    /// Options shared by every protocol of this device
    pub options: Option<DialOptions>,
    /// SSH-specific options; the most specific level
    pub ssh: Option<DialOptions>,
}

/// The subset of the testbed binding consumed by the harvester
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct Binding {
    pub duts: Vec<BindingDevice>,
    /// Options applied to all devices unless overridden
    pub options: Option<DialOptions>,
}

impl Binding {
    pub fn from_yaml_str(content: &str) -> HarvestResult<Self> {
        serde_yaml::from_str(content)
            .map_err(|e| HarvestError::Config(format!("error unmarshalling binding file: {}", e)))
    }

    pub fn from_file(path: &Path) -> HarvestResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            HarvestError::Config(format!("error reading binding file {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&content)
    }
}

/// First non-empty value across the fallback levels, most specific first
fn first_non_empty<'a>(levels: [Option<&'a str>; 3]) -> &'a str {
    levels
        .into_iter()
        .flatten()
        .find(|value| !value.is_empty())
        .unwrap_or("")
}

/// Split `host[:port]`, defaulting the port to 22
fn parse_ssh_target(device_id: &str, target: &str) -> HarvestResult<(String, u16)> {
    match target.split_once(':') {
        None => Ok((target.to_string(), SSH_DEFAULT_PORT)),
        Some((host, port)) => {
            let port = port.split(':').next().unwrap_or("");
            if port.is_empty() {
                return Err(HarvestError::Config(format!("ssh port is empty for dut {}", device_id)));
            }
            let port = port.parse::<u16>().map_err(|_| {
                HarvestError::Config(format!("invalid ssh port {:?} for dut {}", port, device_id))
            })?;
            Ok((host.to_string(), port))
        }
    }
}

/// Per-run mapping from device id to its resolved SSH target
#[derive(Debug, Clone, Default)]
pub struct TargetRegistry {
    targets: BTreeMap<String, Target>,
}

impl TargetRegistry {
    /// Resolve every DUT of the binding, failing on the first device that
    /// lacks an id, host, port, user or credential after fallbacks.
    pub fn resolve(binding: &Binding) -> HarvestResult<Self> {
        let global = binding.options.as_ref();
        let mut targets = BTreeMap::new();

        for dut in &binding.duts {
            let ssh = dut.ssh.as_ref();
            let device = dut.options.as_ref();

            let user = first_non_empty([
                ssh.map(|o| o.username.as_str()),
                device.map(|o| o.username.as_str()),
                global.map(|o| o.username.as_str()),
            ]);
            let credential = first_non_empty([
                ssh.map(|o| o.password.as_str()),
                device.map(|o| o.password.as_str()),
                global.map(|o| o.password.as_str()),
            ]);

            if dut.id.is_empty() {
                return Err(HarvestError::Config(format!(
                    "dut id is empty for dut named {:?}",
                    dut.name
                )));
            }

            let (host, port) = parse_ssh_target(&dut.id, ssh.map(|o| o.target.as_str()).unwrap_or(""))?;

            if host.is_empty() {
                return Err(HarvestError::Config(format!("ssh host is empty for dut {}", dut.id)));
            }
            if user.is_empty() {
                return Err(HarvestError::Config(format!("ssh user is empty for dut {}", dut.id)));
            }
            if credential.is_empty() {
                return Err(HarvestError::Config(format!("ssh password is empty for dut {}", dut.id)));
            }

            let target = Target {
                device_id: dut.id.clone(),
                host,
                port,
                user: user.to_string(),
                credential: credential.to_string(),
            };
            debug!("Resolved target {:?}", target);
            targets.insert(dut.id.clone(), target);
        }

        info!("Resolved SSH targets for {} devices", targets.len());
        Ok(Self { targets })
    }

    /// Read and resolve the binding file named on the command line
    pub fn from_binding_file(path: &Path) -> HarvestResult<Self> {
        Self::resolve(&Binding::from_file(path)?)
    }

    pub fn from_targets(targets: impl IntoIterator<Item = Target>) -> Self {
        Self {
            targets: targets
                .into_iter()
                .map(|t| (t.device_id.clone(), t))
                .collect(),
        }
    }

    pub fn get(&self, device_id: &str) -> Option<&Target> {
        self.targets.get(device_id)
    }

    /// Look up a device, reporting an unknown id as a configuration error
    pub fn require(&self, device_id: &str) -> HarvestResult<&Target> {
        self.get(device_id).ok_or_else(|| {
            HarvestError::Config(format!("no ssh target resolved for dut {}", device_id))
        })
    }

    pub fn device_ids(&self) -> impl Iterator<Item = &str> {
        self.targets.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    const BINDING: &str = r#"
options:
  username: global-user
  password: global-pass
duts:
  - id: dut1
    name: router-a
    ssh:
      target: "10.0.0.1:830"
      username: ssh-user
      password: ssh-pass
  - id: dut2
    name: router-b
    options:
      username: device-user
    ssh:
      target: "10.0.0.2"
"#;

    #[test]
    fn test_resolve_with_fallbacks() {
        let registry = TargetRegistry::resolve(&Binding::from_yaml_str(BINDING).unwrap()).unwrap();
        assert_eq!(registry.len(), 2);

        let dut1 = registry.get("dut1").unwrap();
        assert_eq!(dut1.host, "10.0.0.1");
        assert_eq!(dut1.port, 830);
        assert_eq!(dut1.user, "ssh-user");
        assert_eq!(dut1.credential, "ssh-pass");

        let dut2 = registry.get("dut2").unwrap();
        assert_eq!(dut2.port, 22);
        assert_eq!(dut2.user, "device-user");
        assert_eq!(dut2.credential, "global-pass");

        let ids: Vec<&str> = registry.device_ids().collect();
        assert_eq!(ids, vec!["dut1", "dut2"]);
    }

    #[test]
    fn test_empty_values_fall_through() {
        let yaml = r#"
options:
  password: global-pass
duts:
  - id: dut1
    options:
      username: ""
      password: ""
    ssh:
      target: "h"
      username: "u"
      password: ""
"#;
        let registry = TargetRegistry::resolve(&Binding::from_yaml_str(yaml).unwrap()).unwrap();
        assert_eq!(registry.get("dut1").unwrap().credential, "global-pass");
    }

    #[test]
    fn test_missing_fields_are_config_errors() {
        let cases = [
            ("duts:\n  - name: x\n    ssh: {target: h, username: u, password: p}\n", "dut id is empty"),
            ("duts:\n  - id: d\n    ssh: {username: u, password: p}\n", "ssh host is empty"),
            ("duts:\n  - id: d\n    ssh: {target: \"h:\", username: u, password: p}\n", "ssh port is empty"),
            ("duts:\n  - id: d\n    ssh: {target: \"h:abc\", username: u, password: p}\n", "invalid ssh port"),
            ("duts:\n  - id: d\n    ssh: {target: h, password: p}\n", "ssh user is empty"),
            ("duts:\n  - id: d\n    ssh: {target: h, username: u}\n", "ssh password is empty"),
        ];

        for (yaml, expected) in cases {
            let err = TargetRegistry::resolve(&Binding::from_yaml_str(yaml).unwrap()).unwrap_err();
            assert!(err.is_fatal());
            assert!(err.to_string().contains(expected), "{} should contain {}", err, expected);
        }
    }

    #[test]
    fn test_from_binding_file() {
        let file = NamedTempFile::new().unwrap();
        fs::write(file.path(), BINDING).unwrap();
        let registry = TargetRegistry::from_binding_file(file.path()).unwrap();
        assert!(registry.require("dut1").is_ok());
        assert!(matches!(registry.require("dut9"), Err(HarvestError::Config(_))));

        let missing = TargetRegistry::from_binding_file(Path::new("/nonexistent/binding.yaml"));
        assert!(matches!(missing, Err(HarvestError::Config(_))));
    }
}
