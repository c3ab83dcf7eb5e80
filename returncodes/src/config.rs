use crate::*;
use std::env::var;
use std::str::FromStr;

pub const DEFAULT_NODE_ID: u32 = 1;
pub const DEFAULT_CONTROL_COMPONENT_ID: &str = "defCcxId";

/// Identity and limits of one control component node
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct NodeConfig {
    /// The node index `j` bound into every proof this node produces
    pub node_id: u32,
    pub control_component_id: String,
    pub max_confirmation_attempts: u32,
}

impl Default for NodeConfig {
    fn default() -> Self {
        NodeConfig {
            node_id: DEFAULT_NODE_ID,
            control_component_id: DEFAULT_CONTROL_COMPONENT_ID.to_owned(),
            max_confirmation_attempts: MAX_CONFIRMATION_ATTEMPTS,
        }
    }
}

impl NodeConfig {
    /// Read `RETURNCODES_NODE_ID`, `RETURNCODES_CONTROL_COMPONENT_ID` and
    /// `RETURNCODES_MAX_CONFIRMATION_ATTEMPTS`, falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, Error> {
        let defaults = NodeConfig::default();

        let node_id = match var("RETURNCODES_NODE_ID") {
            Ok(val) => parse_number("RETURNCODES_NODE_ID", &val)?,
            Err(_e) => defaults.node_id,
        };

        let control_component_id = match var("RETURNCODES_CONTROL_COMPONENT_ID") {
            Ok(val) if !val.trim().is_empty() => val,
            Ok(_) => {
                return Err(Error::InvalidConfiguration(
                    "RETURNCODES_CONTROL_COMPONENT_ID must not be blank".to_owned(),
                ))
            }
            Err(_e) => defaults.control_component_id,
        };

        let max_confirmation_attempts = match var("RETURNCODES_MAX_CONFIRMATION_ATTEMPTS") {
            Ok(val) => parse_number("RETURNCODES_MAX_CONFIRMATION_ATTEMPTS", &val)?,
            Err(_e) => defaults.max_confirmation_attempts,
        };
        if max_confirmation_attempts == 0 {
            return Err(Error::InvalidConfiguration(
                "RETURNCODES_MAX_CONFIRMATION_ATTEMPTS must be at least 1".to_owned(),
            ));
        }

        Ok(NodeConfig {
            node_id,
            control_component_id,
            max_confirmation_attempts,
        })
    }
}

fn parse_number<T: FromStr>(name: &str, val: &str) -> Result<T, Error> {
    val.trim().parse().map_err(|_| {
        Error::InvalidConfiguration(format!(
            "{} must be a non-negative integer, got {:?}",
            name, val
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Environment variables are process-wide, so every case lives in one test
    #[test]
    fn config_from_env() {
        env::remove_var("RETURNCODES_NODE_ID");
        env::remove_var("RETURNCODES_CONTROL_COMPONENT_ID");
        env::remove_var("RETURNCODES_MAX_CONFIRMATION_ATTEMPTS");
        assert_eq!(NodeConfig::from_env().unwrap(), NodeConfig::default());

        env::set_var("RETURNCODES_NODE_ID", "3");
        env::set_var("RETURNCODES_CONTROL_COMPONENT_ID", "cc3");
        env::set_var("RETURNCODES_MAX_CONFIRMATION_ATTEMPTS", "7");
        let config = NodeConfig::from_env().unwrap();
        assert_eq!(config.node_id, 3);
        assert_eq!(config.control_component_id, "cc3");
        assert_eq!(config.max_confirmation_attempts, 7);

        env::set_var("RETURNCODES_NODE_ID", "three");
        assert!(matches!(NodeConfig::from_env(), Err(Error::InvalidConfiguration(_))));
        env::set_var("RETURNCODES_NODE_ID", "3");

        env::set_var("RETURNCODES_MAX_CONFIRMATION_ATTEMPTS", "0");
        assert!(matches!(NodeConfig::from_env(), Err(Error::InvalidConfiguration(_))));

        env::remove_var("RETURNCODES_NODE_ID");
        env::remove_var("RETURNCODES_CONTROL_COMPONENT_ID");
        env::remove_var("RETURNCODES_MAX_CONFIRMATION_ATTEMPTS");
    }
}
